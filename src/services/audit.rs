//! Request audit log
//!
//! Every bounce and every form submission appends one row.  Logging must
//! never take down the primary request: failures are reported and swallowed.

use sqlx::PgPool;

use crate::models::{BibRecord, Patron};

#[derive(Clone)]
pub struct AuditLog {
    pool: Option<PgPool>,
}

impl AuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Some(pool) }
    }

    /// An audit log that drops rows; used by tests.
    pub fn disabled() -> Self {
        Self { pool: None }
    }

    /// Append one request row.  Infallible by design.
    pub async fn record(
        &self,
        set: &str,
        record: Option<&BibRecord>,
        user: Option<&Patron>,
        data: serde_json::Value,
    ) {
        let Some(pool) = &self.pool else {
            return;
        };

        let mut logdata = record
            .map(|r| r.log_summary())
            .unwrap_or_else(|| serde_json::json!({}));
        if let Some(object) = logdata.as_object_mut() {
            object.insert(
                "user".to_string(),
                serde_json::Value::String(user.map(|u| u.uni.clone()).unwrap_or_default()),
            );
            if let serde_json::Value::Object(extra) = data {
                object.extend(extra);
            }
        }

        let result = sqlx::query(
            "INSERT INTO request_logs (set_name, logdata, created_at) VALUES ($1, $2, now())",
        )
        .bind(set)
        .bind(&logdata)
        .execute(pool)
        .await;

        if let Err(e) = result {
            tracing::error!("audit log write failed for set {}: {}", set, e);
            tracing::error!("unlogged data: {}", logdata);
        }
    }
}
