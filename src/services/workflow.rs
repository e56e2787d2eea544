//! Request workflow
//!
//! The per-request state machine every service shares: authenticate, apply
//! the cross-cutting block policy, load the record, run the eligibility
//! gates, then dispatch to a form render or an external redirect.  Failures
//! land in a terminal error outcome with a patron-readable message; they
//! never escape the workflow as raw errors.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::backends::Backends;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{BibRecord, DispatchKind, Patron, ServiceDefinition};
use crate::services::audit::AuditLog;
use crate::services::availability::AvailabilityResolver;
use crate::services::catalog::{ResolvedService, ServiceCatalog};
use crate::services::email::Mailer;
use crate::services::records::RecordService;

/// Raw request parameters, as handed over by the HTTP layer.
/// Multi-valued fields (item barcodes) travel comma-separated.
#[derive(Debug, Clone, Default)]
pub struct RequestParams(HashMap<String, String>);

impl RequestParams {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self(params)
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// The bib id parameter, when present.
    pub fn id(&self) -> Option<&str> {
        self.get("id")
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// A comma-separated multi-value field.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Serialize as a query string with sorted keys.
    pub fn to_query(&self) -> String {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// The lifecycle states of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Init,
    Authenticating,
    LoadingRecord,
    CheckingPatronEligibility,
    CheckingBibEligibility,
    BuildingUrl,
    RenderingForm,
    Submitting,
    SendingNotifications,
    Redirected,
    Confirmed,
    Errored,
}

/// What the HTTP layer should do with the request.
#[derive(Debug, Clone)]
pub enum WorkflowOutcome {
    Form { template: String, locals: Value },
    Redirect { url: String },
    Confirmation { template: String, locals: Value },
    Error { message: String },
}

/// Per-request aggregate, created at the start of a request and dropped at
/// its end.  All per-record memoization lives in the resolver it owns.
pub struct RequestContext {
    pub definition: ServiceDefinition,
    pub params: RequestParams,
    pub user: Option<Patron>,
    pub record: Option<BibRecord>,
    pub resolver: AvailabilityResolver,
    state: WorkflowState,
}

impl RequestContext {
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    fn enter(&mut self, state: WorkflowState) {
        tracing::debug!(
            "{}: {:?} -> {:?}",
            self.definition.key,
            self.state,
            state
        );
        self.state = state;
    }
}

pub struct RequestWorkflow {
    config: Arc<AppConfig>,
    catalog: Arc<ServiceCatalog>,
    records: RecordService,
    backends: Backends,
    clancy_locations: Arc<Vec<String>>,
    mailer: Arc<Mailer>,
    audit: AuditLog,
}

impl RequestWorkflow {
    pub fn new(
        config: Arc<AppConfig>,
        catalog: Arc<ServiceCatalog>,
        records: RecordService,
        backends: Backends,
        mailer: Arc<Mailer>,
        audit: AuditLog,
    ) -> Self {
        let clancy_locations = Arc::new(config.locations.clancy.clone());
        Self {
            config,
            catalog,
            records,
            backends,
            clancy_locations,
            mailer,
            audit,
        }
    }

    /// Handle a GET: render the service's form or bounce to an external URL.
    pub async fn run_show(
        &self,
        service_key: &str,
        params: RequestParams,
        user: Option<Patron>,
    ) -> WorkflowOutcome {
        let (service, mut ctx) = match self.prepare(service_key, params, user).await {
            Ok(prepared) => prepared,
            Err(outcome) => return outcome,
        };

        let kind = service
            .strategy
            .dispatch_kind(service.definition.kind, ctx.record.as_ref());
        match kind {
            DispatchKind::Bounce => self.bounce(&service, &mut ctx).await,
            DispatchKind::Form => self.build_form(&service, &mut ctx).await,
        }
    }

    /// Handle a POST: run the submission, send notifications, confirm.
    pub async fn run_submit(
        &self,
        service_key: &str,
        params: RequestParams,
        user: Option<Patron>,
    ) -> WorkflowOutcome {
        let (service, mut ctx) = match self.prepare(service_key, params, user).await {
            Ok(prepared) => prepared,
            Err(outcome) => return outcome,
        };

        ctx.enter(WorkflowState::Submitting);
        let submission = match service
            .strategy
            .submit(&ctx.params, ctx.record.as_ref(), ctx.user.as_ref(), &ctx.resolver)
            .await
        {
            Ok(submission) => submission,
            Err(e) => return self.error(&mut ctx, e),
        };

        ctx.enter(WorkflowState::SendingNotifications);
        if let Err(e) = service
            .strategy
            .send_emails(
                &self.mailer,
                &ctx.params,
                ctx.record.as_ref(),
                ctx.user.as_ref(),
                &submission,
            )
            .await
        {
            return self.error(&mut ctx, e);
        }

        self.log(&ctx, json!({ "action": "submit" })).await;

        let locals = match service
            .strategy
            .confirmation_locals(&ctx.params, ctx.record.as_ref(), ctx.user.as_ref(), &submission)
            .await
        {
            Ok(locals) => locals,
            Err(e) => return self.error(&mut ctx, e),
        };

        ctx.enter(WorkflowState::Confirmed);
        WorkflowOutcome::Confirmation {
            template: format!("{}_confirm", service.definition.key),
            locals,
        }
    }

    /// The shared front half of the lifecycle: authentication, the block
    /// policy, record loading, and both eligibility gates.
    async fn prepare(
        &self,
        service_key: &str,
        params: RequestParams,
        user: Option<Patron>,
    ) -> Result<(ResolvedService, RequestContext), WorkflowOutcome> {
        let service = match self.catalog.resolve(service_key) {
            Ok(service) => service.clone(),
            Err(e) => {
                tracing::error!("service resolution failed: {}", e);
                return Err(WorkflowOutcome::Error {
                    message: e.user_message(),
                });
            }
        };

        let mut ctx = RequestContext {
            definition: service.definition.clone(),
            params,
            user,
            record: None,
            resolver: AvailabilityResolver::new(
                self.backends.clone(),
                self.clancy_locations.clone(),
            ),
            state: WorkflowState::Init,
        };

        ctx.enter(WorkflowState::Authenticating);
        if service.definition.authenticate && ctx.user.is_none() {
            return Err(WorkflowOutcome::Redirect {
                url: self.config.auth.sign_in_url.clone(),
            });
        }
        // Cross-cutting policy: blocked medical-campus staff may not use any
        // authenticated service, regardless of which one.
        if let Some(user) = &ctx.user {
            if user.has_affil(&self.config.cumc.block_affil) {
                tracing::info!("cumc block: {}", user.uni);
                return Err(WorkflowOutcome::Redirect {
                    url: self.config.cumc.block_url.clone(),
                });
            }
        }

        ctx.enter(WorkflowState::LoadingRecord);
        if let Some(bib_id) = ctx.params.id().map(str::to_string) {
            match self.records.record_for_bib_id(&bib_id).await {
                Ok(record) => ctx.record = Some(record),
                Err(e) => return Err(self.error(&mut ctx, e)),
            }
        }

        ctx.enter(WorkflowState::CheckingPatronEligibility);
        if let Some(user) = &ctx.user {
            if let Err(e) = service.strategy.patron_eligible(user).await {
                return Err(self.error(&mut ctx, e));
            }
        }

        ctx.enter(WorkflowState::CheckingBibEligibility);
        if let Some(record) = &ctx.record {
            if let Err(e) = service.strategy.bib_eligible(record, &ctx.resolver).await {
                return Err(self.error(&mut ctx, e));
            }
        }

        Ok((service, ctx))
    }

    /// Process a bounce service: build the URL, log, redirect.
    async fn bounce(
        &self,
        service: &ResolvedService,
        ctx: &mut RequestContext,
    ) -> WorkflowOutcome {
        ctx.enter(WorkflowState::BuildingUrl);
        let url = match service
            .strategy
            .service_url(&ctx.params, ctx.record.as_ref(), ctx.user.as_ref(), &ctx.resolver)
            .await
        {
            Ok(Some(url)) => url,
            Ok(None) => {
                // Unable to build a bounce URL? Error.
                ctx.enter(WorkflowState::Errored);
                return WorkflowOutcome::Error {
                    message: format!(
                        "Cannot determine bounce url for service {}",
                        service.definition.label
                    ),
                };
            }
            Err(e) => return self.error(ctx, e),
        };

        self.log(ctx, json!({ "action": "bounce", "url": url.clone() }))
            .await;
        tracing::debug!("bounce redirecting to {}", url);
        ctx.enter(WorkflowState::Redirected);
        WorkflowOutcome::Redirect { url }
    }

    /// Process a form service: set up the service-specific locals.
    async fn build_form(
        &self,
        service: &ResolvedService,
        ctx: &mut RequestContext,
    ) -> WorkflowOutcome {
        ctx.enter(WorkflowState::RenderingForm);
        match service
            .strategy
            .form_locals(&ctx.params, ctx.record.as_ref(), ctx.user.as_ref(), &ctx.resolver)
            .await
        {
            Ok(locals) => WorkflowOutcome::Form {
                template: service.definition.key.clone(),
                locals,
            },
            Err(e) => self.error(ctx, e),
        }
    }

    /// Append the audit row for this request.  Never fails the request.
    async fn log(&self, ctx: &RequestContext, data: Value) {
        self.audit
            .record(
                &ctx.definition.label,
                ctx.record.as_ref(),
                ctx.user.as_ref(),
                data,
            )
            .await;
    }

    /// Terminal error state: a patron-readable message, nothing raised.
    fn error(&self, ctx: &mut RequestContext, error: AppError) -> WorkflowOutcome {
        ctx.enter(WorkflowState::Errored);
        WorkflowOutcome::Error {
            message: error.user_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_list_splits_and_trims() {
        let params = RequestParams::from_pairs([("barcodes", "CU0001, CU0002,,CU0003")]);
        assert_eq!(params.list("barcodes"), vec!["CU0001", "CU0002", "CU0003"]);
        assert!(params.list("missing").is_empty());
    }

    #[test]
    fn params_empty_values_read_as_absent() {
        let params = RequestParams::from_pairs([("note", "")]);
        assert_eq!(params.get("note"), None);
    }

    #[test]
    fn params_query_is_sorted_and_encoded() {
        let params = RequestParams::from_pairs([("title", "a b"), ("author", "x&y")]);
        assert_eq!(params.to_query(), "author=x%26y&title=a%20b");
    }
}
