//! HTTP API handlers
//!
//! Deliberately thin: handlers adapt workflow outcomes to JSON or redirect
//! responses and extract the pre-authenticated identity from trusted SSO
//! proxy headers.  All decisions live in the services layer.

pub mod forms;
pub mod health;
pub mod patron_barcode;
