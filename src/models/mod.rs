//! Typed domain records

pub mod availability;
pub mod bib;
pub mod patron;
pub mod service;

pub use availability::{AvailabilityMap, ItemStatus};
pub use bib::{BibRecord, Holding, Institution, Item};
pub use patron::Patron;
pub use service::{DispatchKind, ServiceDefinition};
