//! Lead-capture intake: every contact form submission passes the gatekeeper first.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{LeadId, LeadReceipt, LeadRecord, LeadSubmission};
pub use repository::{LeadRepository, RepositoryError};
pub use router::lead_router;
pub use service::{LeadService, LeadServiceError, LEAD_FORM_SCOPE};
