use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::Utc;

use super::domain::{LeadId, LeadRecord, LeadSubmission};
use super::repository::{LeadRepository, RepositoryError};
use crate::safety::{ActionContext, GateDecision, Gatekeeper, RegistryTransport};

/// Rate-limit scope shared by every lead form on the portal.
pub const LEAD_FORM_SCOPE: &str = "lead-form";

static LEAD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_lead_id() -> LeadId {
    let id = LEAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeadId(format!("lead-{id:06}"))
}

/// Runs the gatekeeper over a form submission before persisting it.
pub struct LeadService<R, T> {
    repository: Arc<R>,
    gatekeeper: Arc<Gatekeeper<T>>,
}

impl<R, T> LeadService<R, T>
where
    R: LeadRepository + 'static,
    T: RegistryTransport + 'static,
{
    pub fn new(repository: Arc<R>, gatekeeper: Arc<Gatekeeper<T>>) -> Self {
        Self {
            repository,
            gatekeeper,
        }
    }

    /// Gatekeeping context for a submission arriving with `headers`.
    pub fn action_context(submission: &LeadSubmission, headers: &HeaderMap) -> ActionContext {
        let mut context = ActionContext::from_headers(headers)
            .with_user(
                submission.user_id.clone(),
                Some(submission.email.trim().to_string()),
            )
            .with_text(submission.name.clone())
            .with_text(submission.message.clone());

        if let Some(property_id) = &submission.property_id {
            context = context.with_property(property_id.clone());
        }

        let actor = context
            .ip_address
            .clone()
            .unwrap_or_else(|| submission.email.trim().to_lowercase());
        context.with_rate_limit_key(format!("{LEAD_FORM_SCOPE}:{actor}"))
    }

    pub async fn submit(
        &self,
        submission: LeadSubmission,
        headers: &HeaderMap,
    ) -> Result<LeadRecord, LeadServiceError> {
        if submission.email.trim().is_empty() {
            return Err(LeadServiceError::MissingContact);
        }

        let context = Self::action_context(&submission, headers);
        let decision = self.gatekeeper.evaluate(&context).await;
        if !decision.allowed {
            return Err(LeadServiceError::Rejected(decision));
        }

        let record = LeadRecord {
            lead_id: next_lead_id(),
            submission,
            client_ip: context.ip_address,
            received_at: Utc::now(),
        };
        Ok(self.repository.insert(record)?)
    }

    pub fn get(&self, id: &LeadId) -> Result<Option<LeadRecord>, LeadServiceError> {
        Ok(self.repository.fetch(id)?)
    }
}

/// Error raised by the lead service.
#[derive(Debug, thiserror::Error)]
pub enum LeadServiceError {
    #[error("an email address is required")]
    MissingContact,
    #[error("submission rejected")]
    Rejected(GateDecision),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
