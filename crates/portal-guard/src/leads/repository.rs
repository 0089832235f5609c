use super::domain::{LeadId, LeadRecord};

/// Storage abstraction so the lead service can be exercised in isolation.
pub trait LeadRepository: Send + Sync {
    fn insert(&self, record: LeadRecord) -> Result<LeadRecord, RepositoryError>;
    fn fetch(&self, id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("lead already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
