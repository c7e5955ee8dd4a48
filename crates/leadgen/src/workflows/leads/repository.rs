use chrono::{DateTime, Utc};

use super::domain::{Lead, LeadActivity, LeadId};

/// Storage abstraction so the intake service can be exercised in isolation.
pub trait LeadRepository: Send + Sync {
    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError>;
    fn fetch(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;
    /// Leads whose consent was given from `ip` at or after `since`.
    fn count_from_ip_since(&self, ip: &str, since: DateTime<Utc>)
        -> Result<usize, RepositoryError>;
    fn record_activity(&self, activity: LeadActivity) -> Result<(), RepositoryError>;
    fn activities(&self, id: &LeadId) -> Result<Vec<LeadActivity>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
