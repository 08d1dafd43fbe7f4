use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the attendance engine. Input problems are rejected
/// before any state mutation; storage failures are wrapped transparently.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid attendance status '{0}' (expected PRESENT, ABSENT, EXCUSED or LATE)")]
    InvalidAttendanceStatus(String),

    #[error("invalid follow-up status '{0}' (expected PENDING, IN_PROGRESS, CONTACTED, RESOLVED or DISMISSED)")]
    InvalidSuggestionStatus(String),

    #[error("invalid suggestion category '{0}'")]
    InvalidCategory(String),

    #[error("invalid suggestion priority '{0}'")]
    InvalidPriority(String),

    #[error("invalid trend direction '{0}'")]
    InvalidTrendDirection(String),

    #[error("follow-up suggestion {0} not found")]
    SuggestionNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_status_names_the_value() {
        let err = EngineError::InvalidAttendanceStatus("MAYBE".to_string());
        assert!(err.to_string().contains("MAYBE"));
    }

    #[test]
    fn not_found_names_the_id() {
        let id = Uuid::new_v4();
        let err = EngineError::SuggestionNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
