use serde::{Deserialize, Serialize};

/// SDK error type
///
/// Variants are grouped by how the sync engine reacts to them, see [`ErrorClass`].
#[derive(Debug, thiserror::Error)]
pub enum FieldSyncError {
    // transient: connectivity, timeouts, 5xx
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Server error [{status}]: {message}")]
    Server { status: u16, message: String },
    #[error("Offline")]
    Offline,

    // rejection: 4xx, replaying would fail identically
    #[error("Rejected [{status}]: {message}")]
    Rejected { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    // local persistence
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("KV store error: {0}")]
    KvStore(String),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Outbox unavailable, mutation could not be saved: {0}")]
    OutboxUnavailable(String),

    #[error("Sync already in progress for {0}")]
    SyncInProgress(String),
    #[error("Sync state was reset during the run")]
    SyncReset,
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    IO(String),
    #[error("Other error: {0}")]
    Other(String),
}

/// Coarse error classes the engine routes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// No connectivity, timeout or 5xx
    Transient,
    /// 4xx validation rejection
    Rejected,
    /// Credentials could not be refreshed
    Auth,
    /// Disk or database unavailable
    LocalPersistence,
    /// Another run holds the resource type
    InProgress,
    /// Sync state was cleared (logout) while the run was going
    Reset,
    /// Bad payload or contract violation
    InvalidData,
    Other,
}

impl FieldSyncError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::Offline => ErrorClass::Transient,
            Self::Server { status, .. } => {
                if *status >= 500 {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Rejected
                }
            }
            Self::Rejected { .. } => ErrorClass::Rejected,
            Self::Auth(_) => ErrorClass::Auth,
            Self::Storage(_)
            | Self::KvStore(_)
            | Self::Migration(_)
            | Self::OutboxUnavailable(_)
            | Self::IO(_) => ErrorClass::LocalPersistence,
            Self::SyncInProgress(_) => ErrorClass::InProgress,
            Self::SyncReset => ErrorClass::Reset,
            Self::InvalidData(_) | Self::Serialization(_) => ErrorClass::InvalidData,
            Self::Config(_) | Self::Other(_) => ErrorClass::Other,
        }
    }

    /// Whether a failed mutation should be kept in the outbox for replay.
    ///
    /// Auth failures count as retryable: the write is valid, only the session is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Transient | ErrorClass::Auth)
    }

    /// Map an HTTP status to the matching error variant
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Auth(message),
            400..=499 => Self::Rejected { status, message },
            _ => Self::Server { status, message },
        }
    }
}

impl From<rusqlite::Error> for FieldSyncError {
    fn from(error: rusqlite::Error) -> Self {
        FieldSyncError::Storage(error.to_string())
    }
}

impl From<sled::Error> for FieldSyncError {
    fn from(error: sled::Error) -> Self {
        FieldSyncError::KvStore(error.to_string())
    }
}

impl From<serde_json::Error> for FieldSyncError {
    fn from(error: serde_json::Error) -> Self {
        FieldSyncError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for FieldSyncError {
    fn from(error: std::io::Error) -> Self {
        FieldSyncError::IO(error.to_string())
    }
}

impl From<reqwest::Error> for FieldSyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FieldSyncError::Timeout(error.to_string())
        } else if let Some(status) = error.status() {
            FieldSyncError::from_status(status.as_u16(), error.to_string())
        } else if error.is_decode() {
            FieldSyncError::InvalidData(error.to_string())
        } else {
            // connect / request / body errors never reached the server
            FieldSyncError::Network(error.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, FieldSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(FieldSyncError::Network("down".into()).class(), ErrorClass::Transient);
        assert_eq!(FieldSyncError::Offline.class(), ErrorClass::Transient);
        assert_eq!(FieldSyncError::from_status(503, "busy").class(), ErrorClass::Transient);
        assert_eq!(FieldSyncError::from_status(422, "bad hours").class(), ErrorClass::Rejected);
        assert_eq!(FieldSyncError::from_status(401, "expired").class(), ErrorClass::Auth);
        assert_eq!(
            FieldSyncError::Storage("disk full".into()).class(),
            ErrorClass::LocalPersistence
        );
    }

    #[test]
    fn test_retryable() {
        assert!(FieldSyncError::Timeout("30s".into()).is_retryable());
        assert!(FieldSyncError::from_status(500, "oops").is_retryable());
        assert!(FieldSyncError::Auth("expired".into()).is_retryable());
        assert!(!FieldSyncError::from_status(400, "missing shift").is_retryable());
        assert!(!FieldSyncError::Storage("corrupt".into()).is_retryable());
    }
}
