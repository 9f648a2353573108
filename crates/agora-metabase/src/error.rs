//! Metabase error types.

use agora_core::AgoraError;
use thiserror::Error;

/// Result type for Metabase operations.
pub type MetabaseResult<T> = Result<T, MetabaseError>;

/// Errors raised by the fact store.
#[derive(Debug, Error)]
pub enum MetabaseError {
    /// An insert found a value already stored at the address.
    #[error("{address} already exists")]
    AlreadyExists {
        /// The occupied address.
        address: String,
    },

    /// An update found no value at the address.
    #[error("{address} not found")]
    NotFound {
        /// The empty address.
        address: String,
    },

    /// An address component is empty or malformed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A write hook refused the write.
    #[error("write rejected: {0}")]
    Rejected(#[source] AgoraError),

    /// The SQLite driver failed.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl MetabaseError {
    /// Returns true for the "already exists" outcome.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

impl From<MetabaseError> for AgoraError {
    fn from(err: MetabaseError) -> Self {
        match err {
            MetabaseError::AlreadyExists { address } => {
                Self::conflict(format!("{address} already exists"))
            }
            MetabaseError::NotFound { address } => Self::not_found_resource(address),
            MetabaseError::InvalidAddress(reason) => Self::validation(reason),
            MetabaseError::Rejected(inner) => inner,
            MetabaseError::Sqlite(source) => Self::storage("fact store failure", source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                MetabaseError::AlreadyExists {
                    address: "people/knows/alice".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                MetabaseError::NotFound {
                    address: "people/knows/alice".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                MetabaseError::InvalidAddress("empty domain".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                MetabaseError::Rejected(AgoraError::authorization("no", None)),
                StatusCode::FORBIDDEN,
            ),
            (
                MetabaseError::Sqlite(rusqlite::Error::InvalidQuery),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AgoraError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_already_exists_message() {
        let err = MetabaseError::AlreadyExists {
            address: "people/knows/alice".into(),
        };
        assert!(err.is_already_exists());
        assert_eq!(err.to_string(), "people/knows/alice already exists");
    }
}
