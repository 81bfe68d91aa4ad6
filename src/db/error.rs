use mongodb::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Database is not available: {0}")]
    Unavailable(String),
}

impl DbError {
    /// Short machine-readable name used as the `error_type` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            DbError::Mongo(e) => match e.kind.as_ref() {
                ErrorKind::ServerSelection { .. } => "server_selection",
                ErrorKind::Authentication { .. } => "authentication",
                ErrorKind::Io(_) => "io",
                ErrorKind::Command(_) => "command",
                ErrorKind::InvalidArgument { .. } => "invalid_argument",
                _ => "mongo",
            },
            DbError::Unavailable(_) => "unavailable",
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_kind_and_message() {
        let err = DbError::Unavailable("no reply within 2s".into());
        assert_eq!(err.kind(), "unavailable");
        assert_eq!(err.to_string(), "Database is not available: no reply within 2s");
    }
}
