use thiserror::Error;

/// Classified failure of a trust-layer or persistence call.
///
/// The variants form the closed set of error kinds the HTTP layer knows how
/// to translate. Internal messages are meant for logs; the server replaces
/// them with a generic message before they reach a client.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BazaarError {
    /// Malformed or policy-violating input.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid session.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Valid request shape, but the caller is not allowed to proceed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Store, network or random-source failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BazaarError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for BazaarError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("row not found"),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::already_exists(db_err.message().to_string())
            }
            other => Self::internal(format!("database error: {other}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, BazaarError>;
