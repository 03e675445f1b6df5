use thiserror::Error;

/// Errors that fail a whole request.
///
/// Upstream problems never show up here; they only shrink the result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Request body must contain a packages array")]
    MissingPackages,
}

impl RequestError {
    /// HTTP status equivalent, for callers that front this with a server.
    pub fn status_code(&self) -> u16 {
        match self {
            RequestError::MissingPackages => 400,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
