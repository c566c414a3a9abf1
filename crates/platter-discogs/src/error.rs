// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscogsError>;

#[derive(Debug, Error)]
pub enum DiscogsError {
    /// Discogs answered 401. Never retried.
    #[error("Unauthorized")]
    Unauthorized,

    /// Any other non-success HTTP outcome.
    #[error("Discogs API error: {status} - {message}")]
    Protocol { status: u16, message: String },

    /// The call was rejected before touching the network.
    #[error("Invalid request: {0}")]
    Configuration(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Rate limiter closed")]
    RateLimiterClosed,
}

impl DiscogsError {
    /// HTTP status associated with the error, if the server produced one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DiscogsError::Unauthorized => Some(401),
            DiscogsError::Protocol { status, .. } => Some(*status),
            DiscogsError::Http(error) => error.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DiscogsError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code() {
        assert_eq!(DiscogsError::Unauthorized.status_code(), Some(401));
        let protocol = DiscogsError::Protocol {
            status: 422,
            message: "bad".to_string(),
        };
        assert_eq!(protocol.status_code(), Some(422));
        assert_eq!(
            DiscogsError::Configuration("nope".to_string()).status_code(),
            None
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(DiscogsError::Unauthorized.to_string(), "Unauthorized");
        let protocol = DiscogsError::Protocol {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(protocol.to_string(), "Discogs API error: 404 - Not Found");
    }
}
