use thiserror::Error;

/// Errors returned by a [`crate::CompletionService`].
///
/// The fallback logic in [`crate::CompletionClient`] only ever looks at the
/// text returned by [`ServiceError::message`], so every variant must carry
/// the service's own wording where one exists.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The service answered successfully but without a usable result cell.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A request or response body was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A failure that only carries a message string.
    #[error("{0}")]
    Rejected(String),
}

impl ServiceError {
    /// The message string that error classification matches against.
    pub fn message(&self) -> String {
        match self {
            ServiceError::Api { message, .. } => message.clone(),
            ServiceError::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn api_message_is_the_raw_service_text() {
        let err = ServiceError::Api {
            status: 422,
            message: "SQL compilation error: Invalid argument types".into(),
        };
        assert_eq!(err.message(), "SQL compilation error: Invalid argument types");
        assert!(err.to_string().starts_with("API error: 422"));
    }

    #[test]
    fn rejected_displays_its_message_verbatim() {
        let err = ServiceError::Rejected("boom".into());
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.message(), "boom");
    }
}
