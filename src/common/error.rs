use thiserror::Error;

/// Client-side failures. API errors keep the backend text when it sent one.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{}", .message.as_deref().unwrap_or("request failed"))]
    Api {
        status: Option<u16>,
        message: Option<String>,
    },
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Validation(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("realtime: {0}")]
    Realtime(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    /// Rejected locally; sending the same input again cannot succeed.
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    /// Text for the error banner: the backend's own message or validation text
    /// when there is one, `fallback` otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Api {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            ClientError::Validation(message) => message.clone(),
            _ => fallback.to_string(),
        }
    }

    /// Like [`user_message`](Self::user_message) but falls back to the error's
    /// own description, e.g. "Failed to send message: network error: ...".
    pub fn detail(&self) -> String {
        match self {
            ClientError::Api {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_message_wins_over_fallback() {
        let err = ClientError::Api {
            status: Some(400),
            message: Some("User already in group".into()),
        };
        assert_eq!(err.user_message("Failed to add member"), "User already in group");

        let err = ClientError::Api {
            status: Some(500),
            message: None,
        };
        assert_eq!(err.user_message("Failed to add member"), "Failed to add member");
        assert_eq!(err.detail(), "request failed");
    }

    #[test]
    fn validation_text_is_shown_verbatim() {
        let err = ClientError::validation("Group name is required");
        assert_eq!(err.user_message("ignored"), "Group name is required");
    }
}
