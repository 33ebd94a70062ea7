use thiserror::Error;

/// Failure of a single starred-listing page request.
///
/// Every variant ends enumeration for the account it belongs to; the retry
/// policy only gets a chance at the ones reported by [`ListError::is_retryable`].
#[derive(Error, Debug)]
pub enum ListError {
    #[error("request for {account} page {page} failed: {source}")]
    Transport {
        account: String,
        page: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("listing for {account} page {page} returned HTTP {status}")]
    Status {
        account: String,
        page: u32,
        status: u16,
        body: String,
    },

    #[error("cannot decode listing for {account} page {page}: {source}")]
    Decode {
        account: String,
        page: u32,
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

impl ListError {
    /// Transport failures, server errors and 429s may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ListError::Transport { .. } => true,
            ListError::Status { status, .. } => *status == 429 || *status >= 500,
            ListError::Decode { .. } => false,
        }
    }

    /// Raw response body, when the server sent one.
    pub fn body(&self) -> Option<&str> {
        match self {
            ListError::Transport { .. } => None,
            ListError::Status { body, .. } | ListError::Decode { body, .. } => Some(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ListError {
        ListError::Status {
            account: "alice".to_string(),
            page: 1,
            status: code,
            body: "{}".to_string(),
        }
    }

    #[test]
    fn test_retryable_classification() {
        let transport = ListError::Transport {
            account: "alice".to_string(),
            page: 2,
            source: "connection reset".into(),
        };
        assert!(transport.is_retryable());
        assert!(status(502).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());

        let decode = ListError::Decode {
            account: "alice".to_string(),
            page: 1,
            source: serde_json::from_str::<Vec<u8>>("nope").unwrap_err(),
            body: "nope".to_string(),
        };
        assert!(!decode.is_retryable());
        assert_eq!(decode.body(), Some("nope"));
    }

    #[test]
    fn test_display_names_account_and_page() {
        let message = status(404).to_string();
        assert!(message.contains("alice"));
        assert!(message.contains("page 1"));
        assert!(message.contains("404"));
    }
}
