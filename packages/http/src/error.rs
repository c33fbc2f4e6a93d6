/// Errors surfaced by the httpfs client.
///
/// The kind is decided here, at the protocol boundary, so callers can map it
/// without inspecting messages.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    #[error("invalid: {message}")]
    Invalid { message: String },

    #[error("transport error: {message}")]
    Transport { message: String },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Classify a non-success status for `path`.
    pub(crate) fn from_status(status: u16, status_text: &str, path: &str) -> Self {
        let path = path.to_string();
        match status {
            404 => Error::NotFound { path },
            403 => Error::PermissionDenied { path },
            409 => Error::AlreadyExists { path },
            _ => Error::Transport {
                message: format!("HTTP {} {} for '{}'", status, status_text, path),
            },
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(error: url::ParseError) -> Self {
        Error::Invalid {
            message: format!("URL parse error: {}", error),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Invalid {
            message: format!("JSON error: {}", error),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Transport {
            message: error.to_string(),
        }
    }
}
