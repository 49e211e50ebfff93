//! Core error types

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid override: {0}")]
    Validation(ValidationErrors),

    #[error("Precondition failed: {0}")]
    Precondition(String),
}

/// Every constraint a rejected override specification violated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: impl Into<String>) {
        self.0.push(violation.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn violations(&self) -> &[String] {
        &self.0
    }

    /// Check whether any violation mentions the given text
    pub fn mentions(&self, needle: &str) -> bool {
        self.0.iter().any(|v| v.contains(needle))
    }

    pub(crate) fn into_result(self) -> Result<(), CoreError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("; "))
    }
}

/// Route lookup failure for a malformed request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Request path must start with '/': {0}")]
    InvalidPath(String),

    #[error("Malformed percent-encoding in path segment: {0}")]
    InvalidEncoding(String),
}

/// Failure raised by a functional override handler.
///
/// The dispatcher never inspects or rewrites it; it reaches the host
/// exactly as an application handler error would.
#[derive(Error, Debug)]
#[error("Override handler failed: {message}")]
pub struct HandlerFailure {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error
    pub fn from_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
