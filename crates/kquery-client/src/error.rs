//! Error types for ksqlDB client operations.
//!
//! ## Error Handling Strategy
//!
//! - **Defects**: `Compilation`, `Protocol` (never retried)
//! - **Server rejections**: `Statement`, `Http` (carry enough context to
//!   decide on a retry, none is done automatically)
//! - **Caller decisions**: `Cancelled`, `Disposed`
//! - **Transport**: `Transport`, `Json`
//!
//! ## Examples
//!
//! ```ignore
//! use kquery_client::ClientError;
//!
//! match context.execute_statement(statement).await {
//!     Ok(response) => println!("{:?}", response),
//!     Err(ClientError::Statement { message, error_code, .. }) => {
//!         eprintln!("rejected ({:?}): {}", error_code, message);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use kquery_core::CompilationError;
use thiserror::Error;

/// Convenience type alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The query description could not be turned into ksql.
    ///
    /// Raised before any request is sent.
    #[error("Compilation error: {0}")]
    Compilation(#[from] CompilationError),

    /// The response stream did not follow the expected frame sequence,
    /// e.g. a row arrived before the header.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server rejected a statement or failed a running query.
    #[error(
        "Statement error{}: {message}",
        .error_code.map(|c| format!(" {}", c)).unwrap_or_default()
    )]
    Statement {
        message: String,
        statement_text: Option<String>,
        error_code: Option<i64>,
    },

    /// The caller cancelled the query.
    #[error("Query cancelled")]
    Cancelled,

    /// Network-level failure surfaced by the HTTP client.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status whose body was not a ksqlDB error object.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The context was disposed before or during the call.
    #[error("Context has been disposed")]
    Disposed,
}

impl ClientError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        ClientError::Protocol(message.into())
    }

    /// True when the caller asked for the query to stop.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_error_display() {
        let err = ClientError::Statement {
            message: "Line: 1, Col: 8: SELECT column 'X' cannot be resolved.".to_string(),
            statement_text: Some("SELECT X FROM Movies;".to_string()),
            error_code: Some(40001),
        };
        assert_eq!(
            err.to_string(),
            "Statement error 40001: Line: 1, Col: 8: SELECT column 'X' cannot be resolved."
        );
    }

    #[test]
    fn test_compilation_error_converts() {
        let err: ClientError = CompilationError::MisplacedLambda.into();
        assert!(matches!(err, ClientError::Compilation(_)));
        assert!(!err.is_cancelled());
        assert!(ClientError::Cancelled.is_cancelled());
    }
}
