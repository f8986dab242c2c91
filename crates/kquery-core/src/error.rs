//! Query compilation and model registration errors

use thiserror::Error;

/// Failure to turn a query description into ksql text.
///
/// Compilation never produces partial text: any construct the compiler does
/// not understand fails the whole statement before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationError {
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("Unsupported projection: {0}")]
    UnsupportedProjection(String),

    #[error("Invalid query chain: {0}")]
    InvalidChain(String),

    #[error("Aggregate function {0} requires a preceding GroupBy")]
    AggregateWithoutGrouping(String),

    #[error("Group key referenced without a preceding GroupBy")]
    GroupKeyWithoutGrouping,

    #[error("Unknown source binding '{0}'")]
    UnknownBinding(String),

    #[error("Lambda expressions are only valid as function arguments")]
    MisplacedLambda,

    #[error("Unsupported value for column '{column}': {reason}")]
    UnsupportedValue { column: String, reason: String },

    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Errors raised while registering entity metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Member '{member}' is registered more than once on '{entity}'")]
    DuplicateMember { entity: String, member: String },

    #[error("Entity '{0}' is registered more than once")]
    DuplicateEntity(String),

    #[error("Entity '{entity}' has no member named '{member}'")]
    UnknownMember { entity: String, member: String },

    #[error("Invalid decimal precision {precision},{scale}: scale exceeds precision")]
    InvalidPrecision { precision: u8, scale: u8 },
}
