//! kquery core: ksql compilation without I/O
//!
//! Describes ksqlDB queries as immutable operation chains and turns them,
//! together with entity shapes, into exact ksql statement text.
//!
//! ## Example
//!
//! ```ignore
//! use kquery_core::prelude::*;
//!
//! let chain = QueryChain::from_source(QuerySource::stream("Movie"))
//!     .filter(col("Id").lt(3))
//!     .select(Projection::members(["Title"]));
//!
//! let text = QueryCompiler::default().compile(&chain, QueryKind::Push)?.text;
//! assert_eq!(text, "SELECT Title FROM Movie WHERE Id < 3 EMIT CHANGES;");
//! ```
//!
//! ## Statements
//!
//! - `SELECT` (push, pull and persistent bodies) via [`QueryCompiler`]
//! - `CREATE STREAM/TABLE … AS SELECT` and column-declared `CREATE [SOURCE]`
//! - `CREATE TYPE`, `INSERT INTO … VALUES`, `ASSERT TOPIC/SCHEMA`
//! - `DROP`, `DROP TYPE`, `TERMINATE`, `SHOW`

pub mod compiler;
pub mod error;
pub mod expr;
pub mod functions;
pub mod identifier;
pub mod literal;
pub mod model;
pub mod query;
pub mod shape;
pub mod statements;
pub mod types;
pub mod window;

pub use compiler::{
    pluralize, CompiledQuery, CompilerOptions, QueryCompiler, QueryKind, ResultShape,
};
pub use error::{CompilationError, ModelError};
pub use identifier::IdentifierEscaping;
pub use model::{ModelBuilder, ModelMetadata};
pub use query::{
    GroupKey, JoinKind, JoinSpec, JoinWithin, ProjectedColumn, Projection, QueryChain,
    QueryOperation, QuerySource, SourceKind,
};
pub use shape::{
    DecimalPrecision, EntityShape, FieldMetadata, HeaderMapping, KsqlEntity, ValueShape,
};
pub use types::{KsqlType, TypeTranslator};
pub use window::{KsqlDuration, TimeUnit, TimeWindows};

/// Result type for compilation
pub type Result<T> = std::result::Result<T, CompilationError>;

/// Everything needed to describe and compile queries.
pub mod prelude {
    pub use crate::compiler::{CompilerOptions, QueryCompiler, QueryKind};
    pub use crate::expr::{
        array, case_when, col, group_key, group_key_field, lambda, lit, map, param, pseudo,
        qcol, raw, structure, window_bound, BinaryOp, BoundValue, Expr, PseudoColumn,
        WindowBound,
    };
    pub use crate::functions;
    pub use crate::query::{ProjectedColumn, Projection, QueryChain, QuerySource};
    pub use crate::shape::{EntityShape, KsqlEntity, ValueShape};
    pub use crate::window::{KsqlDuration, TimeWindows};
}
