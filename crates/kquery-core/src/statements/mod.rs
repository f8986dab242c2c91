//! Statement generators
//!
//! Every generator is deterministic: the same inputs always produce
//! byte-identical text.

pub mod admin;
pub mod assert;
pub mod create;
pub mod insert;
pub mod properties;
pub mod type_def;

pub use admin::{drop_type, show, terminate, terminate_all, DropEntity, ShowKind};
pub use assert::{AssertSchema, AssertTopic};
pub use create::{CreateAsSelect, CreateEntity, CreationType, StatementContext};
pub use insert::{insert_statement, InsertProperties};
pub use properties::{EntityCreationMetadata, SerializationFormat, WindowType};
pub use type_def::CreateType;
