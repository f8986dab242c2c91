//! ksqlDB query response protocol
//!
//! Both query endpoints stream one frame per line: a header, then rows, with
//! an error frame possibly ending the sequence early.
//!
//! - `/query` wraps frames in a JSON array (`[{"header":…},\n{"row":…},\n…]`)
//!   and describes columns with a ksql schema string.
//! - `/query-stream` sends a bare header object followed by bare value lists.
//!
//! Rows are not parsed as JSON here. Their values are split positionally and
//! reassembled into an object keyed by column name, see [`row`].

pub mod frames;
pub mod lines;
pub mod reader;
pub mod row;
pub mod schema;

pub use frames::{Frame, QueryHeader, RowPayload};
pub use lines::LineBuffer;
pub use reader::FrameReader;
pub use row::{BinaryRowDecoder, ColumnAlias, RowDecoder};
