//! Frames of a query response

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::ClientError;
use crate::statement::KsqlErrorBody;

/// First frame of every query response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHeader {
    pub query_id: Option<String>,
    pub columns: Vec<String>,
    pub column_types: Vec<String>,
    /// Schema of protobuf-encoded rows.
    pub proto_schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowPayload {
    /// The inside of a JSON value list, without the outer brackets.
    Json(String),
    /// Decoded `protobufBytes`.
    Binary(Vec<u8>),
}

#[derive(Debug)]
pub enum Frame {
    Header(QueryHeader),
    Row(RowPayload),
    /// The server failed the query.
    Error(ClientError),
    /// `/query` end-of-results marker, e.g. `Limit Reached`.
    Final(String),
    /// Anything else, e.g. a tombstone row or an unknown object.
    Skip,
}

// ---------------------------------------------------------------------------
// `/query` wire models
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct V1Frame {
    #[serde(default)]
    pub header: Option<V1Header>,
    #[serde(default)]
    pub row: Option<V1Row>,
    #[serde(default)]
    pub error_message: Option<KsqlErrorBody>,
    #[serde(default)]
    pub final_message: Option<String>,
    /// Bare error object, sent without the `errorMessage` wrapper.
    #[serde(rename = "@type", default)]
    pub kind: Option<String>,
    #[serde(rename = "error_code", alias = "errorCode", default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub statement_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct V1Header {
    #[serde(default)]
    pub query_id: Option<String>,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub proto_schema: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct V1Row {
    #[serde(default)]
    pub columns: Option<Box<RawValue>>,
    #[serde(default)]
    pub protobuf_bytes: Option<String>,
    #[serde(default)]
    pub tombstone: Option<bool>,
}

// ---------------------------------------------------------------------------
// `/query-stream` wire models
// ---------------------------------------------------------------------------

/// Any object line of a `/query-stream` response: the header, a binary row
/// or an error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct V2Object {
    #[serde(default)]
    pub query_id: Option<String>,
    #[serde(default)]
    pub column_names: Option<Vec<String>>,
    #[serde(default)]
    pub column_types: Option<Vec<String>>,
    #[serde(default)]
    pub proto_schema: Option<String>,
    #[serde(default)]
    pub row: Option<V1Row>,
    #[serde(rename = "@type", default)]
    pub kind: Option<String>,
    #[serde(rename = "error_code", alias = "errorCode", default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub statement_text: Option<String>,
}
