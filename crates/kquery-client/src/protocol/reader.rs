//! Frame classification for both query endpoints

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::config::QueryEndpoint;
use crate::error::{ClientError, Result};
use crate::protocol::frames::{Frame, QueryHeader, RowPayload, V1Frame, V1Row, V2Object};
use crate::protocol::lines::strip_array_framing;
use crate::protocol::schema;

/// Turns response lines into frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameReader {
    endpoint: QueryEndpoint,
}

impl FrameReader {
    pub fn new(endpoint: QueryEndpoint) -> Self {
        Self { endpoint }
    }

    pub fn read(&self, line: &str) -> Result<Frame> {
        match self.endpoint {
            QueryEndpoint::Query => read_v1(strip_array_framing(line)),
            QueryEndpoint::QueryStream => read_v2(line.trim()),
        }
    }
}

fn read_v1(line: &str) -> Result<Frame> {
    if line.is_empty() {
        return Ok(Frame::Skip);
    }

    let frame: V1Frame = serde_json::from_str(line)
        .map_err(|e| ClientError::protocol(format!("malformed frame {}: {}", line, e)))?;

    if let Some(header) = frame.header {
        debug!(query_id = ?header.query_id, "header frame");
        return Ok(Frame::Header(QueryHeader {
            query_id: header.query_id,
            columns: schema::column_names(&header.schema),
            column_types: schema::column_types(&header.schema),
            proto_schema: header.proto_schema,
        }));
    }

    if let Some(row) = frame.row {
        return read_row(row);
    }

    if let Some(error) = frame.error_message {
        debug!(error_code = ?error.error_code, "error frame");
        return Ok(Frame::Error(error.into()));
    }

    if frame.kind.is_some() || frame.message.is_some() {
        debug!(error_code = ?frame.error_code, kind = ?frame.kind, "error frame");
        return Ok(Frame::Error(ClientError::Statement {
            message: frame.message.or(frame.kind).unwrap_or_default(),
            statement_text: frame.statement_text,
            error_code: frame.error_code,
        }));
    }

    if let Some(message) = frame.final_message {
        return Ok(Frame::Final(message));
    }

    debug!(line = %line, "unrecognized frame");
    Ok(Frame::Skip)
}

fn read_v2(line: &str) -> Result<Frame> {
    if line.is_empty() {
        return Ok(Frame::Skip);
    }

    if line.starts_with('[') {
        return Ok(Frame::Row(RowPayload::Json(strip_brackets(line)?.to_string())));
    }

    let object: V2Object = serde_json::from_str(line)
        .map_err(|e| ClientError::protocol(format!("malformed frame {}: {}", line, e)))?;

    if let Some(columns) = object.column_names {
        debug!(query_id = ?object.query_id, "header frame");
        return Ok(Frame::Header(QueryHeader {
            query_id: object.query_id,
            columns,
            column_types: object.column_types.unwrap_or_default(),
            proto_schema: object.proto_schema,
        }));
    }

    if let Some(row) = object.row {
        return read_row(row);
    }

    if let Some(message) = object.message {
        debug!(error_code = ?object.error_code, kind = ?object.kind, "error frame");
        return Ok(Frame::Error(ClientError::Statement {
            message,
            statement_text: object.statement_text,
            error_code: object.error_code,
        }));
    }

    debug!(line = %line, "unrecognized frame");
    Ok(Frame::Skip)
}

fn read_row(row: V1Row) -> Result<Frame> {
    if row.tombstone.unwrap_or(false) {
        return Ok(Frame::Skip);
    }
    if let Some(columns) = row.columns {
        return Ok(Frame::Row(RowPayload::Json(
            strip_brackets(columns.get())?.to_string(),
        )));
    }
    if let Some(encoded) = row.protobuf_bytes {
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| ClientError::protocol(format!("invalid protobufBytes: {}", e)))?;
        return Ok(Frame::Row(RowPayload::Binary(bytes)));
    }
    Err(ClientError::protocol("row frame without columns"))
}

fn strip_brackets(raw: &str) -> Result<&str> {
    raw.trim()
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .ok_or_else(|| ClientError::protocol(format!("row is not a value list: {}", raw)))
}
