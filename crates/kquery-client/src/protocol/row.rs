//! Row reconstruction
//!
//! Rows arrive as a positional value list (`["a",1,{"x":2}]`). Each value is
//! split out of the raw text without parsing it, then zipped with the header
//! column names into a JSON object that serde can deserialize into the caller's
//! record type.
//!
//! Strings use backslash escapes: `\"` does not end a string and `""` is not
//! special.

use std::sync::Arc;

use kquery_core::ResultShape;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::protocol::frames::{QueryHeader, RowPayload};

/// Decodes protobuf-encoded rows.
///
/// ksqlDB sends the row's protobuf bytes together with the schema text from
/// the header. Implementations turn them into a JSON value keyed by column
/// name.
pub trait BinaryRowDecoder: Send + Sync {
    fn decode(&self, proto_schema: &str, bytes: &[u8]) -> Result<Value>;
}

/// Split the inside of a value list on top-level commas.
pub fn split_fields(raw: &str) -> Result<Vec<&str>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let mut fields = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, b) in raw.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ClientError::protocol(format!("unbalanced row: {}", raw)))?;
            }
            b',' if depth == 0 => {
                fields.push(raw[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    if in_string || depth != 0 {
        return Err(ClientError::protocol(format!("unterminated row: {}", raw)));
    }
    fields.push(raw[start..].trim());
    Ok(fields)
}

/// Build `{"<name>":<value>,…}` from column names and raw field texts.
pub fn to_object(names: &[String], fields: &[&str]) -> Result<String> {
    if names.len() != fields.len() {
        return Err(ClientError::protocol(format!(
            "row has {} values but header declares {} columns",
            fields.len(),
            names.len()
        )));
    }

    let mut object = String::with_capacity(fields.iter().map(|f| f.len() + 8).sum());
    object.push('{');
    for (i, (name, field)) in names.iter().zip(fields).enumerate() {
        if i > 0 {
            object.push(',');
        }
        object.push_str(&serde_json::to_string(name)?);
        object.push(':');
        object.push_str(field);
    }
    object.push('}');
    Ok(object)
}

/// A header column name mapped onto the member name records use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAlias {
    pub column: String,
    pub member: String,
}

impl ColumnAlias {
    pub fn new(column: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            member: member.into(),
        }
    }
}

/// Turns row payloads of one query into records.
#[derive(Clone)]
pub struct RowDecoder {
    result_shape: ResultShape,
    aliases: Vec<ColumnAlias>,
    binary: Option<Arc<dyn BinaryRowDecoder>>,
    names: Vec<String>,
    proto_schema: Option<String>,
}

impl std::fmt::Debug for RowDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowDecoder")
            .field("result_shape", &self.result_shape)
            .field("names", &self.names)
            .field("binary", &self.binary.is_some())
            .finish()
    }
}

impl RowDecoder {
    pub fn new(result_shape: ResultShape) -> Self {
        Self {
            result_shape,
            aliases: Vec::new(),
            binary: None,
            names: Vec::new(),
            proto_schema: None,
        }
    }

    /// Server column names are upper-cased; aliases restore the member names.
    pub fn with_aliases(mut self, aliases: Vec<ColumnAlias>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_binary_decoder(mut self, decoder: Arc<dyn BinaryRowDecoder>) -> Self {
        self.binary = Some(decoder);
        self
    }

    pub fn has_header(&self) -> bool {
        !self.names.is_empty()
    }

    /// Field names used for every following row.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn apply_header(&mut self, header: &QueryHeader) {
        self.names = header
            .columns
            .iter()
            .map(|column| {
                self.aliases
                    .iter()
                    .find(|a| a.column.eq_ignore_ascii_case(column))
                    .map(|a| a.member.clone())
                    .unwrap_or_else(|| column.clone())
            })
            .collect();
        self.proto_schema = header.proto_schema.clone();
    }

    pub fn decode<T: DeserializeOwned>(&self, payload: &RowPayload) -> Result<T> {
        if !self.has_header() {
            return Err(ClientError::protocol("row received before header"));
        }

        match payload {
            RowPayload::Json(raw) => {
                let fields = split_fields(raw)?;
                if fields.len() == 1
                    && self.names.len() == 1
                    && self.result_shape == ResultShape::Scalar
                {
                    return Ok(serde_json::from_str(fields[0])?);
                }
                let object = to_object(&self.names, &fields)?;
                Ok(serde_json::from_str(&object)?)
            }
            RowPayload::Binary(bytes) => {
                let decoder = self.binary.as_ref().ok_or_else(|| {
                    ClientError::protocol("binary row received without a binary row decoder")
                })?;
                let schema = self.proto_schema.as_deref().ok_or_else(|| {
                    ClientError::protocol("binary row received without a protobuf schema")
                })?;
                Ok(serde_json::from_value(decoder.decode(schema, bytes)?)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn header(columns: &[&str]) -> QueryHeader {
        QueryHeader {
            query_id: Some("q1".to_string()),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            column_types: Vec::new(),
            proto_schema: None,
        }
    }

    #[test]
    fn test_split_nested_values() {
        assert_eq!(
            split_fields(r#"{"d":4,"c":2},true"#).unwrap(),
            vec![r#"{"d":4,"c":2}"#, "true"]
        );
        assert_eq!(
            split_fields(r#"[1,[2,3]], "a,b", null"#).unwrap(),
            vec!["[1,[2,3]]", r#""a,b""#, "null"]
        );
    }

    #[test]
    fn test_split_escaped_quote_in_string() {
        assert_eq!(
            split_fields(r#""say \"hi\", bye",1"#).unwrap(),
            vec![r#""say \"hi\", bye""#, "1"]
        );
        assert_eq!(
            split_fields(r#""back\\",2"#).unwrap(),
            vec![r#""back\\""#, "2"]
        );
    }

    #[test]
    fn test_split_rejects_unterminated() {
        assert!(split_fields(r#""open,1"#).is_err());
        assert!(split_fields("{\"a\":1").is_err());
        assert!(split_fields("1]").is_err());
    }

    #[test]
    fn test_split_empty_row() {
        assert!(split_fields("  ").unwrap().is_empty());
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Counts {
        d: i32,
        c: i32,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        #[serde(rename = "KSQL_COL_0")]
        counts: Counts,
        #[serde(rename = "IsRobot")]
        is_robot: bool,
    }

    #[test]
    fn test_decode_struct_and_bool() {
        let mut decoder = RowDecoder::new(ResultShape::Record);
        decoder.apply_header(&header(&["KSQL_COL_0", "IsRobot"]));

        let row: Row = decoder
            .decode(&RowPayload::Json(r#"{"d":4,"c":2},true"#.to_string()))
            .unwrap();
        assert_eq!(
            row,
            Row {
                counts: Counts { d: 4, c: 2 },
                is_robot: true
            }
        );
    }

    #[test]
    fn test_decode_matches_serialized_values() {
        let columns = vec![
            serde_json::json!({"a": [1, {"b": "x,]}\"y"}]}),
            Value::from("\", [ok] {no}"),
            serde_json::json!([[1, 2], [], [[3, ["four"]]]]),
            Value::Null,
            serde_json::json!(-1.5e-7),
            serde_json::json!({"m": {"k,1": "v\\"}, "n": null}),
            Value::from(true),
        ];
        let names: Vec<String> = (0..columns.len()).map(|i| format!("C{}", i)).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let line = serde_json::to_string(&columns).unwrap();
        let inner = &line[1..line.len() - 1];

        let mut decoder = RowDecoder::new(ResultShape::Record);
        decoder.apply_header(&header(&name_refs));
        let row: Value = decoder
            .decode(&RowPayload::Json(inner.to_string()))
            .unwrap();

        for (name, expected) in names.iter().zip(&columns) {
            assert_eq!(&row[name.as_str()], expected, "column {}", name);
        }
    }

    #[test]
    fn test_single_column_scalar_bypasses_object() {
        let mut decoder = RowDecoder::new(ResultShape::Scalar);
        decoder.apply_header(&header(&["TITLE"]));
        let title: String = decoder
            .decode(&RowPayload::Json(r#""Aliens""#.to_string()))
            .unwrap();
        assert_eq!(title, "Aliens");
    }

    #[test]
    fn test_single_column_record_keeps_object() {
        #[derive(Deserialize)]
        struct Titled {
            #[serde(rename = "Title")]
            title: String,
        }

        let mut decoder = RowDecoder::new(ResultShape::Record)
            .with_aliases(vec![ColumnAlias::new("Title", "Title")]);
        decoder.apply_header(&header(&["TITLE"]));
        let row: Titled = decoder
            .decode(&RowPayload::Json(r#""Aliens""#.to_string()))
            .unwrap();
        assert_eq!(row.title, "Aliens");
    }

    #[test]
    fn test_row_before_header_is_protocol_error() {
        let decoder = RowDecoder::new(ResultShape::Record);
        let err = decoder
            .decode::<Value>(&RowPayload::Json("1".to_string()))
            .unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[test]
    fn test_column_count_mismatch() {
        let mut decoder = RowDecoder::new(ResultShape::Record);
        decoder.apply_header(&header(&["A", "B"]));
        assert!(decoder
            .decode::<Value>(&RowPayload::Json("1".to_string()))
            .is_err());
    }

    struct Fixed;

    impl BinaryRowDecoder for Fixed {
        fn decode(&self, proto_schema: &str, bytes: &[u8]) -> Result<Value> {
            Ok(serde_json::json!({"schema": proto_schema, "len": bytes.len()}))
        }
    }

    #[test]
    fn test_binary_rows() {
        let mut with_schema = header(&["A"]);
        with_schema.proto_schema = Some("syntax = \"proto3\";".to_string());

        let mut decoder = RowDecoder::new(ResultShape::Record);
        decoder.apply_header(&with_schema);
        assert!(decoder
            .decode::<Value>(&RowPayload::Binary(vec![1, 2]))
            .is_err());

        let mut decoder = RowDecoder::new(ResultShape::Record).with_binary_decoder(Arc::new(Fixed));
        decoder.apply_header(&with_schema);
        let value: Value = decoder.decode(&RowPayload::Binary(vec![1, 2])).unwrap();
        assert_eq!(value["len"], 2);
    }
}
