//! `WITH (…)` properties of CREATE statements

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::literal::quote_string;
use crate::window::KsqlDuration;

/// Key or value serialization format of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SerializationFormat {
    None,
    Delimited,
    Json,
    JsonSr,
    Avro,
    Kafka,
    Protobuf,
    ProtobufNosr,
}

impl SerializationFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializationFormat::None => "NONE",
            SerializationFormat::Delimited => "DELIMITED",
            SerializationFormat::Json => "JSON",
            SerializationFormat::JsonSr => "JSON_SR",
            SerializationFormat::Avro => "AVRO",
            SerializationFormat::Kafka => "KAFKA",
            SerializationFormat::Protobuf => "PROTOBUF",
            SerializationFormat::ProtobufNosr => "PROTOBUF_NOSR",
        }
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WindowType {
    Session,
    Hopping,
    Tumbling,
}

impl WindowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowType::Session => "SESSION",
            WindowType::Hopping => "HOPPING",
            WindowType::Tumbling => "TUMBLING",
        }
    }
}

/// Properties of a created stream or table.
///
/// Properties are emitted in a fixed order with every value single-quoted,
/// e.g. `WITH (KAFKA_TOPIC='movies', VALUE_FORMAT='JSON', PARTITIONS='1')`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityCreationMetadata {
    pub kafka_topic: Option<String>,
    pub key_format: Option<SerializationFormat>,
    pub value_format: Option<SerializationFormat>,
    pub partitions: Option<u32>,
    pub replicas: Option<u16>,
    pub window_type: Option<WindowType>,
    pub window_size: Option<KsqlDuration>,
    pub timestamp: Option<String>,
    pub timestamp_format: Option<String>,
    pub wrap_single_value: Option<bool>,
    pub value_delimiter: Option<String>,
    pub key_schema_id: Option<u32>,
    pub value_schema_id: Option<u32>,
    pub key_schema_full_name: Option<String>,
    pub value_schema_full_name: Option<String>,
    pub retention_ms: Option<u64>,
}

impl EntityCreationMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kafka_topic(mut self, topic: impl Into<String>) -> Self {
        self.kafka_topic = Some(topic.into());
        self
    }

    pub fn key_format(mut self, format: SerializationFormat) -> Self {
        self.key_format = Some(format);
        self
    }

    pub fn value_format(mut self, format: SerializationFormat) -> Self {
        self.value_format = Some(format);
        self
    }

    pub fn partitions(mut self, partitions: u32) -> Self {
        self.partitions = Some(partitions);
        self
    }

    pub fn replicas(mut self, replicas: u16) -> Self {
        self.replicas = Some(replicas);
        self
    }

    pub fn window(mut self, window_type: WindowType, size: Option<KsqlDuration>) -> Self {
        self.window_type = Some(window_type);
        self.window_size = size;
        self
    }

    pub fn timestamp(mut self, column: impl Into<String>) -> Self {
        self.timestamp = Some(column.into());
        self
    }

    pub fn timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = Some(format.into());
        self
    }

    pub fn wrap_single_value(mut self, wrap: bool) -> Self {
        self.wrap_single_value = Some(wrap);
        self
    }

    pub fn value_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.value_delimiter = Some(delimiter.into());
        self
    }

    pub fn key_schema_id(mut self, id: u32) -> Self {
        self.key_schema_id = Some(id);
        self
    }

    pub fn value_schema_id(mut self, id: u32) -> Self {
        self.value_schema_id = Some(id);
        self
    }

    pub fn key_schema_full_name(mut self, name: impl Into<String>) -> Self {
        self.key_schema_full_name = Some(name.into());
        self
    }

    pub fn value_schema_full_name(mut self, name: impl Into<String>) -> Self {
        self.value_schema_full_name = Some(name.into());
        self
    }

    pub fn retention_ms(mut self, retention: u64) -> Self {
        self.retention_ms = Some(retention);
        self
    }

    /// `(name, value)` pairs in emission order.
    pub fn properties(&self) -> Vec<(&'static str, String)> {
        let mut props = Vec::new();
        let mut push = |name: &'static str, value: Option<String>| {
            if let Some(value) = value {
                props.push((name, value));
            }
        };

        push("KAFKA_TOPIC", self.kafka_topic.clone());
        push("KEY_FORMAT", self.key_format.map(|f| f.as_str().to_string()));
        push("VALUE_FORMAT", self.value_format.map(|f| f.as_str().to_string()));
        push("PARTITIONS", self.partitions.map(|p| p.to_string()));
        push("REPLICAS", self.replicas.map(|r| r.to_string()));
        push("WINDOW_TYPE", self.window_type.map(|w| w.as_str().to_string()));
        push("WINDOW_SIZE", self.window_size.map(|d| d.to_string()));
        push("TIMESTAMP", self.timestamp.clone());
        push("TIMESTAMP_FORMAT", self.timestamp_format.clone());
        push("WRAP_SINGLE_VALUE", self.wrap_single_value.map(|w| w.to_string()));
        push("VALUE_DELIMITER", self.value_delimiter.clone());
        push("KEY_SCHEMA_ID", self.key_schema_id.map(|i| i.to_string()));
        push("VALUE_SCHEMA_ID", self.value_schema_id.map(|i| i.to_string()));
        push("KEY_SCHEMA_FULL_NAME", self.key_schema_full_name.clone());
        push("VALUE_SCHEMA_FULL_NAME", self.value_schema_full_name.clone());
        push("RETENTION_MS", self.retention_ms.map(|r| r.to_string()));
        props
    }

    pub fn is_empty(&self) -> bool {
        self.properties().is_empty()
    }

    /// `WITH (…)`, or `None` when no property is set.
    pub fn to_with_clause(&self) -> Option<String> {
        let props = self.properties();
        if props.is_empty() {
            return None;
        }
        let body = props
            .into_iter()
            .map(|(name, value)| format!("{}={}", name, quote_string(&value)))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!("WITH ({})", body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metadata_has_no_clause() {
        assert!(EntityCreationMetadata::new().to_with_clause().is_none());
    }

    #[test]
    fn test_properties_in_fixed_order() {
        let metadata = EntityCreationMetadata::new()
            .partitions(1)
            .value_format(SerializationFormat::Json)
            .kafka_topic("movies");

        assert_eq!(
            metadata.to_with_clause().unwrap(),
            "WITH (KAFKA_TOPIC='movies', VALUE_FORMAT='JSON', PARTITIONS='1')"
        );
    }

    #[test]
    fn test_window_properties() {
        let metadata = EntityCreationMetadata::new()
            .window(WindowType::Tumbling, Some(KsqlDuration::minutes(10)))
            .wrap_single_value(false);

        assert_eq!(
            metadata.to_with_clause().unwrap(),
            "WITH (WINDOW_TYPE='TUMBLING', WINDOW_SIZE='10 MINUTES', WRAP_SINGLE_VALUE='false')"
        );
    }

    #[test]
    fn test_quotes_in_values_are_doubled() {
        let metadata = EntityCreationMetadata::new().timestamp_format("yyyy-MM-dd''T''HH:mm");
        assert_eq!(
            metadata.to_with_clause().unwrap(),
            "WITH (TIMESTAMP_FORMAT='yyyy-MM-dd''''T''''HH:mm')"
        );
    }
}
