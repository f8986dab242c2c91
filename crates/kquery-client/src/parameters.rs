//! Request bodies of the two query endpoints
//!
//! `/query` takes `{"ksql", "streamsProperties", "sessionVariables"}` while
//! `/query-stream` takes `{"sql", "properties", "sessionVariables"}`. Both
//! carry an `auto.offset.reset` property under a different key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a new push query starts reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoOffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl AutoOffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoOffsetReset::Earliest => "earliest",
            AutoOffsetReset::Latest => "latest",
        }
    }
}

/// Body of `POST /query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameters {
    #[serde(rename = "ksql")]
    pub sql: String,

    #[serde(rename = "streamsProperties", default)]
    pub properties: BTreeMap<String, Value>,

    #[serde(
        rename = "sessionVariables",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub session_variables: BTreeMap<String, Value>,
}

impl QueryParameters {
    pub const AUTO_OFFSET_RESET: &'static str = "ksql.streams.auto.offset.reset";

    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Self::default()
        }
    }

    pub fn with_sql(&self, sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..self.clone()
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn auto_offset_reset(self, reset: AutoOffsetReset) -> Self {
        self.property(Self::AUTO_OFFSET_RESET, reset.as_str())
    }

    pub fn session_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.session_variables.insert(name.into(), value.into());
        self
    }
}

impl Default for QueryParameters {
    fn default() -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            Self::AUTO_OFFSET_RESET.to_string(),
            Value::from(AutoOffsetReset::Earliest.as_str()),
        );
        Self {
            sql: String::new(),
            properties,
            session_variables: BTreeMap::new(),
        }
    }
}

/// Body of `POST /query-stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStreamParameters {
    pub sql: String,

    #[serde(default)]
    pub properties: BTreeMap<String, Value>,

    #[serde(
        rename = "sessionVariables",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub session_variables: BTreeMap<String, Value>,
}

impl QueryStreamParameters {
    pub const AUTO_OFFSET_RESET: &'static str = "auto.offset.reset";

    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Self::default()
        }
    }

    pub fn with_sql(&self, sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..self.clone()
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn auto_offset_reset(self, reset: AutoOffsetReset) -> Self {
        self.property(Self::AUTO_OFFSET_RESET, reset.as_str())
    }

    pub fn session_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.session_variables.insert(name.into(), value.into());
        self
    }
}

impl Default for QueryStreamParameters {
    fn default() -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            Self::AUTO_OFFSET_RESET.to_string(),
            Value::from(AutoOffsetReset::Earliest.as_str()),
        );
        Self {
            sql: String::new(),
            properties,
            session_variables: BTreeMap::new(),
        }
    }
}

/// Parameters for either endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestParameters {
    Query(QueryParameters),
    QueryStream(QueryStreamParameters),
}

impl RequestParameters {
    pub fn sql(&self) -> &str {
        match self {
            RequestParameters::Query(p) => &p.sql,
            RequestParameters::QueryStream(p) => &p.sql,
        }
    }

    /// Same properties, different statement text.
    pub fn with_sql(&self, sql: impl Into<String>) -> Self {
        match self {
            RequestParameters::Query(p) => RequestParameters::Query(p.with_sql(sql)),
            RequestParameters::QueryStream(p) => RequestParameters::QueryStream(p.with_sql(sql)),
        }
    }

    pub fn to_body(&self) -> serde_json::Result<Value> {
        match self {
            RequestParameters::Query(p) => serde_json::to_value(p),
            RequestParameters::QueryStream(p) => serde_json::to_value(p),
        }
    }
}

impl From<QueryParameters> for RequestParameters {
    fn from(p: QueryParameters) -> Self {
        RequestParameters::Query(p)
    }
}

impl From<QueryStreamParameters> for RequestParameters {
    fn from(p: QueryStreamParameters) -> Self {
        RequestParameters::QueryStream(p)
    }
}
