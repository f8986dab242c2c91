//! Statements sent to `POST /ksql` and the response models of the
//! non-query endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;

/// A DDL/DML statement with its request-scoped settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KsqlDbStatement {
    #[serde(rename = "ksql")]
    text: String,

    #[serde(rename = "streamsProperties", skip_serializing_if = "Option::is_none")]
    properties: Option<BTreeMap<String, Value>>,

    #[serde(rename = "sessionVariables", skip_serializing_if = "Option::is_none")]
    session_variables: Option<BTreeMap<String, Value>>,
}

impl KsqlDbStatement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            properties: None,
            session_variables: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_session_variable(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.session_variables
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn properties(&self) -> Option<&BTreeMap<String, Value>> {
        self.properties.as_ref()
    }

    pub fn session_variables(&self) -> Option<&BTreeMap<String, Value>> {
        self.session_variables.as_ref()
    }
}

impl From<String> for KsqlDbStatement {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for KsqlDbStatement {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub query_id: Option<String>,
}

impl CommandStatus {
    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatementWarning {
    pub message: String,
}

/// One entity of a `/ksql` response.
///
/// Listing statements (`SHOW STREAMS`, …) return their payload in fields
/// that are kept in `details`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResponse {
    #[serde(rename = "@type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub statement_text: Option<String>,

    #[serde(default)]
    pub command_id: Option<String>,

    #[serde(default)]
    pub command_status: Option<CommandStatus>,

    #[serde(default)]
    pub command_sequence_number: Option<i64>,

    #[serde(default)]
    pub warnings: Vec<StatementWarning>,

    #[serde(flatten)]
    pub details: BTreeMap<String, Value>,
}

/// Error body returned by ksqlDB with a non-success status.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KsqlErrorBody {
    #[serde(rename = "@type", default)]
    pub kind: Option<String>,

    #[serde(rename = "error_code", alias = "errorCode", default)]
    pub error_code: Option<i64>,

    pub message: String,

    #[serde(default)]
    pub statement_text: Option<String>,
}

impl From<KsqlErrorBody> for ClientError {
    fn from(body: KsqlErrorBody) -> Self {
        ClientError::Statement {
            message: body.message,
            statement_text: body.statement_text,
            error_code: body.error_code,
        }
    }
}

/// `GET /info`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerInfoResponse {
    #[serde(rename = "KsqlServerInfo")]
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub version: String,
    #[serde(default)]
    pub kafka_cluster_id: Option<String>,
    #[serde(default)]
    pub ksql_service_id: Option<String>,
    #[serde(default)]
    pub server_status: Option<String>,
}

/// `GET /healthcheck`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    pub is_healthy: bool,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}
