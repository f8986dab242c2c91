//! Context configuration
//!
//! Options are usually built in code:
//!
//! ```ignore
//! let options = KsqlDbContextOptions::builder("http://localhost:8088")
//!     .endpoint(QueryEndpoint::QueryStream)
//!     .escaping(IdentifierEscaping::Keywords)
//!     .build()?;
//! ```
//!
//! or loaded from a TOML file:
//!
//! ```toml
//! url = "http://localhost:8088"
//! endpoint = "query-stream"
//! escaping = "keywords"
//! auto_offset_reset = "latest"
//!
//! [basic_auth]
//! username = "ksql"
//! password = "secret"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use kquery_core::{CompilerOptions, DecimalPrecision, IdentifierEscaping, ModelMetadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::parameters::{AutoOffsetReset, QueryParameters, QueryStreamParameters, RequestParameters};

/// Default capacity of the per-query row channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Which endpoint push and pull queries are posted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryEndpoint {
    /// `POST /query`, JSON array response.
    Query,
    /// `POST /query-stream`, newline-delimited response.
    #[default]
    QueryStream,
}

impl QueryEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            QueryEndpoint::Query => "/query",
            QueryEndpoint::QueryStream => "/query-stream",
        }
    }

    pub fn accept(&self) -> &'static str {
        match self {
            QueryEndpoint::Query => "application/vnd.ksql.v1+json",
            QueryEndpoint::QueryStream => "application/vnd.ksqlapi.delimited.v1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuthCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KsqlDbContextOptions {
    /// ksqlDB server base URL
    pub url: String,

    pub basic_auth: Option<BasicAuthCredentials>,

    pub endpoint: QueryEndpoint,

    pub escaping: IdentifierEscaping,

    /// Pluralize FROM items (`Movie` → `Movies`)
    pub pluralize_from_items: bool,

    pub default_decimal: DecimalPrecision,

    /// Request timeout in milliseconds. Push queries are not subject to it.
    pub timeout_ms: Option<u64>,

    pub auto_offset_reset: AutoOffsetReset,

    /// Extra properties sent with every query
    pub query_properties: BTreeMap<String, Value>,

    pub session_variables: BTreeMap<String, Value>,

    pub channel_capacity: usize,

    /// Ask the query endpoints for protobuf-encoded rows
    pub binary_rows: bool,

    /// Call `GET /info` while initializing
    pub verify_connection: bool,

    #[serde(skip)]
    pub model: ModelMetadata,
}

impl Default for KsqlDbContextOptions {
    fn default() -> Self {
        Self {
            url: "http://localhost:8088".to_string(),
            basic_auth: None,
            endpoint: QueryEndpoint::default(),
            escaping: IdentifierEscaping::default(),
            pluralize_from_items: false,
            default_decimal: DecimalPrecision::default(),
            timeout_ms: None,
            auto_offset_reset: AutoOffsetReset::default(),
            query_properties: BTreeMap::new(),
            session_variables: BTreeMap::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            binary_rows: false,
            verify_connection: false,
            model: ModelMetadata::default(),
        }
    }
}

impl KsqlDbContextOptions {
    pub fn builder(url: impl Into<String>) -> KsqlDbContextOptionsBuilder {
        KsqlDbContextOptionsBuilder {
            options: Self {
                url: url.into(),
                ..Self::default()
            },
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let options: Self = toml::from_str(contents)
            .map_err(|e| ClientError::Config(format!("invalid options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "url must start with http:// or https://, got '{}'",
                self.url
            )));
        }
        if self.channel_capacity == 0 {
            return Err(ClientError::Config(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            escaping: self.escaping,
            pluralize_from_items: self.pluralize_from_items,
            default_decimal: self.default_decimal,
            model: self.model.clone(),
        }
    }

    /// Default request parameters for the configured endpoint, without text.
    pub fn query_parameters(&self) -> RequestParameters {
        match self.endpoint {
            QueryEndpoint::Query => {
                let mut params = QueryParameters::default().auto_offset_reset(self.auto_offset_reset);
                params.properties.extend(self.query_properties.clone());
                params.session_variables = self.session_variables.clone();
                params.into()
            }
            QueryEndpoint::QueryStream => {
                let mut params =
                    QueryStreamParameters::default().auto_offset_reset(self.auto_offset_reset);
                params.properties.extend(self.query_properties.clone());
                params.session_variables = self.session_variables.clone();
                params.into()
            }
        }
    }
}

#[derive(Debug)]
pub struct KsqlDbContextOptionsBuilder {
    options: KsqlDbContextOptions,
}

impl KsqlDbContextOptionsBuilder {
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.options.basic_auth = Some(BasicAuthCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn endpoint(mut self, endpoint: QueryEndpoint) -> Self {
        self.options.endpoint = endpoint;
        self
    }

    pub fn escaping(mut self, escaping: IdentifierEscaping) -> Self {
        self.options.escaping = escaping;
        self
    }

    pub fn pluralize_from_items(mut self, pluralize: bool) -> Self {
        self.options.pluralize_from_items = pluralize;
        self
    }

    pub fn default_decimal(mut self, precision: DecimalPrecision) -> Self {
        self.options.default_decimal = precision;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn auto_offset_reset(mut self, reset: AutoOffsetReset) -> Self {
        self.options.auto_offset_reset = reset;
        self
    }

    pub fn query_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.query_properties.insert(key.into(), value.into());
        self
    }

    pub fn session_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options
            .session_variables
            .insert(name.into(), value.into());
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.options.channel_capacity = capacity;
        self
    }

    pub fn binary_rows(mut self, enabled: bool) -> Self {
        self.options.binary_rows = enabled;
        self
    }

    pub fn verify_connection(mut self, verify: bool) -> Self {
        self.options.verify_connection = verify;
        self
    }

    pub fn model(mut self, model: ModelMetadata) -> Self {
        self.options.model = model;
        self
    }

    pub fn build(self) -> Result<KsqlDbContextOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
