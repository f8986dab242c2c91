//! HTTP client for the ksqlDB REST API
//!
//! Endpoints:
//! - `POST /ksql` statements
//! - `POST /query`, `POST /query-stream` push and pull queries
//! - `POST /close-query` terminate a push query
//! - `GET /info`, `GET /healthcheck`
//!
//! One `reqwest::Client` is shared by every request of a context.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::{BasicAuthCredentials, KsqlDbContextOptions, QueryEndpoint};
use crate::error::{ClientError, Result};
use crate::parameters::RequestParameters;
use crate::statement::{
    HealthCheckResponse, KsqlDbStatement, KsqlErrorBody, ServerInfo, ServerInfoResponse,
    StatementResponse,
};

const KSQL_CONTENT_TYPE: &str = "application/vnd.ksql.v1+json";
const PROTOBUF_CONTENT_TYPE: &str = "application/vnd.ksql.v1+protobuf";

#[derive(Debug, Clone)]
pub struct KsqlRestClient {
    base_url: String,
    client: Client,
    auth: Option<BasicAuthCredentials>,
    timeout: Option<Duration>,
}

impl KsqlRestClient {
    pub fn new(options: &KsqlDbContextOptions) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: options.base_url().to_string(),
            client,
            auth: options.basic_auth.clone(),
            timeout: options.timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, url);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }
        request
    }

    fn bounded(&self, request: RequestBuilder) -> RequestBuilder {
        match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    /// Execute a statement against `POST /ksql`.
    pub async fn execute_statement(
        &self,
        statement: &KsqlDbStatement,
    ) -> Result<Vec<StatementResponse>> {
        debug!(text = %statement.text(), "executing statement");
        let request = self
            .request(reqwest::Method::POST, "/ksql")
            .header(ACCEPT, KSQL_CONTENT_TYPE)
            .header(CONTENT_TYPE, KSQL_CONTENT_TYPE)
            .json(statement);
        let response = self.bounded(request).send().await?;
        let responses: Vec<StatementResponse> = self.parse(response).await?;

        // A 200 can still carry a failed command.
        let failed = responses.iter().find_map(|entity| {
            entity
                .command_status
                .as_ref()
                .filter(|status| !status.is_success())
                .map(|status| (entity, status))
        });
        if let Some((entity, status)) = failed {
            warn!(status = %status.status, text = %statement.text(), "statement not successful");
            let message = if status.message.is_empty() {
                format!("command status {}", status.status)
            } else {
                status.message.clone()
            };
            return Err(ClientError::Statement {
                message,
                statement_text: entity
                    .statement_text
                    .clone()
                    .or_else(|| Some(statement.text().to_string())),
                error_code: None,
            });
        }
        Ok(responses)
    }

    /// Open a query and return the response with its body still streaming.
    ///
    /// Push queries pass `bounded = false`; the request timeout would cut
    /// them off.
    pub async fn open_query(
        &self,
        endpoint: QueryEndpoint,
        parameters: &RequestParameters,
        binary_rows: bool,
        bounded: bool,
    ) -> Result<Response> {
        let accept = if binary_rows {
            PROTOBUF_CONTENT_TYPE
        } else {
            endpoint.accept()
        };

        debug!(endpoint = endpoint.path(), sql = %parameters.sql(), "opening query");
        let mut request = self
            .request(reqwest::Method::POST, endpoint.path())
            .header(ACCEPT, accept)
            .json(&parameters.to_body()?);
        if bounded {
            request = self.bounded(request);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }

    /// Ask the server to stop a push query.
    pub async fn close_query(&self, query_id: &str) -> Result<()> {
        debug!(query_id = %query_id, "closing query");
        let request = self
            .request(reqwest::Method::POST, "/close-query")
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "queryId": query_id }));
        let response = self.bounded(request).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    pub async fn info(&self) -> Result<ServerInfo> {
        let request = self
            .request(reqwest::Method::GET, "/info")
            .header(ACCEPT, KSQL_CONTENT_TYPE);
        let response = self.bounded(request).send().await?;
        let info: ServerInfoResponse = self.parse(response).await?;
        Ok(info.server_info)
    }

    pub async fn health_check(&self) -> Result<HealthCheckResponse> {
        let request = self
            .request(reqwest::Method::GET, "/healthcheck")
            .header(ACCEPT, KSQL_CONTENT_TYPE);
        let response = self.bounded(request).send().await?;
        self.parse(response).await
    }

    async fn parse<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// ksqlDB error object when the body is one, plain HTTP error otherwise.
async fn error_from_response(response: Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match serde_json::from_str::<KsqlErrorBody>(&body) {
        Ok(error) => error.into(),
        Err(_) => ClientError::Http {
            status: status.as_u16(),
            body,
        },
    }
}
