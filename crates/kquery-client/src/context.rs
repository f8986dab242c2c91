//! Entry point of the client
//!
//! A [`KsqlDbContext`] owns the configuration, the shared HTTP client and the
//! lifecycle of everything started through it. Query sets created from it
//! compile lazily and submit only on their terminal calls.

use std::sync::Arc;

use kquery_core::statements::{
    self, insert_statement, AssertSchema, AssertTopic, CreateAsSelect, CreateEntity, CreateType,
    DropEntity, InsertProperties, ShowKind,
};
use kquery_core::{
    CompiledQuery, KsqlEntity, QueryChain, QueryCompiler, QueryKind, QuerySource, SourceKind,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{KsqlDbContextOptions, QueryEndpoint};
use crate::error::{ClientError, Result};
use crate::lifecycle::Lifecycle;
use crate::parameters::RequestParameters;
use crate::protocol::{BinaryRowDecoder, ColumnAlias, RowDecoder};
use crate::queryable::{PullQuerySet, QueryStreamSet};
use crate::rest_client::KsqlRestClient;
use crate::statement::{HealthCheckResponse, KsqlDbStatement, ServerInfo, StatementResponse};
use crate::stream::{QueryRequest, QueryStream};

#[derive(Debug)]
struct ContextInner {
    options: KsqlDbContextOptions,
    compiler: QueryCompiler,
    lifecycle: Lifecycle<KsqlRestClient>,
    pending: Mutex<Vec<KsqlDbStatement>>,
}

/// Handle to a ksqlDB server. Cheap to clone; clones share one lifecycle.
#[derive(Clone)]
pub struct KsqlDbContext {
    inner: Arc<ContextInner>,
    binary_decoder: Option<Arc<dyn BinaryRowDecoder>>,
}

impl std::fmt::Debug for KsqlDbContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KsqlDbContext")
            .field("url", &self.inner.options.url)
            .field("endpoint", &self.inner.options.endpoint)
            .field("disposed", &self.inner.lifecycle.is_disposed())
            .finish()
    }
}

impl KsqlDbContext {
    /// No I/O happens until the first request.
    pub fn new(options: KsqlDbContextOptions) -> Self {
        let compiler = QueryCompiler::new(options.compiler_options());
        Self {
            inner: Arc::new(ContextInner {
                options,
                compiler,
                lifecycle: Lifecycle::new(),
                pending: Mutex::new(Vec::new()),
            }),
            binary_decoder: None,
        }
    }

    /// Decoder for protobuf rows, used when `binary_rows` is enabled.
    pub fn with_binary_decoder(mut self, decoder: Arc<dyn BinaryRowDecoder>) -> Self {
        self.binary_decoder = Some(decoder);
        self
    }

    pub fn options(&self) -> &KsqlDbContextOptions {
        &self.inner.options
    }

    pub fn compiler(&self) -> &QueryCompiler {
        &self.inner.compiler
    }

    /// Build the HTTP client and, when configured, check the server is reachable.
    pub async fn initialize(&self) -> Result<()> {
        self.client().await.map(|_| ())
    }

    /// Cancel running queries and refuse further work.
    pub async fn dispose(&self) {
        if self.inner.lifecycle.dispose().await.is_some() {
            info!(url = %self.inner.options.url, "context disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lifecycle.is_disposed()
    }

    pub(crate) async fn client(&self) -> Result<KsqlRestClient> {
        let options = &self.inner.options;
        self.inner
            .lifecycle
            .get_or_init(|| async move {
                options.validate()?;
                let client = KsqlRestClient::new(options)?;
                if options.verify_connection {
                    let info = client.info().await?;
                    info!(version = %info.version, url = %options.url, "connected to ksqlDB");
                }
                Ok(client)
            })
            .await
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Push query over the stream named after `T`.
    pub fn create_query_stream<T: KsqlEntity>(&self) -> QueryStreamSet<T> {
        self.create_query_stream_from(QuerySource::of::<T>(SourceKind::Stream))
    }

    /// Push query over any stream or table.
    pub fn create_query_stream_from<T>(&self, source: QuerySource) -> QueryStreamSet<T> {
        QueryStreamSet::new(self.clone(), QueryChain::from_source(source))
    }

    /// Pull query over the table named after `T`.
    pub fn create_pull_query<T: KsqlEntity>(&self) -> PullQuerySet<T> {
        self.create_pull_query_from(QuerySource::of::<T>(SourceKind::Table))
    }

    pub fn create_pull_query_from<T>(&self, source: QuerySource) -> PullQuerySet<T> {
        PullQuerySet::new(self.clone(), QueryChain::from_source(source))
    }

    pub fn compile(&self, chain: &QueryChain, kind: QueryKind) -> Result<CompiledQuery> {
        Ok(self.inner.compiler.compile(chain, kind)?)
    }

    /// Compile and submit a chain, returning its rows as a stream.
    pub(crate) async fn open_stream<T>(
        &self,
        chain: &QueryChain,
        kind: QueryKind,
        parameters: Option<&RequestParameters>,
    ) -> Result<QueryStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let compiled = self.compile(chain, kind)?;
        let client = self.client().await?;
        let options = &self.inner.options;

        let parameters = match parameters {
            Some(p) => p.with_sql(&compiled.text),
            None => options.query_parameters().with_sql(&compiled.text),
        };
        let endpoint = match &parameters {
            RequestParameters::Query(_) => QueryEndpoint::Query,
            RequestParameters::QueryStream(_) => QueryEndpoint::QueryStream,
        };

        let mut decoder =
            RowDecoder::new(compiled.result_shape).with_aliases(column_aliases(chain, &compiled));
        if let Some(binary) = &self.binary_decoder {
            decoder = decoder.with_binary_decoder(Arc::clone(binary));
        }

        debug!(text = %compiled.text, endpoint = endpoint.path(), "submitting query");
        let request = QueryRequest {
            endpoint,
            parameters,
            binary_rows: options.binary_rows,
            bounded: kind == QueryKind::Pull,
        };
        Ok(QueryStream::open(
            client,
            request,
            decoder,
            options.channel_capacity,
            self.inner.lifecycle.shutdown_token().child_token(),
        ))
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    pub async fn execute_statement(
        &self,
        statement: impl Into<KsqlDbStatement>,
    ) -> Result<Vec<StatementResponse>> {
        let statement = statement.into();
        let client = self.client().await?;
        client.execute_statement(&statement).await
    }

    pub async fn create_as_select(&self, statement: CreateAsSelect) -> Result<Vec<StatementResponse>> {
        self.execute_statement(statement.build_ksql(&self.inner.options.compiler_options())?)
            .await
    }

    pub async fn create_entity(&self, statement: CreateEntity) -> Result<Vec<StatementResponse>> {
        self.execute_statement(statement.build_ksql(&self.inner.options.compiler_options())?)
            .await
    }

    pub async fn create_type(&self, statement: CreateType) -> Result<Vec<StatementResponse>> {
        self.execute_statement(statement.build_ksql(&self.inner.options.compiler_options())?)
            .await
    }

    pub async fn drop_entity(&self, statement: DropEntity) -> Result<Vec<StatementResponse>> {
        self.execute_statement(statement.build_ksql(self.inner.options.escaping))
            .await
    }

    pub async fn drop_type(&self, name: &str, if_exists: bool) -> Result<Vec<StatementResponse>> {
        self.execute_statement(statements::drop_type(
            name,
            if_exists,
            self.inner.options.escaping,
        ))
        .await
    }

    /// Stop a persistent query.
    pub async fn terminate_persistent_query(
        &self,
        query_id: &str,
    ) -> Result<Vec<StatementResponse>> {
        self.execute_statement(statements::terminate(query_id)).await
    }

    pub async fn terminate_all(&self) -> Result<Vec<StatementResponse>> {
        self.execute_statement(statements::terminate_all()).await
    }

    /// Stop a push query by id.
    pub async fn terminate_push_query(&self, query_id: &str) -> Result<()> {
        self.client().await?.close_query(query_id).await
    }

    pub async fn show(&self, kind: ShowKind) -> Result<Vec<StatementResponse>> {
        self.execute_statement(statements::show(kind)).await
    }

    pub async fn assert_topic(&self, statement: AssertTopic) -> Result<Vec<StatementResponse>> {
        self.execute_statement(statement.build_ksql()).await
    }

    pub async fn assert_schema(&self, statement: AssertSchema) -> Result<Vec<StatementResponse>> {
        self.execute_statement(statement.build_ksql()?).await
    }

    pub async fn server_info(&self) -> Result<ServerInfo> {
        self.client().await?.info().await
    }

    pub async fn health_check(&self) -> Result<HealthCheckResponse> {
        self.client().await?.health_check().await
    }

    // ------------------------------------------------------------------------
    // Inserts
    // ------------------------------------------------------------------------

    /// Render an `INSERT INTO … VALUES` for `entity`.
    pub fn insert_statement<T>(&self, entity: &T, properties: &InsertProperties) -> Result<String>
    where
        T: KsqlEntity + Serialize,
    {
        let value = serde_json::to_value(entity)?;
        Ok(insert_statement(
            &T::shape(),
            &value,
            properties,
            &self.inner.options.compiler_options(),
        )?)
    }

    pub async fn insert<T>(
        &self,
        entity: &T,
        properties: &InsertProperties,
    ) -> Result<Vec<StatementResponse>>
    where
        T: KsqlEntity + Serialize,
    {
        let text = self.insert_statement(entity, properties)?;
        self.execute_statement(text).await
    }

    /// Queue an insert for the next [`save_changes`](Self::save_changes).
    pub async fn add<T>(&self, entity: &T) -> Result<()>
    where
        T: KsqlEntity + Serialize,
    {
        self.add_with(entity, &InsertProperties::new()).await
    }

    pub async fn add_with<T>(&self, entity: &T, properties: &InsertProperties) -> Result<()>
    where
        T: KsqlEntity + Serialize,
    {
        if self.is_disposed() {
            return Err(ClientError::Disposed);
        }
        let text = self.insert_statement(entity, properties)?;
        self.inner.pending.lock().await.push(KsqlDbStatement::new(text));
        Ok(())
    }

    pub async fn pending_changes(&self) -> usize {
        self.inner.pending.lock().await.len()
    }

    /// Send queued inserts in order.
    ///
    /// Stops at the first failure; that statement and the ones after it stay
    /// queued.
    pub async fn save_changes(&self) -> Result<Vec<StatementResponse>> {
        let mut pending = self.inner.pending.lock().await;
        let client = self.client().await?;

        let mut responses = Vec::new();
        while let Some(statement) = pending.first() {
            let result = client.execute_statement(statement).await?;
            responses.extend(result);
            pending.remove(0);
        }
        Ok(responses)
    }
}

/// Map header columns back onto projected names or entity members.
fn column_aliases(chain: &QueryChain, compiled: &CompiledQuery) -> Vec<ColumnAlias> {
    if !compiled.columns.is_empty() {
        return compiled
            .columns
            .iter()
            .map(|c| ColumnAlias::new(c.clone(), c.clone()))
            .collect();
    }

    chain
        .source()
        .and_then(|source| source.shape.as_ref())
        .map(|shape| {
            shape
                .fields()
                .iter()
                .map(|f| ColumnAlias::new(f.column_name(), f.member.clone()))
                .collect()
        })
        .unwrap_or_default()
}
