//! kquery client: typed ksqlDB queries over HTTP
//!
//! Builds on `kquery-core` to submit compiled queries and statements to a
//! ksqlDB server and decode the streamed responses into serde types.
//!
//! ## Example
//!
//! ```ignore
//! use futures::StreamExt;
//! use kquery_client::{KsqlDbContext, KsqlDbContextOptions};
//! use kquery_core::prelude::*;
//!
//! let context = KsqlDbContext::new(KsqlDbContextOptions::builder("http://localhost:8088").build()?);
//!
//! let mut titles = context
//!     .create_query_stream::<Movie>()
//!     .filter(col("Id").lt(3))
//!     .select::<String>(Projection::Value(col("Title")))
//!     .into_stream()
//!     .await?;
//!
//! while let Some(title) = titles.next().await {
//!     println!("{}", title?);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`context`]: entry point, lifecycle, statements and inserts
//! - [`queryable`]: deferred push and pull query sets
//! - [`stream`], [`subscription`]: consuming running queries
//! - [`protocol`]: response frames and row reconstruction
//! - [`rest_client`]: the HTTP endpoints

pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod parameters;
pub mod protocol;
pub mod queryable;
pub mod rest_client;
pub mod statement;
pub mod stream;
pub mod subscription;

pub use config::{
    BasicAuthCredentials, KsqlDbContextOptions, KsqlDbContextOptionsBuilder, QueryEndpoint,
};
pub use context::KsqlDbContext;
pub use error::{ClientError, Result};
pub use parameters::{AutoOffsetReset, QueryParameters, QueryStreamParameters, RequestParameters};
pub use protocol::BinaryRowDecoder;
pub use queryable::{PullQuerySet, QueryStreamSet};
pub use rest_client::KsqlRestClient;
pub use statement::{
    CommandStatus, HealthCheckResponse, KsqlDbStatement, ServerInfo, StatementResponse,
};
pub use stream::QueryStream;
pub use subscription::{QueryObserver, Subscription};
