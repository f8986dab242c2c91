//! Deferred query sets
//!
//! A query set is a context plus an immutable operation chain. Every fluent
//! call returns a new set; nothing is compiled or sent until a terminal call
//! (`to_query_string`, `into_stream`, `subscribe`, `get_many`, …), and each
//! terminal call compiles fresh text and submits it once.

use std::marker::PhantomData;

use kquery_core::expr::Expr;
use kquery_core::{JoinSpec, Projection, QueryChain, QueryKind, QuerySource, TimeWindows};
use serde::de::DeserializeOwned;

use crate::context::KsqlDbContext;
use crate::error::Result;
use crate::parameters::RequestParameters;
use crate::stream::QueryStream;
use crate::subscription::{QueryObserver, Subscription};

/// Fluent chain operations shared by both set kinds.
macro_rules! chain_operations {
    ($set:ident) => {
        impl<T> $set<T> {
            pub(crate) fn new(context: KsqlDbContext, chain: QueryChain) -> Self {
                Self {
                    context,
                    chain,
                    parameters: None,
                    _marker: PhantomData,
                }
            }

            fn next<U>(&self, chain: QueryChain) -> $set<U> {
                $set {
                    context: self.context.clone(),
                    chain,
                    parameters: self.parameters.clone(),
                    _marker: PhantomData,
                }
            }

            pub fn chain(&self) -> &QueryChain {
                &self.chain
            }

            pub fn filter(&self, predicate: Expr) -> Self {
                self.next(self.chain.filter(predicate))
            }

            /// Project rows into a different record type.
            pub fn select<U>(&self, projection: Projection) -> $set<U> {
                self.next(self.chain.select(projection))
            }

            pub fn group_by(&self, key: Expr) -> Self {
                self.next(self.chain.group_by(key))
            }

            pub fn group_by_composite<I, S>(&self, keys: I) -> Self
            where
                I: IntoIterator<Item = (S, Expr)>,
                S: Into<String>,
            {
                self.next(self.chain.group_by_composite(keys))
            }

            pub fn having(&self, predicate: Expr) -> Self {
                self.next(self.chain.having(predicate))
            }

            pub fn windowed_by(&self, window: TimeWindows) -> Self {
                self.next(self.chain.windowed_by(window))
            }

            pub fn join(&self, source: QuerySource, left_key: Expr, right_key: Expr) -> Self {
                self.next(self.chain.join(source, left_key, right_key))
            }

            pub fn left_join(&self, source: QuerySource, left_key: Expr, right_key: Expr) -> Self {
                self.next(self.chain.left_join(source, left_key, right_key))
            }

            pub fn full_outer_join(
                &self,
                source: QuerySource,
                left_key: Expr,
                right_key: Expr,
            ) -> Self {
                self.next(self.chain.full_outer_join(source, left_key, right_key))
            }

            pub fn right_join(&self, source: QuerySource, left_key: Expr, right_key: Expr) -> Self {
                self.next(self.chain.right_join(source, left_key, right_key))
            }

            pub fn join_with(&self, spec: JoinSpec) -> Self {
                self.next(self.chain.join_with(spec))
            }

            pub fn take(&self, count: u32) -> Self {
                self.next(self.chain.take(count))
            }

            /// Request parameters for this set's submissions, overriding the
            /// context defaults. The statement text is always replaced.
            pub fn with_parameters(&self, parameters: impl Into<RequestParameters>) -> Self {
                let mut next = self.next(self.chain.clone());
                next.parameters = Some(parameters.into());
                next
            }
        }

        impl<T> Clone for $set<T> {
            fn clone(&self) -> Self {
                self.next(self.chain.clone())
            }
        }

        impl<T> std::fmt::Debug for $set<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($set))
                    .field("operations", &self.chain.len())
                    .field("parameters", &self.parameters)
                    .finish()
            }
        }
    };
}

/// A push query not yet submitted.
pub struct QueryStreamSet<T> {
    context: KsqlDbContext,
    chain: QueryChain,
    parameters: Option<RequestParameters>,
    _marker: PhantomData<fn() -> T>,
}

chain_operations!(QueryStreamSet);

impl<T> QueryStreamSet<T> {
    pub fn to_query_string(&self) -> Result<String> {
        Ok(self.context.compile(&self.chain, QueryKind::Push)?.text)
    }
}

impl<T> QueryStreamSet<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Submit the query and stream its rows.
    pub async fn into_stream(&self) -> Result<QueryStream<T>> {
        self.context
            .open_stream(&self.chain, QueryKind::Push, self.parameters.as_ref())
            .await
    }

    /// Submit the query and push its rows to `observer`.
    pub async fn subscribe<O>(&self, observer: O) -> Result<Subscription>
    where
        O: QueryObserver<T>,
    {
        let stream = self.into_stream().await?;
        Ok(Subscription::start(stream, observer))
    }
}

/// A pull query not yet submitted.
pub struct PullQuerySet<T> {
    context: KsqlDbContext,
    chain: QueryChain,
    parameters: Option<RequestParameters>,
    _marker: PhantomData<fn() -> T>,
}

chain_operations!(PullQuerySet);

impl<T> PullQuerySet<T> {
    pub fn to_query_string(&self) -> Result<String> {
        Ok(self.context.compile(&self.chain, QueryKind::Pull)?.text)
    }
}

impl<T> PullQuerySet<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub async fn get_many(&self) -> Result<Vec<T>> {
        self.context
            .open_stream::<T>(&self.chain, QueryKind::Pull, self.parameters.as_ref())
            .await?
            .collect_all()
            .await
    }

    /// First row, if any. Adds `LIMIT 1`.
    pub async fn first_or_default(&self) -> Result<Option<T>> {
        let rows = self
            .context
            .open_stream::<T>(&self.chain.take(1), QueryKind::Pull, self.parameters.as_ref())
            .await?
            .collect_all()
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KsqlDbContextOptions;
    use kquery_core::expr::col;
    use kquery_core::{EntityShape, KsqlEntity, ProjectedColumn, ValueShape};

    struct Movie;

    impl KsqlEntity for Movie {
        fn shape() -> EntityShape {
            EntityShape::builder("Movie")
                .key("Id", ValueShape::Int32)
                .field("Title", ValueShape::String)
                .build()
                .unwrap()
        }
    }

    fn context() -> KsqlDbContext {
        KsqlDbContext::new(KsqlDbContextOptions::default())
    }

    #[test]
    fn test_to_query_string_is_repeatable() {
        let set = context()
            .create_query_stream::<Movie>()
            .filter(col("Id").lt(3))
            .select::<String>(Projection::Value(col("Title")));

        let first = set.to_query_string().unwrap();
        assert_eq!(first, set.to_query_string().unwrap());
        assert_eq!(first, "SELECT Title FROM Movie WHERE Id < 3 EMIT CHANGES;");
    }

    #[test]
    fn test_sets_are_immutable() {
        let base = context().create_query_stream::<Movie>();
        let filtered = base.filter(col("Id").eq(1));

        assert_eq!(base.to_query_string().unwrap(), "SELECT * FROM Movie EMIT CHANGES;");
        assert_eq!(
            filtered.to_query_string().unwrap(),
            "SELECT * FROM Movie WHERE Id = 1 EMIT CHANGES;"
        );
    }

    #[test]
    fn test_pull_query_string() {
        let set = context()
            .create_pull_query::<Movie>()
            .filter(col("Id").eq(1))
            .select::<serde_json::Value>(Projection::record([ProjectedColumn::member("Title")]));

        assert_eq!(
            set.to_query_string().unwrap(),
            "SELECT Title FROM Movie WHERE Id = 1;"
        );
    }

    #[test]
    fn test_invalid_chain_reported_on_terminal_call() {
        let set = context()
            .create_query_stream::<Movie>()
            .having(col("Id").gt(1));
        assert!(matches!(
            set.to_query_string(),
            Err(crate::error::ClientError::Compilation(_))
        ));
    }
}
