//! Immutable query-operation chains
//!
//! Every fluent call on [`QueryChain`] allocates a new [`QueryNode`] that
//! points at its predecessor. Chains are never mutated, so a chain can be
//! cloned, extended in two different directions and compiled any number of
//! times with identical results.

use std::fmt;
use std::sync::Arc;

use crate::expr::Expr;
use crate::shape::{EntityShape, KsqlEntity};
use crate::window::{KsqlDuration, TimeWindows};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Stream,
    Table,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Stream => f.write_str("STREAM"),
            SourceKind::Table => f.write_str("TABLE"),
        }
    }
}

/// A stream or table queried by name.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySource {
    pub name: String,
    /// Name expressions use to qualify this source's columns in joins.
    pub binding: String,
    pub kind: SourceKind,
    pub shape: Option<Arc<EntityShape>>,
}

impl QuerySource {
    fn new(name: impl Into<String>, kind: SourceKind) -> Self {
        let name = name.into();
        Self {
            binding: name.to_lowercase(),
            name,
            kind,
            shape: None,
        }
    }

    pub fn stream(name: impl Into<String>) -> Self {
        Self::new(name, SourceKind::Stream)
    }

    pub fn table(name: impl Into<String>) -> Self {
        Self::new(name, SourceKind::Table)
    }

    /// Source named after an entity, carrying the entity's shape.
    pub fn of<T: KsqlEntity>(kind: SourceKind) -> Self {
        let shape = T::shape();
        let mut source = Self::new(shape.name().to_string(), kind);
        source.shape = Some(Arc::new(shape));
        source
    }

    pub fn with_binding(mut self, binding: impl Into<String>) -> Self {
        self.binding = binding.into();
        self
    }

    pub fn with_shape(mut self, shape: EntityShape) -> Self {
        self.shape = Some(Arc::new(shape));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// One output column of a record projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedColumn {
    pub name: String,
    pub expr: Expr,
}

impl ProjectedColumn {
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }

    /// Column projected under its own member name.
    pub fn member(member: impl Into<String>) -> Self {
        let member = member.into();
        Self {
            expr: crate::expr::col(member.clone()),
            name: member,
        }
    }
}

/// Shape of the SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `SELECT *`
    All,
    /// A single value; rows decode to the value itself.
    Value(Expr),
    /// A record of named columns; rows decode to an object.
    Record(Vec<ProjectedColumn>),
}

impl Projection {
    pub fn record(columns: impl IntoIterator<Item = ProjectedColumn>) -> Self {
        Projection::Record(columns.into_iter().collect())
    }

    /// Record projection of members under their own names.
    pub fn members<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Record(members.into_iter().map(ProjectedColumn::member).collect())
    }
}

/// GroupBy key selector.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    Single(Expr),
    Composite(Vec<(String, Expr)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    FullOuter,
    Right,
}

impl JoinKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::FullOuter => "FULL OUTER JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// `WITHIN` clause of a stream-stream join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinWithin {
    Symmetric(KsqlDuration),
    Asymmetric {
        before: KsqlDuration,
        after: KsqlDuration,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub kind: JoinKind,
    pub source: QuerySource,
    pub left_key: Expr,
    pub right_key: Expr,
    pub projection: Option<Projection>,
    pub within: Option<JoinWithin>,
    pub grace_period: Option<KsqlDuration>,
}

impl JoinSpec {
    pub fn new(kind: JoinKind, source: QuerySource, left_key: Expr, right_key: Expr) -> Self {
        Self {
            kind,
            source,
            left_key,
            right_key,
            projection: None,
            within: None,
            grace_period: None,
        }
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn within(mut self, within: JoinWithin) -> Self {
        self.within = Some(within);
        self
    }

    pub fn with_grace_period(mut self, grace: KsqlDuration) -> Self {
        self.grace_period = Some(grace);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperation {
    Source(QuerySource),
    Where(Expr),
    Select(Projection),
    GroupBy(GroupKey),
    Having(Expr),
    WindowedBy(TimeWindows),
    Join(Box<JoinSpec>),
    PartitionBy(Expr),
    Take(u32),
}

impl QueryOperation {
    pub fn name(&self) -> &'static str {
        match self {
            QueryOperation::Source(_) => "Source",
            QueryOperation::Where(_) => "Where",
            QueryOperation::Select(_) => "Select",
            QueryOperation::GroupBy(_) => "GroupBy",
            QueryOperation::Having(_) => "Having",
            QueryOperation::WindowedBy(_) => "WindowedBy",
            QueryOperation::Join(_) => "Join",
            QueryOperation::PartitionBy(_) => "PartitionBy",
            QueryOperation::Take(_) => "Take",
        }
    }
}

/// One link of a chain.
#[derive(Debug)]
pub struct QueryNode {
    pub operation: QueryOperation,
    pub previous: Option<Arc<QueryNode>>,
}

/// Handle to the newest node of an immutable chain.
#[derive(Debug, Clone)]
pub struct QueryChain {
    head: Arc<QueryNode>,
}

impl QueryChain {
    pub fn from_source(source: QuerySource) -> Self {
        Self {
            head: Arc::new(QueryNode {
                operation: QueryOperation::Source(source),
                previous: None,
            }),
        }
    }

    /// Raw append; the compiler validates ordering.
    pub fn push(&self, operation: QueryOperation) -> Self {
        Self {
            head: Arc::new(QueryNode {
                operation,
                previous: Some(Arc::clone(&self.head)),
            }),
        }
    }

    pub fn filter(&self, predicate: Expr) -> Self {
        self.push(QueryOperation::Where(predicate))
    }

    pub fn select(&self, projection: Projection) -> Self {
        self.push(QueryOperation::Select(projection))
    }

    pub fn group_by(&self, key: Expr) -> Self {
        self.push(QueryOperation::GroupBy(GroupKey::Single(key)))
    }

    pub fn group_by_composite<I, S>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = (S, Expr)>,
        S: Into<String>,
    {
        self.push(QueryOperation::GroupBy(GroupKey::Composite(
            keys.into_iter().map(|(n, e)| (n.into(), e)).collect(),
        )))
    }

    pub fn having(&self, predicate: Expr) -> Self {
        self.push(QueryOperation::Having(predicate))
    }

    pub fn windowed_by(&self, window: TimeWindows) -> Self {
        self.push(QueryOperation::WindowedBy(window))
    }

    pub fn join_with(&self, spec: JoinSpec) -> Self {
        self.push(QueryOperation::Join(Box::new(spec)))
    }

    pub fn join(&self, source: QuerySource, left_key: Expr, right_key: Expr) -> Self {
        self.join_with(JoinSpec::new(JoinKind::Inner, source, left_key, right_key))
    }

    pub fn left_join(&self, source: QuerySource, left_key: Expr, right_key: Expr) -> Self {
        self.join_with(JoinSpec::new(JoinKind::Left, source, left_key, right_key))
    }

    pub fn full_outer_join(&self, source: QuerySource, left_key: Expr, right_key: Expr) -> Self {
        self.join_with(JoinSpec::new(JoinKind::FullOuter, source, left_key, right_key))
    }

    pub fn right_join(&self, source: QuerySource, left_key: Expr, right_key: Expr) -> Self {
        self.join_with(JoinSpec::new(JoinKind::Right, source, left_key, right_key))
    }

    pub fn partition_by(&self, key: Expr) -> Self {
        self.push(QueryOperation::PartitionBy(key))
    }

    pub fn take(&self, count: u32) -> Self {
        self.push(QueryOperation::Take(count))
    }

    /// Operations from the root Source to the newest node.
    pub fn operations(&self) -> Vec<&QueryOperation> {
        let mut ops = Vec::new();
        let mut node = Some(&self.head);
        while let Some(n) = node {
            ops.push(&n.operation);
            node = n.previous.as_ref();
        }
        ops.reverse();
        ops
    }

    /// The root source, if the chain is well formed.
    pub fn source(&self) -> Option<&QuerySource> {
        match self.operations().first() {
            Some(QueryOperation::Source(s)) => Some(s),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.operations().len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col, lit};

    #[test]
    fn test_chain_is_persistent() {
        let base = QueryChain::from_source(QuerySource::stream("Movie"));
        let a = base.filter(col("Id").lt(lit(3)));
        let b = base.take(2);

        assert_eq!(base.len(), 1);
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 2);
        assert!(matches!(a.operations()[1], QueryOperation::Where(_)));
        assert!(matches!(b.operations()[1], QueryOperation::Take(2)));
    }

    #[test]
    fn test_operations_root_first() {
        let chain = QueryChain::from_source(QuerySource::table("Movies"))
            .filter(col("Id").eq(1))
            .select(Projection::members(["Title"]));

        let names: Vec<_> = chain.operations().iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["Source", "Where", "Select"]);
        assert_eq!(chain.source().map(|s| s.name.as_str()), Some("Movies"));
    }

    #[test]
    fn test_default_binding_lowercases_name() {
        assert_eq!(QuerySource::stream("Lead_Actor").binding, "lead_actor");
    }
}
