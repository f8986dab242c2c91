//! Query compiler
//!
//! Turns a [`QueryChain`] into one ksql statement. The chain is walked from
//! its root Source forward; each operation is validated and folded into a
//! set of clauses which are then emitted in the order the ksqlDB grammar
//! accepts:
//!
//! ```text
//! SELECT … FROM … [JOIN …] [WINDOW …] [WHERE …] [GROUP BY …]
//!     [PARTITION BY …] [HAVING …] [EMIT CHANGES] [LIMIT n];
//! ```
//!
//! Compilation is pure: the same chain and options always produce the same
//! text, and nothing here performs I/O.

pub mod expression;
pub mod join;
pub mod projection;

use tracing::debug;

use crate::error::CompilationError;
use crate::expr::{ColumnRef, Expr};
use crate::identifier::{self, IdentifierEscaping};
use crate::model::ModelMetadata;
use crate::query::{
    GroupKey, JoinSpec, JoinWithin, ProjectedColumn, Projection, QueryChain, QueryOperation,
    QuerySource, SourceKind,
};
use crate::shape::DecimalPrecision;
use crate::window::TimeWindows;

pub use expression::ExpressionCompiler;
pub use join::{SourceBinding, SourceScope};
pub use projection::{MemberBinding, QueryMetadata};

type Result<T> = std::result::Result<T, CompilationError>;

/// Settings shared by every compilation of a context.
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    pub escaping: IdentifierEscaping,
    /// Append a plural suffix to FROM items (`Movie` → `Movies`).
    pub pluralize_from_items: bool,
    pub default_decimal: DecimalPrecision,
    pub model: ModelMetadata,
}

/// What the compiled SELECT is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Long-lived query streaming changes, ends in `EMIT CHANGES`.
    Push,
    /// Bounded lookup against a materialized table.
    Pull,
    /// Body of a `CREATE … AS SELECT`, ends in `EMIT CHANGES`.
    Persistent,
}

impl QueryKind {
    pub fn emits_changes(&self) -> bool {
        matches!(self, QueryKind::Push | QueryKind::Persistent)
    }
}

/// How decoded rows map onto result values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// One value per row; a single column is deserialized directly.
    Scalar,
    /// One object per row keyed by column name.
    Record,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub text: String,
    pub kind: QueryKind,
    pub result_shape: ResultShape,
    /// Output column names of a record projection, empty for `SELECT *`.
    pub columns: Vec<String>,
}

/// Clauses collected while walking a chain.
#[derive(Debug, Default)]
struct ChainState {
    filters: Vec<Expr>,
    projection: Option<Projection>,
    joins: Vec<JoinSpec>,
    group_key: Option<GroupKey>,
    window: Option<TimeWindows>,
    having: Vec<Expr>,
    partition_by: Option<Expr>,
    limit: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryCompiler {
    options: CompilerOptions,
}

impl QueryCompiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn compile(&self, chain: &QueryChain, kind: QueryKind) -> Result<CompiledQuery> {
        self.compile_with_from(chain, kind, None)
    }

    /// Compile, replacing the root FROM item with `from_item` when given.
    pub fn compile_with_from(
        &self,
        chain: &QueryChain,
        kind: QueryKind,
        from_item: Option<&str>,
    ) -> Result<CompiledQuery> {
        let operations = chain.operations();
        let root = match operations.first() {
            Some(QueryOperation::Source(source)) => source,
            _ => {
                return Err(CompilationError::InvalidChain(
                    "a query must start with a Source".to_string(),
                ))
            }
        };

        let mut scope = SourceScope::new(root, &self.options.model)?;
        let mut metadata = QueryMetadata::new();
        let mut state = ChainState::default();

        for operation in &operations[1..] {
            self.fold(operation, root, &mut scope, &mut metadata, &mut state)?;
        }

        let compiled = self.emit(root, &scope, state, kind, from_item)?;
        debug!(source = %root.name, text = %compiled.text, "compiled query");
        Ok(compiled)
    }

    fn fold(
        &self,
        operation: &QueryOperation,
        root: &QuerySource,
        scope: &mut SourceScope,
        metadata: &mut QueryMetadata,
        state: &mut ChainState,
    ) -> Result<()> {
        match operation {
            QueryOperation::Source(_) => {
                return Err(CompilationError::InvalidChain(
                    "Source may only appear at the root".to_string(),
                ))
            }
            QueryOperation::Where(predicate) => {
                if state.group_key.is_some() {
                    return Err(CompilationError::InvalidChain(
                        "Where after GroupBy; filter groups with Having".to_string(),
                    ));
                }
                state.filters.push(metadata.substitute(predicate));
            }
            QueryOperation::Select(projection) => {
                let projection = substitute_projection(projection, metadata);
                if let Projection::Record(columns) = &projection {
                    metadata.record_projection(columns, scope);
                }
                state.projection = Some(projection);
            }
            QueryOperation::GroupBy(key) => {
                if state.group_key.is_some() {
                    return Err(CompilationError::InvalidChain(
                        "GroupBy may only appear once".to_string(),
                    ));
                }
                let key = match key {
                    GroupKey::Single(expr) => GroupKey::Single(metadata.substitute(expr)),
                    GroupKey::Composite(fields) => GroupKey::Composite(
                        fields
                            .iter()
                            .map(|(name, expr)| (name.clone(), metadata.substitute(expr)))
                            .collect(),
                    ),
                };
                state.group_key = Some(key);
            }
            QueryOperation::Having(predicate) => {
                if state.group_key.is_none() {
                    return Err(CompilationError::InvalidChain(
                        "Having requires a preceding GroupBy".to_string(),
                    ));
                }
                state.having.push(metadata.substitute(predicate));
            }
            QueryOperation::WindowedBy(window) => {
                if state.group_key.is_none() {
                    return Err(CompilationError::InvalidChain(
                        "WindowedBy requires a preceding GroupBy".to_string(),
                    ));
                }
                if state.window.is_some() {
                    return Err(CompilationError::InvalidChain(
                        "WindowedBy may only appear once".to_string(),
                    ));
                }
                state.window = Some(window.clone());
            }
            QueryOperation::Join(spec) => {
                if state.projection.is_some() || state.group_key.is_some() {
                    return Err(CompilationError::InvalidChain(
                        "Join must precede Select and GroupBy".to_string(),
                    ));
                }
                let previous: Vec<String> =
                    scope.sources().iter().map(|s| s.binding.clone()).collect();
                scope.add(&spec.source, &self.options.model)?;

                let left_key = qualify(&spec.left_key, |member| {
                    previous
                        .iter()
                        .find(|b| scope.lookup(b).map(|s| s.has_member(member)).unwrap_or(false))
                        .cloned()
                        .unwrap_or_else(|| root.binding.clone())
                });
                let right_key = qualify(&spec.right_key, |_| spec.source.binding.clone());

                let mut joined = (**spec).clone();
                joined.left_key = left_key;
                joined.right_key = right_key;
                if let Some(Projection::Record(columns)) = &joined.projection {
                    metadata.record_projection(columns, scope);
                }
                if joined.projection.is_some() {
                    state.projection = joined.projection.clone();
                }
                state.joins.push(joined);
            }
            QueryOperation::PartitionBy(key) => {
                if root.kind == SourceKind::Table {
                    return Err(CompilationError::InvalidChain(
                        "PartitionBy is only valid on streams".to_string(),
                    ));
                }
                if state.group_key.is_some() {
                    return Err(CompilationError::InvalidChain(
                        "PartitionBy after GroupBy produces a table".to_string(),
                    ));
                }
                if state.partition_by.is_some() {
                    return Err(CompilationError::InvalidChain(
                        "PartitionBy may only appear once".to_string(),
                    ));
                }
                state.partition_by = Some(metadata.substitute(key));
            }
            QueryOperation::Take(count) => {
                state.limit = Some(state.limit.map_or(*count, |n| n.min(*count)));
            }
        }
        Ok(())
    }

    fn emit(
        &self,
        root: &QuerySource,
        scope: &SourceScope,
        state: ChainState,
        kind: QueryKind,
        from_item: Option<&str>,
    ) -> Result<CompiledQuery> {
        let escaping = self.options.escaping;
        let grouped = state.group_key.is_some();
        let compiler =
            ExpressionCompiler::new(escaping, scope).with_group_key(state.group_key.as_ref());
        let aggregating = compiler.clone().with_aggregates(grouped);

        let (select, result_shape, columns) = match &state.projection {
            None | Some(Projection::All) => ("*".to_string(), ResultShape::Record, Vec::new()),
            Some(Projection::Value(expr)) => {
                (aggregating.compile(expr)?, ResultShape::Scalar, Vec::new())
            }
            Some(Projection::Record(projected)) => {
                if projected.is_empty() {
                    return Err(CompilationError::UnsupportedProjection(
                        "a record projection needs at least one column".to_string(),
                    ));
                }
                let mut items = Vec::with_capacity(projected.len());
                for column in projected {
                    let text = aggregating.compile(&column.expr)?;
                    let needs_alias = match natural_column(&column.expr, state.group_key.as_ref())
                    {
                        Some(c) => {
                            scope.is_joined() || aggregating.column_name(c) != column.name
                        }
                        None => true,
                    };
                    if needs_alias {
                        items.push(format!(
                            "{} AS {}",
                            text,
                            identifier::escape(&column.name, escaping)
                        ));
                    } else {
                        items.push(text);
                    }
                }
                (
                    items.join(", "),
                    ResultShape::Record,
                    projected.iter().map(|c| c.name.clone()).collect(),
                )
            }
        };

        let mut text = format!("SELECT {} FROM {}", select, self.from_item(root, from_item));
        if scope.is_joined() {
            text.push(' ');
            text.push_str(&scope.root().alias);
        }

        for (join, binding) in state.joins.iter().zip(scope.sources().iter().skip(1)) {
            text.push_str(&format!(
                " {} {} {}",
                join.kind.keyword(),
                self.from_item(&join.source, None),
                binding.alias
            ));
            if let Some(within) = &join.within {
                match within {
                    JoinWithin::Symmetric(d) => text.push_str(&format!(" WITHIN {}", d)),
                    JoinWithin::Asymmetric { before, after } => {
                        text.push_str(&format!(" WITHIN ({}, {})", before, after))
                    }
                }
                if let Some(grace) = &join.grace_period {
                    text.push_str(&format!(" GRACE PERIOD {}", grace));
                }
            }
            text.push_str(&format!(
                " ON {} = {}",
                compiler.compile(&join.left_key)?,
                compiler.compile(&join.right_key)?
            ));
        }

        if let Some(window) = &state.window {
            text.push(' ');
            text.push_str(&window.to_ksql());
        }

        if let Some(filter) = conjunction(state.filters) {
            text.push_str(" WHERE ");
            text.push_str(&compiler.compile(&filter)?);
        }

        if let Some(key) = &state.group_key {
            let keys = match key {
                GroupKey::Single(expr) => compiler.compile(expr)?,
                GroupKey::Composite(fields) => fields
                    .iter()
                    .map(|(_, expr)| compiler.compile(expr))
                    .collect::<Result<Vec<_>>>()?
                    .join(", "),
            };
            text.push_str(" GROUP BY ");
            text.push_str(&keys);
        }

        if let Some(key) = &state.partition_by {
            text.push_str(" PARTITION BY ");
            text.push_str(&compiler.compile(key)?);
        }

        if let Some(having) = conjunction(state.having) {
            text.push_str(" HAVING ");
            text.push_str(&aggregating.compile(&having)?);
        }

        if kind.emits_changes() {
            text.push_str(" EMIT CHANGES");
        }

        if let Some(limit) = state.limit {
            text.push_str(&format!(" LIMIT {}", limit));
        }
        text.push(';');

        Ok(CompiledQuery {
            text,
            kind,
            result_shape,
            columns,
        })
    }

    fn from_item(&self, source: &QuerySource, from_item: Option<&str>) -> String {
        let name = match from_item {
            Some(name) => name.to_string(),
            None if self.options.pluralize_from_items => pluralize(&source.name),
            None => source.name.clone(),
        };
        identifier::escape(&name, self.options.escaping).into_owned()
    }
}

/// English plural of a source name: `Movie` → `Movies`, `Category` →
/// `Categories`. Names already ending in `s` are left alone.
pub fn pluralize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with('s') {
        return name.to_string();
    }
    let mut chars = lower.chars().rev();
    if let (Some('y'), Some(prev)) = (chars.next(), chars.next()) {
        if !"aeiou".contains(prev) {
            let stem = &name[..name.len() - 1];
            let suffix = if name.ends_with('Y') { "IES" } else { "ies" };
            return format!("{}{}", stem, suffix);
        }
    }
    let shouting = name.chars().any(|c| c.is_ascii_uppercase())
        && !name.chars().any(|c| c.is_ascii_lowercase());
    let suffix = if shouting { "S" } else { "s" };
    format!("{}{}", name, suffix)
}

fn substitute_projection(projection: &Projection, metadata: &QueryMetadata) -> Projection {
    match projection {
        Projection::All => Projection::All,
        Projection::Value(expr) => Projection::Value(metadata.substitute(expr)),
        Projection::Record(columns) => Projection::Record(
            columns
                .iter()
                .map(|c| ProjectedColumn::new(c.name.clone(), metadata.substitute(&c.expr)))
                .collect(),
        ),
    }
}

/// The plain column an output column is taken from, if any.
fn natural_column<'e>(expr: &'e Expr, key: Option<&'e GroupKey>) -> Option<&'e ColumnRef> {
    match (expr, key) {
        (Expr::Column(c), _) => Some(c),
        (Expr::GroupKey, Some(GroupKey::Single(Expr::Column(c)))) => Some(c),
        (Expr::GroupKeyField(member), Some(GroupKey::Composite(fields))) => fields
            .iter()
            .find(|(name, _)| name == member)
            .and_then(|(_, e)| e.as_column()),
        _ => None,
    }
}

/// Give unqualified columns of a join key the binding chosen by `binding_for`.
fn qualify(expr: &Expr, binding_for: impl Fn(&str) -> String) -> Expr {
    projection::rewrite_columns(expr, &|c: &ColumnRef| {
        if c.binding.is_some() {
            return None;
        }
        Some(Expr::Column(ColumnRef {
            binding: Some(binding_for(&c.member)),
            member: c.member.clone(),
        }))
    })
}

fn conjunction(predicates: Vec<Expr>) -> Option<Expr> {
    predicates.into_iter().reduce(|acc, p| acc.and(p))
}
