//! Per-compilation projection bookkeeping
//!
//! Once a Select has run, later clauses see the projected record rather than
//! the source. [`QueryMetadata`] remembers what every projected name stands
//! for so that those clauses can be rewritten back onto source columns.

use std::collections::HashMap;

use crate::compiler::join::SourceScope;
use crate::expr::{ColumnRef, Expr};
use crate::query::ProjectedColumn;

/// Where a projected column came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberBinding {
    pub declaring_shape: Option<String>,
    pub binding: Option<String>,
    pub projected_name: String,
}

/// Scratch state for one compilation.
#[derive(Debug, Default)]
pub struct QueryMetadata {
    members: HashMap<String, Vec<MemberBinding>>,
    projected: HashMap<String, Expr>,
}

impl QueryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a projection. `columns` must already be rewritten onto the source.
    pub fn record_projection(&mut self, columns: &[ProjectedColumn], scope: &SourceScope) {
        self.projected.clear();

        for column in columns {
            if let Expr::Column(c) = &column.expr {
                let source = match &c.binding {
                    Some(b) => scope.lookup(b),
                    None => scope.owner_of(&c.member).or(Some(scope.root())),
                };
                let binding = MemberBinding {
                    declaring_shape: source
                        .and_then(|s| s.shape.as_ref())
                        .map(|shape| shape.name().to_string()),
                    binding: c.binding.clone(),
                    projected_name: column.name.clone(),
                };
                let entries = self.members.entry(c.member.clone()).or_default();
                if !entries.contains(&binding) {
                    entries.push(binding);
                }
            }
            self.projected
                .insert(column.name.clone(), column.expr.clone());
        }
    }

    /// Every place `member` was projected to.
    pub fn bindings(&self, member: &str) -> &[MemberBinding] {
        self.members.get(member).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn projected(&self, name: &str) -> Option<&Expr> {
        self.projected.get(name)
    }

    pub fn has_projection(&self) -> bool {
        !self.projected.is_empty()
    }

    /// Rewrite unqualified references to projected names onto the expressions
    /// they were projected from. References to original members that were
    /// projected from exactly one qualified source pick up that qualifier.
    pub fn substitute(&self, expr: &Expr) -> Expr {
        if !self.has_projection() {
            return expr.clone();
        }
        rewrite_columns(expr, &|c: &ColumnRef| {
            if c.binding.is_some() {
                return None;
            }
            if let Some(projected) = self.projected.get(&c.member) {
                return Some(projected.clone());
            }
            match self.bindings(&c.member) {
                [only] if only.binding.is_some() => Some(Expr::Column(ColumnRef {
                    binding: only.binding.clone(),
                    member: c.member.clone(),
                })),
                _ => None,
            }
        })
    }
}

/// Rebuild `expr`, replacing columns for which `f` returns a substitute.
pub fn rewrite_columns(expr: &Expr, f: &dyn Fn(&ColumnRef) -> Option<Expr>) -> Expr {
    let boxed = |e: &Expr| Box::new(rewrite_columns(e, f));
    let all = |items: &[Expr]| items.iter().map(|e| rewrite_columns(e, f)).collect::<Vec<_>>();

    match expr {
        Expr::Column(c) => f(c).unwrap_or_else(|| expr.clone()),
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: boxed(left),
            right: boxed(right),
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op: *op,
            operand: boxed(operand),
        },
        Expr::Function { name, args } => Expr::Function {
            name: name.clone(),
            args: all(args),
        },
        Expr::Aggregate { function, args } => Expr::Aggregate {
            function: *function,
            args: all(args),
        },
        Expr::Lambda { params, body } => Expr::Lambda {
            params: params.clone(),
            body: boxed(body),
        },
        Expr::Between {
            expr: e,
            low,
            high,
            negated,
        } => Expr::Between {
            expr: boxed(e),
            low: boxed(low),
            high: boxed(high),
            negated: *negated,
        },
        Expr::InList {
            expr: e,
            list,
            negated,
        } => Expr::InList {
            expr: boxed(e),
            list: all(list),
            negated: *negated,
        },
        Expr::IsNull { expr: e, negated } => Expr::IsNull {
            expr: boxed(e),
            negated: *negated,
        },
        Expr::Like {
            expr: e,
            pattern,
            negated,
        } => Expr::Like {
            expr: boxed(e),
            pattern: boxed(pattern),
            negated: *negated,
        },
        Expr::Case {
            operand,
            branches,
            otherwise,
        } => Expr::Case {
            operand: operand.as_deref().map(boxed),
            branches: branches
                .iter()
                .map(|(w, t)| (rewrite_columns(w, f), rewrite_columns(t, f)))
                .collect(),
            otherwise: otherwise.as_deref().map(boxed),
        },
        Expr::Cast { expr: e, target } => Expr::Cast {
            expr: boxed(e),
            target: target.clone(),
        },
        Expr::Subscript { expr: e, index } => Expr::Subscript {
            expr: boxed(e),
            index: boxed(index),
        },
        Expr::Field { expr: e, name } => Expr::Field {
            expr: boxed(e),
            name: name.clone(),
        },
        Expr::Struct(fields) => Expr::Struct(
            fields
                .iter()
                .map(|(n, e)| (n.clone(), rewrite_columns(e, f)))
                .collect(),
        ),
        Expr::Array(items) => Expr::Array(all(items)),
        Expr::Map(entries) => Expr::Map(
            entries
                .iter()
                .map(|(k, v)| (rewrite_columns(k, f), rewrite_columns(v, f)))
                .collect(),
        ),
        Expr::PseudoColumn(_)
        | Expr::Literal(_)
        | Expr::GroupKey
        | Expr::GroupKeyField(_)
        | Expr::LambdaParam(_)
        | Expr::WindowBound { .. }
        | Expr::Raw(_) => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col, qcol};
    use crate::functions::len;
    use crate::model::ModelMetadata;
    use crate::query::QuerySource;

    fn scope() -> SourceScope {
        SourceScope::new(&QuerySource::stream("Movies"), &ModelMetadata::default()).unwrap()
    }

    #[test]
    fn test_substitute_projected_name() {
        let mut metadata = QueryMetadata::new();
        metadata.record_projection(
            &[
                ProjectedColumn::new("Name", col("Title")),
                ProjectedColumn::new("TitleLength", len(col("Title"))),
            ],
            &scope(),
        );

        assert_eq!(metadata.substitute(&col("Name")), col("Title"));
        assert_eq!(
            metadata.substitute(&col("TitleLength").gt(3)),
            len(col("Title")).gt(3)
        );
    }

    #[test]
    fn test_bindings_recorded_per_member() {
        let mut metadata = QueryMetadata::new();
        metadata.record_projection(
            &[
                ProjectedColumn::new("A", col("Title")),
                ProjectedColumn::new("B", col("Title")),
            ],
            &scope(),
        );

        let names: Vec<_> = metadata
            .bindings("Title")
            .iter()
            .map(|b| b.projected_name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_original_member_picks_up_qualifier() {
        let mut metadata = QueryMetadata::new();
        metadata.record_projection(&[ProjectedColumn::new("Movie", qcol("m", "Title"))], &scope());

        assert_eq!(metadata.substitute(&col("Title")), qcol("m", "Title"));
    }

    #[test]
    fn test_no_projection_is_identity() {
        let metadata = QueryMetadata::new();
        let e = col("Id").eq(1);
        assert_eq!(metadata.substitute(&e), e);
    }
}
