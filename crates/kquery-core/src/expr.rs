//! Expression tree for predicates, projections and keys
//!
//! Expressions are plain data: building one never touches the server or the
//! compiler. Columns are referenced by member name and, in joined queries, by
//! the binding of the source they belong to.
//!
//! ```ignore
//! use kquery_core::expr::{col, lit};
//!
//! let predicate = col("Id").lt(lit(3)).and(col("Title").is_not_null());
//! ```

use std::ops;

use crate::functions::AggregateFunction;
use crate::literal::Literal;
use crate::types::KsqlType;

/// Reference to a source member.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    /// Binding of the source the member belongs to. Only needed in joins.
    pub binding: Option<String>,
    pub member: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    /// Binding strength, higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 5,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 3
    }

    /// `a - (b - c)` must keep its parentheses, `a + (b + c)` need not.
    pub fn is_associative(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Mul | BinaryOp::And | BinaryOp::Or
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Implicit column of every source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoColumn {
    RowTime,
    RowOffset,
    RowPartition,
    WindowStart,
    WindowEnd,
}

impl PseudoColumn {
    pub fn name(&self) -> &'static str {
        match self {
            PseudoColumn::RowTime => "ROWTIME",
            PseudoColumn::RowOffset => "ROWOFFSET",
            PseudoColumn::RowPartition => "ROWPARTITION",
            PseudoColumn::WindowStart => "WINDOWSTART",
            PseudoColumn::WindowEnd => "WINDOWEND",
        }
    }
}

/// Bound of a windowed table row, used by pull queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowBound {
    WindowStart,
    WindowEnd,
}

impl WindowBound {
    pub fn keyword(&self) -> &'static str {
        match self {
            WindowBound::WindowStart => "WINDOWSTART",
            WindowBound::WindowEnd => "WINDOWEND",
        }
    }
}

/// Value a window bound is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundValue {
    /// Milliseconds since the epoch, emitted unquoted.
    Epoch(i64),
    /// ISO-8601 timestamp, emitted quoted.
    Iso(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    PseudoColumn(PseudoColumn),
    Literal(Literal),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
    Aggregate {
        function: AggregateFunction,
        args: Vec<Expr>,
    },
    /// The key of the preceding GroupBy.
    GroupKey,
    /// One member of a composite GroupBy key.
    GroupKeyField(String),
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
    LambdaParam(String),
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    Cast {
        expr: Box<Expr>,
        target: KsqlType,
    },
    /// `array[i]` or `map['key']`.
    Subscript {
        expr: Box<Expr>,
        index: Box<Expr>,
    },
    /// `struct->field`.
    Field {
        expr: Box<Expr>,
        name: String,
    },
    Struct(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    WindowBound {
        bound: WindowBound,
        op: BinaryOp,
        value: BoundValue,
    },
    /// Text passed through verbatim, e.g. a user-defined function call.
    Raw(String),
}

/// Unqualified member reference.
pub fn col(member: impl Into<String>) -> Expr {
    Expr::Column(ColumnRef {
        binding: None,
        member: member.into(),
    })
}

/// Member reference qualified by the binding of a joined source.
pub fn qcol(binding: impl Into<String>, member: impl Into<String>) -> Expr {
    Expr::Column(ColumnRef {
        binding: Some(binding.into()),
        member: member.into(),
    })
}

pub fn lit(value: impl Into<Literal>) -> Expr {
    Expr::Literal(value.into())
}

pub fn pseudo(column: PseudoColumn) -> Expr {
    Expr::PseudoColumn(column)
}

pub fn group_key() -> Expr {
    Expr::GroupKey
}

pub fn group_key_field(member: impl Into<String>) -> Expr {
    Expr::GroupKeyField(member.into())
}

/// `(p1, p2) => body`, only valid as an argument of a function call.
pub fn lambda<I, S>(params: I, body: Expr) -> Expr
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Expr::Lambda {
        params: params.into_iter().map(Into::into).collect(),
        body: Box::new(body),
    }
}

/// Reference to a lambda parameter inside its body.
pub fn param(name: impl Into<String>) -> Expr {
    Expr::LambdaParam(name.into())
}

pub fn raw(text: impl Into<String>) -> Expr {
    Expr::Raw(text.into())
}

pub fn structure<I, S>(fields: I) -> Expr
where
    I: IntoIterator<Item = (S, Expr)>,
    S: Into<String>,
{
    Expr::Struct(fields.into_iter().map(|(n, e)| (n.into(), e)).collect())
}

pub fn array(items: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Array(items.into_iter().collect())
}

pub fn map(entries: impl IntoIterator<Item = (Expr, Expr)>) -> Expr {
    Expr::Map(entries.into_iter().collect())
}

/// `CASE WHEN … THEN … [ELSE …] END`.
pub fn case_when(branches: Vec<(Expr, Expr)>, otherwise: Option<Expr>) -> Expr {
    Expr::Case {
        operand: None,
        branches,
        otherwise: otherwise.map(Box::new),
    }
}

/// `WINDOWSTART <op> value` / `WINDOWEND <op> value`.
pub fn window_bound(bound: WindowBound, op: BinaryOp, value: BoundValue) -> Expr {
    Expr::WindowBound { bound, op, value }
}

impl Expr {
    fn binary(self, op: BinaryOp, other: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Eq, other.into())
    }

    pub fn not_eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::NotEq, other.into())
    }

    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Lt, other.into())
    }

    pub fn lt_eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::LtEq, other.into())
    }

    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Gt, other.into())
    }

    pub fn gt_eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::GtEq, other.into())
    }

    pub fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::And, other.into())
    }

    pub fn or(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Or, other.into())
    }

    pub fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Expr {
        Expr::Between {
            expr: Box::new(self),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: false,
        }
    }

    pub fn not_between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Expr {
        Expr::Between {
            expr: Box::new(self),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: true,
        }
    }

    pub fn in_list(self, list: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::InList {
            expr: Box::new(self),
            list: list.into_iter().collect(),
            negated: false,
        }
    }

    pub fn not_in_list(self, list: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::InList {
            expr: Box::new(self),
            list: list.into_iter().collect(),
            negated: true,
        }
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn like(self, pattern: impl Into<Expr>) -> Expr {
        Expr::Like {
            expr: Box::new(self),
            pattern: Box::new(pattern.into()),
            negated: false,
        }
    }

    pub fn not_like(self, pattern: impl Into<Expr>) -> Expr {
        Expr::Like {
            expr: Box::new(self),
            pattern: Box::new(pattern.into()),
            negated: true,
        }
    }

    pub fn cast(self, target: KsqlType) -> Expr {
        Expr::Cast {
            expr: Box::new(self),
            target,
        }
    }

    /// Array element (1-based) or map value.
    pub fn at(self, index: impl Into<Expr>) -> Expr {
        Expr::Subscript {
            expr: Box::new(self),
            index: Box::new(index.into()),
        }
    }

    /// Struct member access.
    pub fn field(self, name: impl Into<String>) -> Expr {
        Expr::Field {
            expr: Box::new(self),
            name: name.into(),
        }
    }

    /// Column reference `member` if this expression is a bare column.
    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Expr::Column(c) => Some(c),
            _ => None,
        }
    }
}

impl From<Literal> for Expr {
    fn from(value: Literal) -> Self {
        Expr::Literal(value)
    }
}

macro_rules! literal_expr {
    ($($t:ty),*) => {
        $(impl From<$t> for Expr {
            fn from(value: $t) -> Self {
                Expr::Literal(Literal::from(value))
            }
        })*
    };
}

literal_expr!(bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, &str, String);

macro_rules! arithmetic {
    ($($trait:ident $method:ident $op:expr),*) => {
        $(impl<T: Into<Expr>> ops::$trait<T> for Expr {
            type Output = Expr;

            fn $method(self, rhs: T) -> Expr {
                self.binary($op, rhs.into())
            }
        })*
    };
}

arithmetic!(
    Add add BinaryOp::Add,
    Sub sub BinaryOp::Sub,
    Mul mul BinaryOp::Mul,
    Div div BinaryOp::Div,
    Rem rem BinaryOp::Mod
);

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_produces_tree() {
        let e = col("Id").lt(3);
        assert_eq!(
            e,
            Expr::Binary {
                op: BinaryOp::Lt,
                left: Box::new(col("Id")),
                right: Box::new(Expr::Literal(Literal::Int(3))),
            }
        );
    }

    #[test]
    fn test_operator_overloads() {
        let e = col("Price") * 2 + 1;
        let Expr::Binary { op, left, .. } = e else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_precedence_ordering() {
        assert!(BinaryOp::Mul.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() > BinaryOp::Eq.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
        assert!(!BinaryOp::Sub.is_associative());
    }
}
