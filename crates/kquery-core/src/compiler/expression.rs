//! Leaf expression compiler

use crate::compiler::join::SourceScope;
use crate::error::CompilationError;
use crate::expr::{BinaryOp, BoundValue, ColumnRef, Expr, UnaryOp};
use crate::identifier::{self, IdentifierEscaping};
use crate::literal::{quote_string, Literal};
use crate::query::GroupKey;

type Result<T> = std::result::Result<T, CompilationError>;

/// Compiles one expression against a fixed set of sources.
#[derive(Debug, Clone)]
pub struct ExpressionCompiler<'a> {
    pub escaping: IdentifierEscaping,
    pub scope: &'a SourceScope,
    pub group_key: Option<&'a GroupKey>,
    pub allow_aggregates: bool,
    lambda_params: Vec<String>,
    in_function_args: bool,
}

impl<'a> ExpressionCompiler<'a> {
    pub fn new(escaping: IdentifierEscaping, scope: &'a SourceScope) -> Self {
        Self {
            escaping,
            scope,
            group_key: None,
            allow_aggregates: false,
            lambda_params: Vec::new(),
            in_function_args: false,
        }
    }

    pub fn with_group_key(mut self, key: Option<&'a GroupKey>) -> Self {
        self.group_key = key;
        self
    }

    pub fn with_aggregates(mut self, allow: bool) -> Self {
        self.allow_aggregates = allow;
        self
    }

    pub fn compile(&self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Column(c) => self.column(c),
            Expr::PseudoColumn(p) => Ok(identifier::escape(p.name(), self.escaping).into_owned()),
            Expr::Literal(l) => Ok(l.to_ksql()),
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Unary { op, operand } => self.unary(*op, operand),
            Expr::Function { name, args } => self.function(name, args),
            Expr::Aggregate { function, args } => {
                if !self.allow_aggregates {
                    return Err(CompilationError::AggregateWithoutGrouping(
                        function.name().to_string(),
                    ));
                }
                if args.is_empty() {
                    return Ok(format!("{}(*)", function.name()));
                }
                let inner = Self {
                    allow_aggregates: false,
                    in_function_args: false,
                    ..self.clone()
                };
                Ok(format!("{}({})", function.name(), inner.list(args)?))
            }
            Expr::GroupKey => self.group_key_text(None),
            Expr::GroupKeyField(member) => self.group_key_text(Some(member)),
            Expr::Lambda { params, body } => {
                if !self.in_function_args {
                    return Err(CompilationError::MisplacedLambda);
                }
                self.lambda(params, body)
            }
            Expr::LambdaParam(name) => {
                if self.lambda_params.iter().any(|p| p == name) {
                    Ok(name.clone())
                } else {
                    Err(CompilationError::UnsupportedExpression(format!(
                        "lambda parameter '{}' used outside of its lambda",
                        name
                    )))
                }
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Ok(format!(
                "{} {}BETWEEN {} AND {}",
                self.operand(expr)?,
                not(*negated),
                self.operand(low)?,
                self.operand(high)?
            )),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                if list.is_empty() {
                    return Err(CompilationError::UnsupportedExpression(
                        "IN requires at least one value".to_string(),
                    ));
                }
                Ok(format!(
                    "{} {}IN ({})",
                    self.operand(expr)?,
                    not(*negated),
                    self.list(list)?
                ))
            }
            Expr::IsNull { expr, negated } => Ok(format!(
                "{} IS {}NULL",
                self.operand(expr)?,
                not(*negated)
            )),
            Expr::Like {
                expr,
                pattern,
                negated,
            } => Ok(format!(
                "{} {}LIKE {}",
                self.operand(expr)?,
                not(*negated),
                self.operand(pattern)?
            )),
            Expr::Case {
                operand,
                branches,
                otherwise,
            } => self.case(operand.as_deref(), branches, otherwise.as_deref()),
            Expr::Cast { expr, target } => Ok(format!(
                "CAST({} AS {})",
                self.compile(expr)?,
                target.render(self.escaping)
            )),
            Expr::Subscript { expr, index } => {
                Ok(format!("{}[{}]", self.operand(expr)?, self.compile(index)?))
            }
            Expr::Field { expr, name } => Ok(format!(
                "{}->{}",
                self.operand(expr)?,
                identifier::escape(name, self.escaping)
            )),
            Expr::Struct(fields) => {
                let fields = fields
                    .iter()
                    .map(|(name, value)| {
                        Ok(format!(
                            "{} := {}",
                            identifier::escape(name, self.escaping),
                            self.compile(value)?
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("STRUCT({})", fields.join(", ")))
            }
            Expr::Array(items) => Ok(format!("ARRAY[{}]", self.list(items)?)),
            Expr::Map(entries) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| Ok(format!("{} := {}", self.compile(k)?, self.compile(v)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("MAP({})", entries.join(", ")))
            }
            Expr::WindowBound { bound, op, value } => {
                if !op.is_comparison() {
                    return Err(CompilationError::UnsupportedExpression(format!(
                        "window bounds only support comparisons, got '{}'",
                        op.symbol()
                    )));
                }
                let value = match value {
                    BoundValue::Epoch(ms) => ms.to_string(),
                    BoundValue::Iso(text) => quote_string(text),
                };
                Ok(format!("{} {} {}", bound.keyword(), op.symbol(), value))
            }
            Expr::Raw(text) => Ok(text.clone()),
        }
    }

    /// Plain column text before escaping, for alias decisions.
    pub fn column_name(&self, column: &ColumnRef) -> String {
        match &column.binding {
            Some(b) => self
                .scope
                .lookup(b)
                .map(|s| s.column_name(&column.member).to_string())
                .unwrap_or_else(|| column.member.clone()),
            None => match self.scope.owner_of(&column.member) {
                Some(owner) => owner.column_name(&column.member).to_string(),
                None => self.scope.root().column_name(&column.member).to_string(),
            },
        }
    }

    fn column(&self, column: &ColumnRef) -> Result<String> {
        let name = self.column_name(column);
        let escaped = identifier::escape(&name, self.escaping);

        let source = match &column.binding {
            Some(binding) => Some(
                self.scope
                    .lookup(binding)
                    .ok_or_else(|| CompilationError::UnknownBinding(binding.clone()))?,
            ),
            None => None,
        };

        if !self.scope.is_joined() {
            return Ok(escaped.into_owned());
        }
        // Joined queries qualify every column, unqualified ones by their owner.
        let source = source
            .or_else(|| self.scope.owner_of(&column.member))
            .unwrap_or_else(|| self.scope.root());
        Ok(format!("{}.{}", source.alias, escaped))
    }

    fn group_key_text(&self, member: Option<&str>) -> Result<String> {
        let key = self
            .group_key
            .ok_or(CompilationError::GroupKeyWithoutGrouping)?;
        let keyless = Self {
            allow_aggregates: false,
            ..self.clone()
        };

        match (key, member) {
            (GroupKey::Single(expr), None) => keyless.compile(expr),
            (GroupKey::Single(expr), Some(member)) => match expr {
                Expr::Column(c) if c.member == member => keyless.compile(expr),
                _ => Err(CompilationError::UnsupportedExpression(format!(
                    "group key has no member '{}'",
                    member
                ))),
            },
            (GroupKey::Composite(_), None) => Err(CompilationError::UnsupportedExpression(
                "a composite group key must be projected per member".to_string(),
            )),
            (GroupKey::Composite(fields), Some(member)) => fields
                .iter()
                .find(|(name, _)| name == member)
                .map(|(_, expr)| keyless.compile(expr))
                .unwrap_or_else(|| {
                    Err(CompilationError::UnsupportedExpression(format!(
                        "group key has no member '{}'",
                        member
                    )))
                }),
        }
    }

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<String> {
        if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
            let negated = op == BinaryOp::NotEq;
            if let Expr::Literal(Literal::Null) = right {
                return Ok(format!("{} IS {}NULL", self.operand(left)?, not(negated)));
            }
            if let Expr::Literal(Literal::Null) = left {
                return Ok(format!("{} IS {}NULL", self.operand(right)?, not(negated)));
            }
        }

        Ok(format!(
            "{} {} {}",
            self.child(left, op, false)?,
            op.symbol(),
            self.child(right, op, true)?
        ))
    }

    fn child(&self, expr: &Expr, parent: BinaryOp, is_right: bool) -> Result<String> {
        let text = self.compile(expr)?;
        let wrap = match expr {
            Expr::Binary { op, .. } => {
                op.precedence() < parent.precedence()
                    || (is_right
                        && op.precedence() == parent.precedence()
                        && !parent.is_associative())
            }
            Expr::Unary {
                op: UnaryOp::Not, ..
            }
            | Expr::Between { .. }
            | Expr::InList { .. }
            | Expr::IsNull { .. }
            | Expr::Like { .. } => parent.precedence() >= BinaryOp::Eq.precedence(),
            _ => false,
        };
        Ok(if wrap { format!("({})", text) } else { text })
    }

    /// Operand of a postfix or keyword operator.
    fn operand(&self, expr: &Expr) -> Result<String> {
        let text = self.compile(expr)?;
        let wrap = matches!(
            expr,
            Expr::Binary { .. }
                | Expr::Unary {
                    op: UnaryOp::Not,
                    ..
                }
                | Expr::Between { .. }
                | Expr::InList { .. }
                | Expr::IsNull { .. }
                | Expr::Like { .. }
        );
        Ok(if wrap { format!("({})", text) } else { text })
    }

    fn unary(&self, op: UnaryOp, operand: &Expr) -> Result<String> {
        let text = self.compile(operand)?;
        let wrap = matches!(operand, Expr::Binary { .. } | Expr::Between { .. });
        let text = if wrap { format!("({})", text) } else { text };
        Ok(match op {
            UnaryOp::Not => format!("NOT {}", text),
            UnaryOp::Neg => format!("-{}", text),
        })
    }

    /// Lambdas are accepted only as direct arguments.
    fn function(&self, name: &str, args: &[Expr]) -> Result<String> {
        let lambda_arg = Self {
            in_function_args: true,
            ..self.clone()
        };
        let value_arg = Self {
            in_function_args: false,
            ..self.clone()
        };
        let args = args
            .iter()
            .map(|a| match a {
                Expr::Lambda { .. } => lambda_arg.compile(a),
                _ => value_arg.compile(a),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("{}({})", name.to_uppercase(), args.join(", ")))
    }

    fn lambda(&self, params: &[String], body: &Expr) -> Result<String> {
        if params.is_empty() {
            return Err(CompilationError::UnsupportedExpression(
                "lambda without parameters".to_string(),
            ));
        }
        let mut lambda_params = self.lambda_params.clone();
        lambda_params.extend(params.iter().cloned());
        let inner = Self {
            lambda_params,
            in_function_args: false,
            ..self.clone()
        };
        Ok(format!("({}) => {}", params.join(", "), inner.compile(body)?))
    }

    fn case(
        &self,
        operand: Option<&Expr>,
        branches: &[(Expr, Expr)],
        otherwise: Option<&Expr>,
    ) -> Result<String> {
        if branches.is_empty() {
            return Err(CompilationError::UnsupportedExpression(
                "CASE requires at least one WHEN branch".to_string(),
            ));
        }
        let mut text = String::from("CASE");
        if let Some(operand) = operand {
            text.push(' ');
            text.push_str(&self.compile(operand)?);
        }
        for (when, then) in branches {
            text.push_str(&format!(
                " WHEN {} THEN {}",
                self.compile(when)?,
                self.compile(then)?
            ));
        }
        if let Some(otherwise) = otherwise {
            text.push_str(&format!(" ELSE {}", self.compile(otherwise)?));
        }
        text.push_str(" END");
        Ok(text)
    }

    fn list(&self, items: &[Expr]) -> Result<String> {
        Ok(items
            .iter()
            .map(|e| self.compile(e))
            .collect::<Result<Vec<_>>>()?
            .join(", "))
    }
}

fn not(negated: bool) -> &'static str {
    if negated {
        "NOT "
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::*;
    use crate::functions::{self, count, sum};
    use crate::model::ModelMetadata;
    use crate::query::QuerySource;
    use crate::shape::{EntityShape, FieldMetadata, ValueShape};
    use crate::types::KsqlType;

    fn movie_scope() -> SourceScope {
        let shape = EntityShape::builder("Movie")
            .key("Id", ValueShape::Int32)
            .field("Title", ValueShape::String)
            .with(FieldMetadata::new("Year", ValueShape::Int32).with_column_name("Release_Year"))
            .build()
            .unwrap();
        SourceScope::new(
            &QuerySource::stream("Movie").with_shape(shape),
            &ModelMetadata::default(),
        )
        .unwrap()
    }

    fn compile(expr: Expr) -> Result<String> {
        let scope = movie_scope();
        ExpressionCompiler::new(IdentifierEscaping::Never, &scope).compile(&expr)
    }

    #[test]
    fn test_comparison_and_logic() {
        assert_eq!(
            compile(col("Id").lt(3).and(col("Title").eq("Aliens"))).unwrap(),
            "Id < 3 AND Title = 'Aliens'"
        );
    }

    #[test]
    fn test_parentheses_only_where_needed() {
        assert_eq!(
            compile(col("Id").eq(1).or(col("Id").eq(2)).and(col("Year").gt(2000))).unwrap(),
            "(Id = 1 OR Id = 2) AND Release_Year > 2000"
        );
        assert_eq!(compile((col("Id") + 1) * 2).unwrap(), "(Id + 1) * 2");
        assert_eq!(compile(col("Id") - (col("Year") - 1)).unwrap(), "Id - (Release_Year - 1)");
        assert_eq!(compile(col("Id") + (col("Year") + 1)).unwrap(), "Id + Release_Year + 1");
    }

    #[test]
    fn test_null_comparisons() {
        assert_eq!(compile(col("Title").eq(Literal::Null)).unwrap(), "Title IS NULL");
        assert_eq!(compile(col("Title").not_eq(Literal::Null)).unwrap(), "Title IS NOT NULL");
        assert_eq!(compile(col("Title").is_not_null()).unwrap(), "Title IS NOT NULL");
    }

    #[test]
    fn test_between_and_not_between() {
        assert_eq!(compile(col("Id").between(1, 5)).unwrap(), "Id BETWEEN 1 AND 5");
        assert_eq!(
            compile(col("Id").not_between(1, 5)).unwrap(),
            "Id NOT BETWEEN 1 AND 5"
        );
    }

    #[test]
    fn test_window_bounds() {
        assert_eq!(
            compile(window_bound(
                WindowBound::WindowStart,
                BinaryOp::Gt,
                BoundValue::Epoch(1_600_000_000_000)
            ))
            .unwrap(),
            "WINDOWSTART > 1600000000000"
        );
        assert_eq!(
            compile(window_bound(
                WindowBound::WindowEnd,
                BinaryOp::LtEq,
                BoundValue::Iso("2021-01-01T00:00:00Z".to_string())
            ))
            .unwrap(),
            "WINDOWEND <= '2021-01-01T00:00:00Z'"
        );
        assert!(compile(window_bound(
            WindowBound::WindowStart,
            BinaryOp::Add,
            BoundValue::Epoch(1)
        ))
        .is_err());
    }

    #[test]
    fn test_lambda_in_higher_order_function() {
        let e = functions::transform(col("Tags"), "x", functions::ucase(param("x")));
        assert_eq!(compile(e).unwrap(), "TRANSFORM(Tags, (x) => UCASE(x))");

        let e = functions::reduce(
            col("Values"),
            lit(0),
            ["s", "x"],
            param("s") + param("x"),
        );
        assert_eq!(compile(e).unwrap(), "REDUCE(Values, 0, (s, x) => s + x)");
    }

    #[test]
    fn test_nested_lambdas() {
        let inner = functions::filter(param("x"), "y", param("y").gt(param("x").at(1)));
        let e = functions::transform(col("Matrix"), "x", inner);
        assert_eq!(
            compile(e).unwrap(),
            "TRANSFORM(Matrix, (x) => FILTER(x, (y) => y > x[1]))"
        );
    }

    #[test]
    fn test_misplaced_lambda_fails() {
        assert_eq!(
            compile(lambda(["x"], param("x"))),
            Err(CompilationError::MisplacedLambda)
        );
        assert!(compile(param("x")).is_err());
    }

    #[test]
    fn test_lambda_nested_inside_argument_fails() {
        assert_eq!(
            compile(functions::abs(lambda(["x"], param("x")) + 1)),
            Err(CompilationError::MisplacedLambda)
        );
        assert_eq!(
            compile(functions::transform(
                col("Items"),
                "x",
                functions::abs(lambda(["y"], param("y")) + 1)
            )),
            Err(CompilationError::MisplacedLambda)
        );
    }

    #[test]
    fn test_aggregates_need_grouping() {
        assert_eq!(
            compile(count()),
            Err(CompilationError::AggregateWithoutGrouping("COUNT".to_string()))
        );

        let scope = movie_scope();
        let compiler = ExpressionCompiler::new(IdentifierEscaping::Never, &scope).with_aggregates(true);
        assert_eq!(compiler.compile(&count()).unwrap(), "COUNT(*)");
        assert_eq!(compiler.compile(&sum(col("Year"))).unwrap(), "SUM(Release_Year)");
    }

    #[test]
    fn test_group_key_without_grouping_fails() {
        assert_eq!(
            compile(group_key()),
            Err(CompilationError::GroupKeyWithoutGrouping)
        );
    }

    #[test]
    fn test_collection_literals_and_access() {
        assert_eq!(
            compile(structure([("Name", lit("a")), ("Age", lit(3))])).unwrap(),
            "STRUCT(Name := 'a', Age := 3)"
        );
        assert_eq!(compile(array([lit(1), lit(2)])).unwrap(), "ARRAY[1, 2]");
        assert_eq!(compile(map([(lit("a"), lit(1))])).unwrap(), "MAP('a' := 1)");
        assert_eq!(compile(col("Dict").at("k")).unwrap(), "Dict['k']");
        assert_eq!(compile(col("Address").field("City")).unwrap(), "Address->City");
    }

    #[test]
    fn test_case_cast_in_like() {
        assert_eq!(
            compile(case_when(vec![(col("Id").gt(1), lit("big"))], Some(lit("small")))).unwrap(),
            "CASE WHEN Id > 1 THEN 'big' ELSE 'small' END"
        );
        assert_eq!(
            compile(col("Id").cast(KsqlType::Varchar)).unwrap(),
            "CAST(Id AS VARCHAR)"
        );
        assert_eq!(
            compile(col("Id").in_list([lit(1), lit(2)])).unwrap(),
            "Id IN (1, 2)"
        );
        assert_eq!(
            compile(col("Title").not_like("A%")).unwrap(),
            "Title NOT LIKE 'A%'"
        );
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(compile(!col("Id").eq(1)).unwrap(), "NOT (Id = 1)");
        assert_eq!(compile(-(col("Id") + 1)).unwrap(), "-(Id + 1)");
    }

    #[test]
    fn test_pseudo_columns_always_escaped() {
        assert_eq!(compile(pseudo(PseudoColumn::RowTime)).unwrap(), "`ROWTIME`");
    }

    #[test]
    fn test_unknown_binding() {
        assert_eq!(
            compile(qcol("x", "Id")),
            Err(CompilationError::UnknownBinding("x".to_string()))
        );
    }
}
