//! Built-in ksql functions
//!
//! Scalar helpers return [`Expr::Function`] nodes, aggregates return
//! [`Expr::Aggregate`] nodes which are only valid in grouped queries.
//! Anything not covered here can be called through [`call`] or written
//! verbatim with [`crate::expr::raw`].

use crate::expr::{lambda, Expr};

/// Aggregate functions understood by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
    TopK,
    TopKDistinct,
    CollectList,
    CollectSet,
    LatestByOffset,
    EarliestByOffset,
    Histogram,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::CountDistinct => "COUNT_DISTINCT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::TopK => "TOPK",
            AggregateFunction::TopKDistinct => "TOPKDISTINCT",
            AggregateFunction::CollectList => "COLLECT_LIST",
            AggregateFunction::CollectSet => "COLLECT_SET",
            AggregateFunction::LatestByOffset => "LATEST_BY_OFFSET",
            AggregateFunction::EarliestByOffset => "EARLIEST_BY_OFFSET",
            AggregateFunction::Histogram => "HISTOGRAM",
        }
    }
}

fn aggregate(function: AggregateFunction, args: Vec<Expr>) -> Expr {
    Expr::Aggregate { function, args }
}

/// Generic function call; the name is emitted upper-cased.
pub fn call(name: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args: args.into_iter().collect(),
    }
}

// Aggregates

/// `COUNT(*)`
pub fn count() -> Expr {
    aggregate(AggregateFunction::Count, vec![])
}

pub fn count_of(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Count, vec![expr])
}

pub fn count_distinct(expr: Expr) -> Expr {
    aggregate(AggregateFunction::CountDistinct, vec![expr])
}

pub fn sum(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Sum, vec![expr])
}

pub fn avg(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Avg, vec![expr])
}

pub fn min(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Min, vec![expr])
}

pub fn max(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Max, vec![expr])
}

pub fn topk(expr: Expr, k: u32) -> Expr {
    aggregate(AggregateFunction::TopK, vec![expr, Expr::from(k)])
}

pub fn topk_distinct(expr: Expr, k: u32) -> Expr {
    aggregate(AggregateFunction::TopKDistinct, vec![expr, Expr::from(k)])
}

pub fn collect_list(expr: Expr) -> Expr {
    aggregate(AggregateFunction::CollectList, vec![expr])
}

pub fn collect_set(expr: Expr) -> Expr {
    aggregate(AggregateFunction::CollectSet, vec![expr])
}

pub fn latest_by_offset(expr: Expr) -> Expr {
    aggregate(AggregateFunction::LatestByOffset, vec![expr])
}

pub fn earliest_by_offset(expr: Expr) -> Expr {
    aggregate(AggregateFunction::EarliestByOffset, vec![expr])
}

pub fn histogram(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Histogram, vec![expr])
}

// Scalar functions

pub fn len(expr: Expr) -> Expr {
    call("LEN", [expr])
}

pub fn ucase(expr: Expr) -> Expr {
    call("UCASE", [expr])
}

pub fn lcase(expr: Expr) -> Expr {
    call("LCASE", [expr])
}

pub fn trim(expr: Expr) -> Expr {
    call("TRIM", [expr])
}

pub fn concat(args: impl IntoIterator<Item = Expr>) -> Expr {
    call("CONCAT", args)
}

pub fn substring(expr: Expr, from: i32, length: Option<i32>) -> Expr {
    let mut args = vec![expr, Expr::from(from)];
    if let Some(length) = length {
        args.push(Expr::from(length));
    }
    call("SUBSTRING", args)
}

pub fn abs(expr: Expr) -> Expr {
    call("ABS", [expr])
}

pub fn ceil(expr: Expr) -> Expr {
    call("CEIL", [expr])
}

pub fn floor(expr: Expr) -> Expr {
    call("FLOOR", [expr])
}

pub fn round(expr: Expr, scale: Option<i32>) -> Expr {
    let mut args = vec![expr];
    if let Some(scale) = scale {
        args.push(Expr::from(scale));
    }
    call("ROUND", args)
}

pub fn coalesce(args: impl IntoIterator<Item = Expr>) -> Expr {
    call("COALESCE", args)
}

pub fn ifnull(expr: Expr, fallback: Expr) -> Expr {
    call("IFNULL", [expr, fallback])
}

pub fn array_length(expr: Expr) -> Expr {
    call("ARRAY_LENGTH", [expr])
}

pub fn array_contains(expr: Expr, value: Expr) -> Expr {
    call("ARRAY_CONTAINS", [expr, value])
}

pub fn map_keys(expr: Expr) -> Expr {
    call("MAP_KEYS", [expr])
}

pub fn map_values(expr: Expr) -> Expr {
    call("MAP_VALUES", [expr])
}

pub fn extract_json_field(expr: Expr, path: &str) -> Expr {
    call("EXTRACTJSONFIELD", [expr, Expr::from(path)])
}

pub fn format_timestamp(expr: Expr, pattern: &str) -> Expr {
    call("FORMAT_TIMESTAMP", [expr, Expr::from(pattern)])
}

pub fn unix_timestamp() -> Expr {
    call("UNIX_TIMESTAMP", [])
}

// Higher-order functions

/// `TRANSFORM(array, (x) => body)`.
pub fn transform(array: Expr, param: &str, body: Expr) -> Expr {
    call("TRANSFORM", [array, lambda([param], body)])
}

/// `TRANSFORM(map, (k, v) => key_body, (k, v) => value_body)`.
pub fn transform_map(map: Expr, params: [&str; 2], key_body: Expr, value_body: Expr) -> Expr {
    call(
        "TRANSFORM",
        [map, lambda(params, key_body), lambda(params, value_body)],
    )
}

/// `FILTER(array, (x) => predicate)`.
pub fn filter(array: Expr, param: &str, predicate: Expr) -> Expr {
    call("FILTER", [array, lambda([param], predicate)])
}

/// `REDUCE(array, initial, (state, x) => body)`.
pub fn reduce(array: Expr, initial: Expr, params: [&str; 2], body: Expr) -> Expr {
    call("REDUCE", [array, initial, lambda(params, body)])
}
