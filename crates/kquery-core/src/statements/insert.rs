//! INSERT INTO … VALUES statements
//!
//! Values arrive as `serde_json::Value` (usually produced by serializing a
//! host record) and are rendered column by column using the entity shape,
//! so a JSON string becomes a quoted VARCHAR, a BYTES literal or a timestamp
//! depending on what the member is declared as.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

use crate::compiler::{pluralize, CompilerOptions};
use crate::error::CompilationError;
use crate::identifier::{self, IdentifierEscaping};
use crate::literal::{format_double, quote_string};
use crate::shape::{EntityShape, FieldMetadata, ValueShape};

type Result<T> = std::result::Result<T, CompilationError>;

/// Renders a double or decimal value into literal text.
pub type NumberFormatter = Arc<dyn Fn(&serde_json::Number) -> String + Send + Sync>;

/// Renders a whole member value into literal text.
pub type ValueFormatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Options of one INSERT statement.
#[derive(Clone, Default)]
pub struct InsertProperties {
    /// Target name; the (optionally pluralized) entity name when unset.
    pub entity_name: Option<String>,
    pub format_double: Option<NumberFormatter>,
    pub format_decimal: Option<NumberFormatter>,
    field_formatters: HashMap<String, ValueFormatter>,
}

impl fmt::Debug for InsertProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertProperties")
            .field("entity_name", &self.entity_name)
            .field("format_double", &self.format_double.is_some())
            .field("format_decimal", &self.format_decimal.is_some())
            .field("field_formatters", &self.field_formatters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl InsertProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = Some(name.into());
        self
    }

    pub fn with_double_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&serde_json::Number) -> String + Send + Sync + 'static,
    {
        self.format_double = Some(Arc::new(formatter));
        self
    }

    pub fn with_decimal_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&serde_json::Number) -> String + Send + Sync + 'static,
    {
        self.format_decimal = Some(Arc::new(formatter));
        self
    }

    /// Formatter for one member, overriding every other rule for it.
    pub fn with_field_formatter<F>(mut self, member: impl Into<String>, formatter: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.field_formatters
            .insert(member.into(), Arc::new(formatter));
        self
    }
}

/// `INSERT INTO <name> (<cols>) VALUES (<literals>);`
///
/// Members ignored in DML and header columns are skipped; members missing
/// from `value` are inserted as `NULL`.
pub fn insert_statement(
    shape: &EntityShape,
    value: &Value,
    properties: &InsertProperties,
    options: &CompilerOptions,
) -> Result<String> {
    let shape = options.model.apply(shape)?;
    let object = value.as_object().ok_or_else(|| CompilationError::UnsupportedValue {
        column: shape.name().to_string(),
        reason: "an inserted record must serialize to an object".to_string(),
    })?;

    let renderer = ValueRenderer {
        escaping: options.escaping,
        properties,
    };

    let mut columns = Vec::new();
    let mut values = Vec::new();
    for field in shape.fields().iter().filter(|f| !f.ignore_in_dml && f.headers.is_none()) {
        let value = object.get(&field.member).unwrap_or(&Value::Null);
        let text = match properties.field_formatters.get(&field.member) {
            Some(formatter) => formatter(value),
            None => renderer.render(field.column_name(), &field.shape, value)?,
        };
        columns.push(identifier::escape(field.column_name(), options.escaping).into_owned());
        values.push(text);
    }

    if columns.is_empty() {
        return Err(CompilationError::InvalidStatement(format!(
            "'{}' has no insertable columns",
            shape.name()
        )));
    }

    let name = match &properties.entity_name {
        Some(name) => name.clone(),
        None if options.pluralize_from_items => pluralize(shape.name()),
        None => shape.name().to_string(),
    };

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({});",
        identifier::escape(&name, options.escaping),
        columns.join(", "),
        values.join(", ")
    ))
}

struct ValueRenderer<'a> {
    escaping: IdentifierEscaping,
    properties: &'a InsertProperties,
}

impl ValueRenderer<'_> {
    fn render(&self, column: &str, shape: &ValueShape, value: &Value) -> Result<String> {
        if value.is_null() {
            return Ok("NULL".to_string());
        }
        let unsupported = |reason: &str| CompilationError::UnsupportedValue {
            column: column.to_string(),
            reason: format!("{}, got {}", reason, value),
        };

        match shape.unwrap_nullable() {
            ValueShape::Bool => value
                .as_bool()
                .map(|b| b.to_string())
                .ok_or_else(|| unsupported("expected a boolean")),
            ValueShape::Int16 | ValueShape::Int32 | ValueShape::Int64 => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
                _ => Err(unsupported("expected an integer")),
            },
            ValueShape::Float32 | ValueShape::Float64 => match value {
                Value::Number(n) => Ok(match &self.properties.format_double {
                    Some(formatter) => formatter(n),
                    None => n.as_f64().map(format_double).unwrap_or_else(|| n.to_string()),
                }),
                _ => Err(unsupported("expected a number")),
            },
            ValueShape::Decimal => match value {
                Value::Number(n) => Ok(match &self.properties.format_decimal {
                    Some(formatter) => formatter(n),
                    None => n.to_string(),
                }),
                Value::String(s) if is_decimal_text(s) => Ok(s.clone()),
                _ => Err(unsupported("expected a decimal")),
            },
            ValueShape::String
            | ValueShape::Guid
            | ValueShape::Date
            | ValueShape::Time
            | ValueShape::Timestamp => value
                .as_str()
                .map(quote_string)
                .ok_or_else(|| unsupported("expected a string")),
            ValueShape::Enum => match value {
                Value::String(s) => Ok(quote_string(s)),
                Value::Number(n) => Ok(quote_string(&n.to_string())),
                _ => Err(unsupported("expected an enum name")),
            },
            ValueShape::Bytes => {
                let encoded = match value {
                    Value::String(s) => s.clone(),
                    Value::Array(items) => {
                        let bytes = items
                            .iter()
                            .map(|i| i.as_u64().and_then(|b| u8::try_from(b).ok()))
                            .collect::<Option<Vec<u8>>>()
                            .ok_or_else(|| unsupported("expected a byte array"))?;
                        BASE64.encode(bytes)
                    }
                    _ => return Err(unsupported("expected bytes")),
                };
                Ok(format!("TO_BYTES({}, 'base64')", quote_string(&encoded)))
            }
            ValueShape::Array(element) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| unsupported("expected an array"))?
                    .iter()
                    .map(|item| self.render(column, element, item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("ARRAY[{}]", items.join(", ")))
            }
            ValueShape::Map(key_shape, value_shape) => {
                let entries = value
                    .as_object()
                    .ok_or_else(|| unsupported("expected a map"))?
                    .iter()
                    .map(|(k, v)| {
                        let key = if key_shape.is_textual() {
                            quote_string(k)
                        } else {
                            k.clone()
                        };
                        Ok(format!("{} := {}", key, self.render(column, value_shape, v)?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("MAP({})", entries.join(", ")))
            }
            ValueShape::Struct(entity) => {
                let object = value
                    .as_object()
                    .ok_or_else(|| unsupported("expected a struct"))?;
                let fields = entity
                    .fields()
                    .iter()
                    .filter(|f| !f.ignore_in_ddl)
                    .map(|f| self.render_struct_field(f, object.get(&f.member)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("STRUCT({})", fields.join(", ")))
            }
            ValueShape::Nullable(_) => Err(unsupported("unresolved nullable shape")),
        }
    }

    fn render_struct_field(&self, field: &FieldMetadata, value: Option<&Value>) -> Result<String> {
        let value = value.unwrap_or(&Value::Null);
        Ok(format!(
            "{} := {}",
            identifier::escape(field.column_name(), self.escaping),
            self.render(field.column_name(), &field.shape, value)?
        ))
    }
}

/// Finite numeric text such as `12.50` or `-1e3`; rejects `NaN` and `inf`.
fn is_decimal_text(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        && text.parse::<f64>().map_or(false, f64::is_finite)
}
