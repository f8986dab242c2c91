//! ksql type system and the host-shape translator

use std::fmt;

use crate::identifier::{self, IdentifierEscaping};
use crate::shape::{DecimalPrecision, EntityShape, FieldMetadata, HeaderMapping, ValueShape};

/// A ksql column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KsqlType {
    Boolean,
    Int,
    BigInt,
    Double,
    Decimal(DecimalPrecision),
    Varchar,
    Bytes,
    Date,
    Time,
    Timestamp,
    Array(Box<KsqlType>),
    Map(Box<KsqlType>, Box<KsqlType>),
    Struct(Vec<(String, KsqlType)>),
}

impl KsqlType {
    /// Render the type, escaping struct field names with `escaping`.
    pub fn render(&self, escaping: IdentifierEscaping) -> String {
        match self {
            KsqlType::Boolean => "BOOLEAN".to_string(),
            KsqlType::Int => "INT".to_string(),
            KsqlType::BigInt => "BIGINT".to_string(),
            KsqlType::Double => "DOUBLE".to_string(),
            KsqlType::Decimal(p) => format!("DECIMAL({},{})", p.precision, p.scale),
            KsqlType::Varchar => "VARCHAR".to_string(),
            KsqlType::Bytes => "BYTES".to_string(),
            KsqlType::Date => "DATE".to_string(),
            KsqlType::Time => "TIME".to_string(),
            KsqlType::Timestamp => "TIMESTAMP".to_string(),
            KsqlType::Array(element) => format!("ARRAY<{}>", element.render(escaping)),
            KsqlType::Map(k, v) => format!("MAP<{}, {}>", k.render(escaping), v.render(escaping)),
            KsqlType::Struct(fields) => {
                let fields = fields
                    .iter()
                    .map(|(name, ty)| {
                        format!("{} {}", identifier::escape(name, escaping), ty.render(escaping))
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("STRUCT<{}>", fields)
            }
        }
    }
}

impl fmt::Display for KsqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(IdentifierEscaping::Never))
    }
}

/// Maps host shapes onto ksql types.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeTranslator {
    pub escaping: IdentifierEscaping,
    pub default_decimal: DecimalPrecision,
}

impl TypeTranslator {
    pub fn new(escaping: IdentifierEscaping, default_decimal: DecimalPrecision) -> Self {
        Self {
            escaping,
            default_decimal,
        }
    }

    /// Translate a shape. Decimals use the configured default precision.
    pub fn translate(&self, shape: &ValueShape) -> KsqlType {
        self.translate_with(shape, None)
    }

    /// Translate a member. Its declared decimal precision wins over the default,
    /// header fields map to the header column types.
    pub fn translate_field(&self, field: &FieldMetadata) -> KsqlType {
        if let Some(HeaderMapping::All) = field.headers {
            return header_list_type();
        }
        if let Some(HeaderMapping::Key(_)) = field.headers {
            return KsqlType::Bytes;
        }
        self.translate_with(&field.shape, field.decimal)
    }

    fn translate_with(&self, shape: &ValueShape, decimal: Option<DecimalPrecision>) -> KsqlType {
        match shape {
            ValueShape::Bool => KsqlType::Boolean,
            ValueShape::Int16 | ValueShape::Int32 => KsqlType::Int,
            ValueShape::Int64 => KsqlType::BigInt,
            ValueShape::Float32 | ValueShape::Float64 => KsqlType::Double,
            ValueShape::Decimal => KsqlType::Decimal(decimal.unwrap_or(self.default_decimal)),
            ValueShape::String | ValueShape::Guid | ValueShape::Enum => KsqlType::Varchar,
            ValueShape::Bytes => KsqlType::Bytes,
            ValueShape::Date => KsqlType::Date,
            ValueShape::Time => KsqlType::Time,
            ValueShape::Timestamp => KsqlType::Timestamp,
            ValueShape::Nullable(inner) => self.translate_with(inner, decimal),
            ValueShape::Array(element) => {
                KsqlType::Array(Box::new(self.translate_with(element, decimal)))
            }
            ValueShape::Map(k, v) => KsqlType::Map(
                Box::new(self.translate(k)),
                Box::new(self.translate_with(v, decimal)),
            ),
            ValueShape::Struct(entity) => self.translate_struct(entity),
        }
    }

    /// `STRUCT<…>` for an entity: members in declaration order, DDL-ignored members skipped.
    pub fn translate_struct(&self, entity: &EntityShape) -> KsqlType {
        KsqlType::Struct(
            entity
                .fields()
                .iter()
                .filter(|f| !f.ignore_in_ddl)
                .map(|f| (f.column_name().to_string(), self.translate_field(f)))
                .collect(),
        )
    }

    /// Rendered type text for a member.
    pub fn field_type_text(&self, field: &FieldMetadata) -> String {
        self.translate_field(field).render(self.escaping)
    }
}

fn header_list_type() -> KsqlType {
    KsqlType::Array(Box::new(KsqlType::Struct(vec![
        ("KEY".to_string(), KsqlType::Varchar),
        ("VALUE".to_string(), KsqlType::Bytes),
    ])))
}
