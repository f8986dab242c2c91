//! Static value shapes
//!
//! A [`ValueShape`] describes what a host value looks like (a primitive, a
//! nullable wrapper, an array, a map or a struct) without relying on runtime
//! reflection. Entities describe their members once through
//! [`EntityShape::builder`] and the compiler, the statement generators and
//! the type translator all work from that description.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Shape of a single host value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueShape {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    String,
    Guid,
    Enum,
    Bytes,
    Date,
    Time,
    Timestamp,
    Nullable(Box<ValueShape>),
    Array(Box<ValueShape>),
    Map(Box<ValueShape>, Box<ValueShape>),
    Struct(Arc<EntityShape>),
}

/// Coarse classification used by the DDL generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Primitive,
    Array,
    Map,
    Struct,
}

impl ValueShape {
    pub fn nullable(inner: ValueShape) -> Self {
        ValueShape::Nullable(Box::new(inner))
    }

    pub fn array(element: ValueShape) -> Self {
        ValueShape::Array(Box::new(element))
    }

    pub fn map(key: ValueShape, value: ValueShape) -> Self {
        ValueShape::Map(Box::new(key), Box::new(value))
    }

    pub fn structure(shape: EntityShape) -> Self {
        ValueShape::Struct(Arc::new(shape))
    }

    /// Strip any number of nullable wrappers.
    pub fn unwrap_nullable(&self) -> &ValueShape {
        match self {
            ValueShape::Nullable(inner) => inner.unwrap_nullable(),
            other => other,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self.unwrap_nullable() {
            ValueShape::Array(_) => ShapeKind::Array,
            ValueShape::Map(_, _) => ShapeKind::Map,
            ValueShape::Struct(_) => ShapeKind::Struct,
            _ => ShapeKind::Primitive,
        }
    }

    /// True for shapes whose literals are written as quoted strings.
    pub fn is_textual(&self) -> bool {
        matches!(
            self.unwrap_nullable(),
            ValueShape::String
                | ValueShape::Guid
                | ValueShape::Enum
                | ValueShape::Date
                | ValueShape::Time
                | ValueShape::Timestamp
        )
    }
}

/// Explicit `DECIMAL(precision, scale)` declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecimalPrecision {
    pub precision: u8,
    pub scale: u8,
}

impl DecimalPrecision {
    pub fn new(precision: u8, scale: u8) -> Result<Self, ModelError> {
        if scale > precision {
            return Err(ModelError::InvalidPrecision { precision, scale });
        }
        Ok(Self { precision, scale })
    }
}

impl Default for DecimalPrecision {
    fn default() -> Self {
        Self {
            precision: 10,
            scale: 2,
        }
    }
}

/// How a field is populated from record headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderMapping {
    /// `HEADERS`: the full header list, declared as `ARRAY<STRUCT<KEY STRING, VALUE BYTES>>`.
    All,
    /// `HEADER('key')`: the value of one header.
    Key(String),
}

/// Per-member metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMetadata {
    pub member: String,
    pub shape: ValueShape,
    pub column_name: Option<String>,
    pub is_key: bool,
    pub ignore_in_ddl: bool,
    pub ignore_in_dml: bool,
    pub decimal: Option<DecimalPrecision>,
    pub headers: Option<HeaderMapping>,
}

impl FieldMetadata {
    pub fn new(member: impl Into<String>, shape: ValueShape) -> Self {
        Self {
            member: member.into(),
            shape,
            column_name: None,
            is_key: false,
            ignore_in_ddl: false,
            ignore_in_dml: false,
            decimal: None,
            headers: None,
        }
    }

    /// Column name used in statement text.
    pub fn column_name(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.member)
    }

    pub fn with_column_name(mut self, name: impl Into<String>) -> Self {
        self.column_name = Some(name.into());
        self
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignore_in_ddl = true;
        self.ignore_in_dml = true;
        self
    }

    pub fn ignored_in_dml(mut self) -> Self {
        self.ignore_in_dml = true;
        self
    }

    pub fn with_decimal(mut self, precision: DecimalPrecision) -> Self {
        self.decimal = Some(precision);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMapping) -> Self {
        self.headers = Some(headers);
        self
    }
}

/// Shape of an entity: its name and members in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityShape {
    name: String,
    fields: Vec<FieldMetadata>,
}

impl EntityShape {
    pub fn builder(name: impl Into<String>) -> EntityShapeBuilder {
        EntityShapeBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldMetadata] {
        &self.fields
    }

    pub fn field(&self, member: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.member == member)
    }

    pub fn key_field(&self) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.is_key)
    }

    /// Column name for `member`, falling back to the member name itself.
    pub fn column_name<'a>(&'a self, member: &'a str) -> &'a str {
        self.field(member).map(|f| f.column_name()).unwrap_or(member)
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Vec<FieldMetadata> {
        &mut self.fields
    }
}

/// Builder for [`EntityShape`]. Registering a member twice is an error.
#[derive(Debug)]
pub struct EntityShapeBuilder {
    name: String,
    fields: Vec<FieldMetadata>,
}

impl EntityShapeBuilder {
    pub fn field(self, member: impl Into<String>, shape: ValueShape) -> Self {
        self.with(FieldMetadata::new(member, shape))
    }

    pub fn key(self, member: impl Into<String>, shape: ValueShape) -> Self {
        self.with(FieldMetadata::new(member, shape).key())
    }

    pub fn with(mut self, field: FieldMetadata) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Result<EntityShape, ModelError> {
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.member == field.member) {
                return Err(ModelError::DuplicateMember {
                    entity: self.name.clone(),
                    member: field.member.clone(),
                });
            }
        }

        Ok(EntityShape {
            name: self.name,
            fields: self.fields,
        })
    }
}

/// Types that can be queried from or inserted into ksqlDB.
///
/// ```ignore
/// impl KsqlEntity for Movie {
///     fn shape() -> EntityShape {
///         EntityShape::builder("Movie")
///             .key("Id", ValueShape::Int32)
///             .field("Title", ValueShape::String)
///             .build()
///             .expect("static shape")
///     }
/// }
/// ```
pub trait KsqlEntity {
    fn shape() -> EntityShape;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie() -> EntityShape {
        EntityShape::builder("Movie")
            .key("Id", ValueShape::Int32)
            .field("Title", ValueShape::String)
            .with(FieldMetadata::new("Year", ValueShape::Int32).with_column_name("Release_Year"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let err = EntityShape::builder("Movie")
            .field("Id", ValueShape::Int32)
            .field("Id", ValueShape::Int64)
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            ModelError::DuplicateMember {
                entity: "Movie".to_string(),
                member: "Id".to_string()
            }
        );
    }

    #[test]
    fn test_column_name_override() {
        let shape = movie();
        assert_eq!(shape.column_name("Year"), "Release_Year");
        assert_eq!(shape.column_name("Title"), "Title");
        assert_eq!(shape.column_name("Unknown"), "Unknown");
    }

    #[test]
    fn test_key_field() {
        assert_eq!(movie().key_field().map(|f| f.member.as_str()), Some("Id"));
    }

    #[test]
    fn test_shape_kind_sees_through_nullable() {
        let shape = ValueShape::nullable(ValueShape::array(ValueShape::Int32));
        assert_eq!(shape.kind(), ShapeKind::Array);
        assert_eq!(ValueShape::Decimal.kind(), ShapeKind::Primitive);
    }

    #[test]
    fn test_decimal_precision_validation() {
        assert!(DecimalPrecision::new(4, 2).is_ok());
        assert!(DecimalPrecision::new(2, 4).is_err());
    }
}
