//! Fluent model configuration
//!
//! [`ModelBuilder`] layers metadata over the shapes entities declare about
//! themselves: key members, decimal precision, ignore flags, header mappings
//! and column-name overrides. The resulting [`ModelMetadata`] is built once
//! at startup and consulted by the compiler and the statement generators.
//!
//! ```ignore
//! let model = ModelBuilder::new()
//!     .entity("Payment", |e| {
//!         e.has_key("Id")
//!             .property("Amount", |p| p.decimal(10, 2))
//!             .property("Secret", |p| p.ignore())
//!     })
//!     .build()?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ModelError;
use crate::shape::{DecimalPrecision, EntityShape, HeaderMapping, ValueShape};

/// Overrides registered for one member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyOverride {
    pub column_name: Option<String>,
    pub ignore_in_ddl: bool,
    pub ignore_in_dml: bool,
    pub decimal: Option<DecimalPrecision>,
    pub headers: Option<HeaderMapping>,
}

/// Builder for one member's overrides.
#[derive(Debug, Default)]
pub struct PropertyBuilder {
    value: PropertyOverride,
    error: Option<ModelError>,
}

impl PropertyBuilder {
    pub fn decimal(mut self, precision: u8, scale: u8) -> Self {
        match DecimalPrecision::new(precision, scale) {
            Ok(p) => self.value.decimal = Some(p),
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Exclude the member from DDL and DML.
    pub fn ignore(mut self) -> Self {
        self.value.ignore_in_ddl = true;
        self.value.ignore_in_dml = true;
        self
    }

    /// Exclude the member from INSERT statements only.
    pub fn ignore_in_inserts(mut self) -> Self {
        self.value.ignore_in_dml = true;
        self
    }

    pub fn column_name(mut self, name: impl Into<String>) -> Self {
        self.value.column_name = Some(name.into());
        self
    }

    pub fn with_headers(mut self) -> Self {
        self.value.headers = Some(HeaderMapping::All);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>) -> Self {
        self.value.headers = Some(HeaderMapping::Key(key.into()));
        self
    }
}

/// Metadata registered for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityMetadata {
    pub key: Option<String>,
    pub properties: HashMap<String, PropertyOverride>,
}

/// Builder for one entity's metadata.
#[derive(Debug)]
pub struct EntityBuilder {
    name: String,
    metadata: EntityMetadata,
    errors: Vec<ModelError>,
}

impl EntityBuilder {
    pub fn has_key(mut self, member: impl Into<String>) -> Self {
        self.metadata.key = Some(member.into());
        self
    }

    pub fn property<F>(mut self, member: impl Into<String>, configure: F) -> Self
    where
        F: FnOnce(PropertyBuilder) -> PropertyBuilder,
    {
        let member = member.into();
        if self.metadata.properties.contains_key(&member) {
            self.errors.push(ModelError::DuplicateMember {
                entity: self.name.clone(),
                member,
            });
            return self;
        }

        let built = configure(PropertyBuilder::default());
        if let Some(e) = built.error {
            self.errors.push(e);
        }
        self.metadata.properties.insert(member, built.value);
        self
    }
}

/// Collects entity registrations.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    entities: Vec<EntityBuilder>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity<F>(mut self, name: impl Into<String>, configure: F) -> Self
    where
        F: FnOnce(EntityBuilder) -> EntityBuilder,
    {
        let builder = EntityBuilder {
            name: name.into(),
            metadata: EntityMetadata::default(),
            errors: Vec::new(),
        };
        self.entities.push(configure(builder));
        self
    }

    pub fn build(self) -> Result<ModelMetadata, ModelError> {
        let mut entities = HashMap::new();
        for builder in self.entities {
            if let Some(e) = builder.errors.into_iter().next() {
                return Err(e);
            }
            if entities.contains_key(&builder.name) {
                return Err(ModelError::DuplicateEntity(builder.name));
            }
            entities.insert(builder.name, builder.metadata);
        }
        Ok(ModelMetadata {
            entities: Arc::new(entities),
        })
    }
}

/// Immutable, cheaply clonable registry produced by [`ModelBuilder`].
#[derive(Debug, Clone, Default)]
pub struct ModelMetadata {
    entities: Arc<HashMap<String, EntityMetadata>>,
}

impl ModelMetadata {
    pub fn entity(&self, name: &str) -> Option<&EntityMetadata> {
        self.entities.get(name)
    }

    /// Merge registered overrides into `shape`, recursing into struct members.
    pub fn apply(&self, shape: &EntityShape) -> Result<EntityShape, ModelError> {
        let mut resolved = shape.clone();

        for field in resolved.fields_mut() {
            field.shape = self.apply_value(&field.shape)?;
        }

        let Some(metadata) = self.entities.get(shape.name()) else {
            return Ok(resolved);
        };

        for member in metadata
            .properties
            .keys()
            .chain(metadata.key.as_ref())
        {
            if shape.field(member).is_none() {
                return Err(ModelError::UnknownMember {
                    entity: shape.name().to_string(),
                    member: member.clone(),
                });
            }
        }

        for field in resolved.fields_mut() {
            if let Some(key) = &metadata.key {
                field.is_key = *key == field.member;
            }
            if let Some(o) = metadata.properties.get(&field.member) {
                if o.column_name.is_some() {
                    field.column_name = o.column_name.clone();
                }
                field.ignore_in_ddl |= o.ignore_in_ddl;
                field.ignore_in_dml |= o.ignore_in_dml;
                if o.decimal.is_some() {
                    field.decimal = o.decimal;
                }
                if o.headers.is_some() {
                    field.headers = o.headers.clone();
                }
            }
        }

        Ok(resolved)
    }

    fn apply_value(&self, shape: &ValueShape) -> Result<ValueShape, ModelError> {
        Ok(match shape {
            ValueShape::Nullable(inner) => ValueShape::nullable(self.apply_value(inner)?),
            ValueShape::Array(inner) => ValueShape::array(self.apply_value(inner)?),
            ValueShape::Map(k, v) => ValueShape::map(self.apply_value(k)?, self.apply_value(v)?),
            ValueShape::Struct(inner) => ValueShape::structure(self.apply(inner)?),
            other => other.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> EntityShape {
        EntityShape::builder("Payment")
            .field("Id", ValueShape::String)
            .field("Amount", ValueShape::Decimal)
            .field("Secret", ValueShape::String)
            .build()
            .unwrap()
    }

    #[test]
    fn test_overrides_applied() {
        let model = ModelBuilder::new()
            .entity("Payment", |e| {
                e.has_key("Id")
                    .property("Amount", |p| p.decimal(12, 4).column_name("AMT"))
                    .property("Secret", |p| p.ignore())
            })
            .build()
            .unwrap();

        let shape = model.apply(&payment()).unwrap();

        assert!(shape.field("Id").unwrap().is_key);
        let amount = shape.field("Amount").unwrap();
        assert_eq!(amount.decimal, Some(DecimalPrecision { precision: 12, scale: 4 }));
        assert_eq!(amount.column_name(), "AMT");
        assert!(shape.field("Secret").unwrap().ignore_in_ddl);
    }

    #[test]
    fn test_member_registered_twice() {
        let err = ModelBuilder::new()
            .entity("Payment", |e| {
                e.property("Amount", |p| p.decimal(10, 2))
                    .property("Amount", |p| p.ignore())
            })
            .build()
            .unwrap_err();

        assert!(matches!(err, ModelError::DuplicateMember { .. }));
    }

    #[test]
    fn test_unknown_member_rejected_on_apply() {
        let model = ModelBuilder::new()
            .entity("Payment", |e| e.property("Missing", |p| p.ignore()))
            .build()
            .unwrap();

        assert!(matches!(
            model.apply(&payment()),
            Err(ModelError::UnknownMember { .. })
        ));
    }

    #[test]
    fn test_nested_struct_overrides() {
        let address = EntityShape::builder("Address")
            .field("Zip", ValueShape::Decimal)
            .build()
            .unwrap();
        let person = EntityShape::builder("Person")
            .field("Home", ValueShape::structure(address))
            .build()
            .unwrap();

        let model = ModelBuilder::new()
            .entity("Address", |e| e.property("Zip", |p| p.decimal(5, 0)))
            .build()
            .unwrap();

        let resolved = model.apply(&person).unwrap();
        let ValueShape::Struct(home) = &resolved.field("Home").unwrap().shape else {
            panic!("expected struct");
        };
        assert_eq!(
            home.field("Zip").unwrap().decimal,
            Some(DecimalPrecision { precision: 5, scale: 0 })
        );
    }
}
