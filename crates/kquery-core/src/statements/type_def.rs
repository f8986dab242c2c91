//! CREATE TYPE statements

use crate::compiler::CompilerOptions;
use crate::error::CompilationError;
use crate::identifier;
use crate::shape::EntityShape;
use crate::types::TypeTranslator;

/// `CREATE [OR REPLACE] TYPE [IF NOT EXISTS] <NAME> AS STRUCT<…>;`
///
/// Type names are registered upper-cased by the server, so they are emitted
/// that way.
#[derive(Debug, Clone)]
pub struct CreateType {
    shape: EntityShape,
    name: Option<String>,
    or_replace: bool,
    if_not_exists: bool,
}

impl CreateType {
    pub fn new(shape: EntityShape) -> Self {
        Self {
            shape,
            name: None,
            or_replace: false,
            if_not_exists: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn or_replace(mut self) -> Self {
        self.or_replace = true;
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn build_ksql(&self, options: &CompilerOptions) -> Result<String, CompilationError> {
        if self.or_replace && self.if_not_exists {
            return Err(CompilationError::InvalidStatement(
                "OR REPLACE and IF NOT EXISTS cannot be combined".to_string(),
            ));
        }

        let shape = options.model.apply(&self.shape)?;
        let name = self
            .name
            .as_deref()
            .unwrap_or_else(|| shape.name())
            .to_uppercase();
        let translator = TypeTranslator::new(options.escaping, options.default_decimal);
        let body = translator.translate_struct(&shape).render(options.escaping);

        Ok(format!(
            "CREATE {}TYPE {}{} AS {};",
            if self.or_replace { "OR REPLACE " } else { "" },
            if self.if_not_exists { "IF NOT EXISTS " } else { "" },
            identifier::escape(&name, options.escaping),
            body
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{FieldMetadata, ValueShape};

    fn address() -> EntityShape {
        EntityShape::builder("Address")
            .field("Street", ValueShape::String)
            .field("Number", ValueShape::nullable(ValueShape::Int32))
            .field("Tags", ValueShape::map(ValueShape::String, ValueShape::array(ValueShape::Int64)))
            .with(FieldMetadata::new("Internal", ValueShape::Bool).ignored())
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_type() {
        assert_eq!(
            CreateType::new(address())
                .build_ksql(&CompilerOptions::default())
                .unwrap(),
            "CREATE TYPE ADDRESS AS STRUCT<Street VARCHAR, Number INT, Tags MAP<VARCHAR, ARRAY<BIGINT>>>;"
        );
    }

    #[test]
    fn test_nested_struct_type() {
        let person = EntityShape::builder("Person")
            .field("Name", ValueShape::String)
            .field("Address", ValueShape::structure(address()))
            .build()
            .unwrap();

        assert_eq!(
            CreateType::new(person)
                .if_not_exists()
                .build_ksql(&CompilerOptions::default())
                .unwrap(),
            "CREATE TYPE IF NOT EXISTS PERSON AS STRUCT<Name VARCHAR, Address STRUCT<Street VARCHAR, Number INT, Tags MAP<VARCHAR, ARRAY<BIGINT>>>>;"
        );
    }

    #[test]
    fn test_or_replace_with_explicit_name() {
        assert_eq!(
            CreateType::new(address())
                .named("home_address")
                .or_replace()
                .build_ksql(&CompilerOptions::default())
                .unwrap(),
            "CREATE OR REPLACE TYPE HOME_ADDRESS AS STRUCT<Street VARCHAR, Number INT, Tags MAP<VARCHAR, ARRAY<BIGINT>>>;"
        );
    }
}
