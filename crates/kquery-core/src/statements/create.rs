//! CREATE STREAM / CREATE TABLE statements

use crate::compiler::{CompilerOptions, QueryCompiler, QueryKind};
use crate::error::CompilationError;
use crate::identifier;
use crate::literal::quote_string;
use crate::query::{QueryChain, SourceKind};
use crate::shape::{EntityShape, HeaderMapping};
use crate::statements::properties::EntityCreationMetadata;
use crate::types::TypeTranslator;

type Result<T> = std::result::Result<T, CompilationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationType {
    Create,
    CreateOrReplace,
}

impl CreationType {
    pub fn keyword(&self) -> &'static str {
        match self {
            CreationType::Create => "CREATE",
            CreationType::CreateOrReplace => "CREATE OR REPLACE",
        }
    }
}

/// Accumulated state of one CREATE … AS SELECT build.
#[derive(Debug, Clone)]
pub struct StatementContext {
    pub creation_type: CreationType,
    pub kind: SourceKind,
    pub entity_name: String,
    /// Replaces the FROM item of the SELECT when set.
    pub from_item: Option<String>,
    text: String,
}

impl StatementContext {
    pub fn new(
        creation_type: CreationType,
        kind: SourceKind,
        entity_name: impl Into<String>,
    ) -> Self {
        Self {
            creation_type,
            kind,
            entity_name: entity_name.into(),
            from_item: None,
            text: String::new(),
        }
    }

    /// Text accumulated so far, after the entity name.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// `CREATE [OR REPLACE] {STREAM|TABLE} <name> [WITH (…)] AS SELECT … EMIT CHANGES;`
///
/// ```ignore
/// let ksql = CreateAsSelect::stream("MoviesByTitle")
///     .or_replace()
///     .with(&EntityCreationMetadata::new().kafka_topic("movies_by_title"))
///     .as_select(chain)
///     .build_ksql(&options)?;
/// ```
#[derive(Debug, Clone)]
pub struct CreateAsSelect {
    context: StatementContext,
    query: Option<QueryChain>,
}

impl CreateAsSelect {
    pub fn stream(name: impl Into<String>) -> Self {
        Self::new(SourceKind::Stream, name)
    }

    pub fn table(name: impl Into<String>) -> Self {
        Self::new(SourceKind::Table, name)
    }

    pub fn new(kind: SourceKind, name: impl Into<String>) -> Self {
        Self {
            context: StatementContext::new(CreationType::Create, kind, name),
            query: None,
        }
    }

    pub fn or_replace(mut self) -> Self {
        self.context.creation_type = CreationType::CreateOrReplace;
        self
    }

    pub fn with(mut self, metadata: &EntityCreationMetadata) -> Self {
        if let Some(clause) = metadata.to_with_clause() {
            self.context.text.push(' ');
            self.context.text.push_str(&clause);
        }
        self
    }

    pub fn from_item(mut self, name: impl Into<String>) -> Self {
        self.context.from_item = Some(name.into());
        self
    }

    pub fn as_select(mut self, query: QueryChain) -> Self {
        self.query = Some(query);
        self
    }

    pub fn context(&self) -> &StatementContext {
        &self.context
    }

    pub fn build_ksql(&self, options: &CompilerOptions) -> Result<String> {
        let query = self.query.as_ref().ok_or_else(|| {
            CompilationError::InvalidStatement("CREATE … AS SELECT without a query".to_string())
        })?;

        let compiled = QueryCompiler::new(options.clone()).compile_with_from(
            query,
            QueryKind::Persistent,
            self.context.from_item.as_deref(),
        )?;

        Ok(format!(
            "{} {} {}{} AS {}",
            self.context.creation_type.keyword(),
            self.context.kind,
            identifier::escape(&self.context.entity_name, options.escaping),
            self.context.text,
            compiled.text
        ))
    }
}

/// `CREATE [OR REPLACE] [SOURCE] {STREAM|TABLE} [IF NOT EXISTS] <name> (<columns>) WITH (…);`
#[derive(Debug, Clone)]
pub struct CreateEntity {
    creation_type: CreationType,
    kind: SourceKind,
    source: bool,
    if_not_exists: bool,
    name: Option<String>,
    shape: EntityShape,
    metadata: EntityCreationMetadata,
}

impl CreateEntity {
    pub fn stream(shape: EntityShape) -> Self {
        Self::new(SourceKind::Stream, shape)
    }

    pub fn table(shape: EntityShape) -> Self {
        Self::new(SourceKind::Table, shape)
    }

    pub fn new(kind: SourceKind, shape: EntityShape) -> Self {
        Self {
            creation_type: CreationType::Create,
            kind,
            source: false,
            if_not_exists: false,
            name: None,
            shape,
            metadata: EntityCreationMetadata::default(),
        }
    }

    pub fn or_replace(mut self) -> Self {
        self.creation_type = CreationType::CreateOrReplace;
        self
    }

    /// Read-only source, materialized for pull queries when a table.
    pub fn source(mut self) -> Self {
        self.source = true;
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Entity name; the shape name when unset.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with(mut self, metadata: EntityCreationMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn build_ksql(&self, options: &CompilerOptions) -> Result<String> {
        if self.if_not_exists && self.creation_type == CreationType::CreateOrReplace {
            return Err(CompilationError::InvalidStatement(
                "OR REPLACE and IF NOT EXISTS cannot be combined".to_string(),
            ));
        }

        let shape = options.model.apply(&self.shape)?;
        let translator = TypeTranslator::new(options.escaping, options.default_decimal);
        let key_keyword = match self.kind {
            SourceKind::Stream => "KEY",
            SourceKind::Table => "PRIMARY KEY",
        };

        let mut columns = Vec::new();
        for field in shape.fields().iter().filter(|f| !f.ignore_in_ddl) {
            let mut column = format!(
                "{} {}",
                identifier::escape(field.column_name(), options.escaping),
                translator.field_type_text(field)
            );
            if field.is_key {
                column.push(' ');
                column.push_str(key_keyword);
            }
            match &field.headers {
                Some(HeaderMapping::All) => column.push_str(" HEADERS"),
                Some(HeaderMapping::Key(key)) => {
                    column.push_str(&format!(" HEADER({})", quote_string(key)))
                }
                None => {}
            }
            columns.push(column);
        }

        if columns.is_empty() {
            return Err(CompilationError::InvalidStatement(format!(
                "'{}' has no columns to declare",
                shape.name()
            )));
        }
        if self.kind == SourceKind::Table && !shape.fields().iter().any(|f| f.is_key) {
            return Err(CompilationError::InvalidStatement(format!(
                "table '{}' needs a PRIMARY KEY column",
                shape.name()
            )));
        }

        let name = self.name.as_deref().unwrap_or_else(|| shape.name());
        let mut text = self.creation_type.keyword().to_string();
        if self.source {
            text.push_str(" SOURCE");
        }
        text.push_str(&format!(" {}", self.kind));
        if self.if_not_exists {
            text.push_str(" IF NOT EXISTS");
        }
        text.push_str(&format!(
            " {} ({})",
            identifier::escape(name, options.escaping),
            columns.join(", ")
        ));
        if let Some(clause) = self.metadata.to_with_clause() {
            text.push(' ');
            text.push_str(&clause);
        }
        text.push(';');
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;
    use crate::identifier::IdentifierEscaping;
    use crate::query::{ProjectedColumn, Projection, QuerySource};
    use crate::shape::{DecimalPrecision, FieldMetadata, ValueShape};
    use crate::statements::properties::SerializationFormat;

    fn movie() -> EntityShape {
        EntityShape::builder("Movie")
            .key("Id", ValueShape::Int32)
            .field("Title", ValueShape::String)
            .with(FieldMetadata::new("Year", ValueShape::Int32).with_column_name("Release_Year"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_or_replace_as_select() {
        let chain = QueryChain::from_source(QuerySource::stream("Movie").with_shape(movie()))
            .filter(col("Id").lt(3))
            .select(Projection::record([
                ProjectedColumn::member("Title"),
                ProjectedColumn::new("ReleaseYear", col("Year")),
            ]))
            .partition_by(col("Title"));

        let ksql = CreateAsSelect::stream("X")
            .or_replace()
            .with(
                &EntityCreationMetadata::new()
                    .kafka_topic("x")
                    .partitions(1)
                    .value_format(SerializationFormat::Json),
            )
            .as_select(chain)
            .build_ksql(&CompilerOptions::default())
            .unwrap();

        assert_eq!(
            ksql,
            "CREATE OR REPLACE STREAM X WITH (KAFKA_TOPIC='x', VALUE_FORMAT='JSON', PARTITIONS='1') AS SELECT Title, Release_Year AS ReleaseYear FROM Movie WHERE Id < 3 PARTITION BY Title EMIT CHANGES;"
        );
    }

    #[test]
    fn test_create_as_select_without_query_fails() {
        let err = CreateAsSelect::table("T")
            .build_ksql(&CompilerOptions::default())
            .unwrap_err();
        assert!(matches!(err, CompilationError::InvalidStatement(_)));
    }

    #[test]
    fn test_from_item_override() {
        let chain = QueryChain::from_source(QuerySource::table("Movie"));
        let ksql = CreateAsSelect::table("MoviesCopy")
            .from_item("Movies_Table")
            .as_select(chain)
            .build_ksql(&CompilerOptions::default())
            .unwrap();
        assert_eq!(
            ksql,
            "CREATE TABLE MoviesCopy AS SELECT * FROM Movies_Table EMIT CHANGES;"
        );
    }

    #[test]
    fn test_create_table_with_columns() {
        let ksql = CreateEntity::table(movie())
            .if_not_exists()
            .named("Movies")
            .with(
                EntityCreationMetadata::new()
                    .kafka_topic("movies")
                    .value_format(SerializationFormat::Json)
                    .partitions(1),
            )
            .build_ksql(&CompilerOptions::default())
            .unwrap();

        assert_eq!(
            ksql,
            "CREATE TABLE IF NOT EXISTS Movies (Id INT PRIMARY KEY, Title VARCHAR, Release_Year INT) WITH (KAFKA_TOPIC='movies', VALUE_FORMAT='JSON', PARTITIONS='1');"
        );
    }

    #[test]
    fn test_create_source_stream_with_headers_and_decimal() {
        let shape = EntityShape::builder("Payment")
            .key("Id", ValueShape::String)
            .with(
                FieldMetadata::new("Amount", ValueShape::Decimal)
                    .with_decimal(DecimalPrecision::new(3, 2).unwrap()),
            )
            .field("Fee", ValueShape::Decimal)
            .with(FieldMetadata::new("Headers", ValueShape::Bytes).with_headers(HeaderMapping::All))
            .with(FieldMetadata::new("Ignored", ValueShape::Int32).ignored())
            .build()
            .unwrap();

        let ksql = CreateEntity::stream(shape)
            .source()
            .build_ksql(&CompilerOptions::default())
            .unwrap();

        assert_eq!(
            ksql,
            "CREATE SOURCE STREAM Payment (Id VARCHAR KEY, Amount DECIMAL(3,2), Fee DECIMAL(10,2), Headers ARRAY<STRUCT<KEY VARCHAR, VALUE BYTES>> HEADERS);"
        );
    }

    #[test]
    fn test_escaping_applies_to_columns() {
        let options = CompilerOptions {
            escaping: IdentifierEscaping::Always,
            ..Default::default()
        };
        let ksql = CreateEntity::stream(movie()).build_ksql(&options).unwrap();
        assert_eq!(
            ksql,
            "CREATE STREAM `Movie` (`Id` INT KEY, `Title` VARCHAR, `Release_Year` INT);"
        );
    }

    #[test]
    fn test_table_without_key_fails() {
        let shape = EntityShape::builder("Keyless")
            .field("Value", ValueShape::Int32)
            .build()
            .unwrap();
        assert!(CreateEntity::table(shape)
            .build_ksql(&CompilerOptions::default())
            .is_err());
    }
}
