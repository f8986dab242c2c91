//! End-to-end compilation tests
//!
//! Builds entity shapes and operation chains the way an application would
//! and checks the exact ksql text produced for them.

use kquery_core::expr::{col, group_key, lit, param, pseudo, qcol, PseudoColumn};
use kquery_core::functions::{self, count, max};
use kquery_core::statements::{
    insert_statement, CreateAsSelect, CreateEntity, CreateType, EntityCreationMetadata,
    InsertProperties, SerializationFormat,
};
use kquery_core::{
    CompilationError, CompilerOptions, EntityShape, FieldMetadata, IdentifierEscaping,
    KsqlDuration, KsqlEntity, ModelBuilder, ProjectedColumn, Projection, QueryChain,
    QueryCompiler, QueryKind, QuerySource, SourceKind, TimeWindows, ValueShape,
};

// ============================================================================
// Helpers
// ============================================================================

struct Movie;

impl KsqlEntity for Movie {
    fn shape() -> EntityShape {
        EntityShape::builder("Movie")
            .key("Id", ValueShape::Int32)
            .field("Title", ValueShape::String)
            .with(FieldMetadata::new("Year", ValueShape::Int32).with_column_name("Release_Year"))
            .build()
            .unwrap()
    }
}

struct Tweet;

impl KsqlEntity for Tweet {
    fn shape() -> EntityShape {
        EntityShape::builder("Tweet")
            .key("Id", ValueShape::Int64)
            .field("Message", ValueShape::String)
            .field("IsRobot", ValueShape::Bool)
            .field("Amount", ValueShape::Decimal)
            .field("Tags", ValueShape::array(ValueShape::String))
            .field("Select", ValueShape::String)
            .build()
            .unwrap()
    }
}

fn movies() -> QueryChain {
    QueryChain::from_source(QuerySource::of::<Movie>(SourceKind::Stream))
}

fn compiler_with(escaping: IdentifierEscaping) -> QueryCompiler {
    QueryCompiler::new(CompilerOptions {
        escaping,
        ..Default::default()
    })
}

// ============================================================================
// Persistent queries
// ============================================================================

#[test]
fn test_create_or_replace_stream_partitioned_by_title() {
    let chain = movies()
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
                .kafka_topic("movies_by_title")
                .value_format(SerializationFormat::Json)
                .partitions(1),
        )
        .as_select(chain)
        .build_ksql(&CompilerOptions::default())
        .unwrap();

    assert_eq!(
        ksql,
        "CREATE OR REPLACE STREAM X WITH (KAFKA_TOPIC='movies_by_title', VALUE_FORMAT='JSON', PARTITIONS='1') \
         AS SELECT Title, Release_Year AS ReleaseYear FROM Movie WHERE Id < 3 PARTITION BY Title EMIT CHANGES;"
    );
}

#[test]
fn test_compilation_is_idempotent() {
    let chain = movies()
        .group_by(col("Title"))
        .windowed_by(
            TimeWindows::hopping(KsqlDuration::minutes(10), KsqlDuration::minutes(2))
                .with_grace_period(KsqlDuration::seconds(30)),
        )
        .having(count().gt(2))
        .select(Projection::record([
            ProjectedColumn::new("Title", group_key()),
            ProjectedColumn::new("Latest", max(col("Year"))),
        ]))
        .take(5);
    let compiler = QueryCompiler::default();

    let first = compiler.compile(&chain, QueryKind::Push).unwrap();
    let second = compiler.compile(&chain, QueryKind::Push).unwrap();
    assert_eq!(first.text, second.text);
    assert_eq!(
        first.text,
        "SELECT Title, MAX(Release_Year) AS Latest FROM Movie \
         WINDOW HOPPING (SIZE 10 MINUTES, ADVANCE BY 2 MINUTES, GRACE PERIOD 30 SECONDS) \
         GROUP BY Title HAVING COUNT(*) > 2 EMIT CHANGES LIMIT 5;"
    );
}

// ============================================================================
// Identifier escaping
// ============================================================================

#[test]
fn test_escaping_never_leaves_identifiers_bare() {
    let chain = QueryChain::from_source(QuerySource::of::<Tweet>(SourceKind::Stream))
        .filter(col("Select").eq("x"))
        .select(Projection::members(["Message", "Select"]));

    let text = compiler_with(IdentifierEscaping::Never)
        .compile(&chain, QueryKind::Push)
        .unwrap()
        .text;
    assert!(!text.contains('`'));
    assert_eq!(
        text,
        "SELECT Message, Select FROM Tweet WHERE Select = 'x' EMIT CHANGES;"
    );
}

#[test]
fn test_escaping_keywords_only_quotes_reserved_words() {
    let chain = QueryChain::from_source(QuerySource::of::<Tweet>(SourceKind::Stream))
        .select(Projection::members(["Message", "Select"]));

    assert_eq!(
        compiler_with(IdentifierEscaping::Keywords)
            .compile(&chain, QueryKind::Push)
            .unwrap()
            .text,
        "SELECT Message, `Select` FROM Tweet EMIT CHANGES;"
    );
}

#[test]
fn test_escaping_always_quotes_every_identifier() {
    let chain = QueryChain::from_source(QuerySource::of::<Tweet>(SourceKind::Stream))
        .filter(col("IsRobot").eq(true))
        .select(Projection::record([
            ProjectedColumn::member("Message"),
            ProjectedColumn::new("Time", pseudo(PseudoColumn::RowTime)),
        ]));

    assert_eq!(
        compiler_with(IdentifierEscaping::Always)
            .compile(&chain, QueryKind::Push)
            .unwrap()
            .text,
        "SELECT `Message`, `ROWTIME` AS `Time` FROM `Tweet` WHERE `IsRobot` = true EMIT CHANGES;"
    );
}

#[test]
fn test_pseudo_columns_quoted_regardless_of_mode() {
    let chain = movies().select(Projection::Value(pseudo(PseudoColumn::RowOffset)));
    for mode in [
        IdentifierEscaping::Never,
        IdentifierEscaping::Keywords,
        IdentifierEscaping::Always,
    ] {
        let text = compiler_with(mode).compile(&chain, QueryKind::Pull).unwrap().text;
        assert!(text.starts_with("SELECT `ROWOFFSET` FROM"), "{}", text);
    }
}

// ============================================================================
// Types and decimals
// ============================================================================

#[test]
fn test_declared_decimal_precision_overrides_default() {
    let model = ModelBuilder::new()
        .entity("Tweet", |e| e.property("Amount", |p| p.decimal(8, 3)))
        .build()
        .unwrap();
    let options = CompilerOptions {
        default_decimal: kquery_core::DecimalPrecision::new(18, 4).unwrap(),
        model,
        ..Default::default()
    };

    let ksql = CreateEntity::stream(Tweet::shape())
        .with(EntityCreationMetadata::new().kafka_topic("tweets"))
        .build_ksql(&options)
        .unwrap();

    assert_eq!(
        ksql,
        "CREATE STREAM Tweet (Id BIGINT KEY, Message VARCHAR, IsRobot BOOLEAN, Amount DECIMAL(8,3), \
         Tags ARRAY<VARCHAR>, Select VARCHAR) WITH (KAFKA_TOPIC='tweets');"
    );
}

#[test]
fn test_create_type_from_nested_shape() {
    let address = EntityShape::builder("Address")
        .field("Street", ValueShape::String)
        .field("Zip", ValueShape::nullable(ValueShape::Int32))
        .build()
        .unwrap();
    let person = EntityShape::builder("Person")
        .field("Name", ValueShape::String)
        .field("Addresses", ValueShape::array(ValueShape::structure(address)))
        .field("Scores", ValueShape::map(ValueShape::String, ValueShape::Decimal))
        .build()
        .unwrap();

    assert_eq!(
        CreateType::new(person)
            .build_ksql(&CompilerOptions::default())
            .unwrap(),
        "CREATE TYPE PERSON AS STRUCT<Name VARCHAR, Addresses ARRAY<STRUCT<Street VARCHAR, Zip INT>>, \
         Scores MAP<VARCHAR, DECIMAL(10,2)>>;"
    );
}

// ============================================================================
// Joins, lambdas, inserts
// ============================================================================

#[test]
fn test_join_with_projection_and_filter() {
    let actors = QuerySource::table("Lead_Actor").with_binding("actor");
    let chain = movies()
        .join(actors, col("Title"), col("Title"))
        .filter(qcol("movie", "Year").gt(1990))
        .select(Projection::record([
            ProjectedColumn::new("Title", qcol("movie", "Title")),
            ProjectedColumn::new("Actor", qcol("actor", "Actor_Name")),
        ]));

    assert_eq!(
        QueryCompiler::default()
            .compile(&chain, QueryKind::Push)
            .unwrap()
            .text,
        "SELECT M.Title AS Title, L.Actor_Name AS Actor FROM Movie M \
         INNER JOIN Lead_Actor L ON M.Title = L.Title WHERE M.Release_Year > 1990 EMIT CHANGES;"
    );
}

#[test]
fn test_unknown_join_binding_fails() {
    let chain = movies()
        .join(QuerySource::table("Lead_Actor"), col("Title"), col("Title"))
        .filter(qcol("nobody", "Title").eq("x"));

    assert_eq!(
        QueryCompiler::default().compile(&chain, QueryKind::Push),
        Err(CompilationError::UnknownBinding("nobody".to_string()))
    );
}

#[test]
fn test_lambda_projection() {
    let chain = QueryChain::from_source(QuerySource::of::<Tweet>(SourceKind::Stream)).select(
        Projection::record([ProjectedColumn::new(
            "Upper",
            functions::transform(col("Tags"), "t", functions::ucase(param("t"))),
        )]),
    );

    assert_eq!(
        QueryCompiler::default()
            .compile(&chain, QueryKind::Push)
            .unwrap()
            .text,
        "SELECT TRANSFORM(Tags, (t) => UCASE(t)) AS Upper FROM Tweet EMIT CHANGES;"
    );
}

#[test]
fn test_pull_query_on_table_with_limit() {
    let chain = QueryChain::from_source(QuerySource::of::<Movie>(SourceKind::Table))
        .filter(col("Id").eq(lit(1)))
        .take(1);

    let compiled = QueryCompiler::new(CompilerOptions {
        pluralize_from_items: true,
        ..Default::default()
    })
    .compile(&chain, QueryKind::Pull)
    .unwrap();

    assert_eq!(compiled.text, "SELECT * FROM Movies WHERE Id = 1 LIMIT 1;");
}

#[test]
fn test_insert_uses_column_names_and_escaping() {
    let options = CompilerOptions {
        escaping: IdentifierEscaping::Keywords,
        ..Default::default()
    };
    let ksql = insert_statement(
        &Tweet::shape(),
        &serde_json::json!({
            "Id": 1,
            "Message": "it's, \"quoted\"",
            "IsRobot": false,
            "Amount": 1.25,
            "Tags": ["a"],
            "Select": "s"
        }),
        &InsertProperties::new().entity_name("Tweets"),
        &options,
    )
    .unwrap();

    assert_eq!(
        ksql,
        "INSERT INTO Tweets (Id, Message, IsRobot, Amount, Tags, `Select`) \
         VALUES (1, 'it''s, \"quoted\"', false, 1.25, ARRAY['a'], 's');"
    );
}
