use dbforge::provider::EngineKind;
use dbforge::schema::{
    CanonicalType, ColumnSpec, ConstraintSpec, DialectImpl, IdentifierMode, IdentitySpec, ReferentialRule,
    SchemaTranslator, TableSchema,
};
use dbforge::ForgeError;

fn ddl(schema: &TableSchema, engine: EngineKind) -> String {
    SchemaTranslator::default()
        .translate(schema, &DialectImpl::for_engine(engine))
        .unwrap()
}

fn customers() -> TableSchema {
    TableSchema::new("Customers")
        .column(ColumnSpec::new("Id", CanonicalType::Int32).identity(IdentitySpec::default()))
        .column(ColumnSpec::new("Name", CanonicalType::String).with_length(80).not_null())
        .column(ColumnSpec::new("Email", CanonicalType::String).with_length(120))
        .constraint(ConstraintSpec::primary_key(["Id"]))
}

#[test]
fn test_single_primary_key_and_column_order() {
    for engine in EngineKind::ALL {
        let text = ddl(&customers(), engine);
        assert_eq!(text.matches("PRIMARY KEY").count(), 1, "{}", text);

        let id = text.find("Id ").unwrap();
        let name = text.find("Name ").unwrap();
        let email = text.find("Email ").unwrap();
        assert!(id < name && name < email, "{}", text);
    }
}

#[test]
fn test_unbounded_string_is_large_text_in_jet() {
    let schema = TableSchema::new("Notes")
        .column(ColumnSpec::new("Body", CanonicalType::String))
        .column(ColumnSpec::new("Title", CanonicalType::String).with_length(1000));
    let text = ddl(&schema, EngineKind::Access);
    assert!(text.contains("Body MEMO"));
    assert!(text.contains("Title TEXT(255)"));
}

#[test]
fn test_max_length_string_bounded_by_default_dialect() {
    let schema = TableSchema::new("Notes").column(ColumnSpec::new("Body", CanonicalType::String).with_length(u32::MAX));
    assert!(ddl(&schema, EngineKind::SqlServer).contains("Body NVARCHAR(4000)"));

    let unbounded = TableSchema::new("Notes").column(ColumnSpec::new("Body", CanonicalType::String));
    assert!(ddl(&unbounded, EngineKind::SqlServer).contains("Body NVARCHAR(MAX)"));
    assert!(ddl(&unbounded, EngineKind::SqlCompact).contains("Body NTEXT"));
}

#[test]
fn test_foreign_key_placement() {
    let schema = TableSchema::new("OrderLines")
        .column(ColumnSpec::new("OrderId", CanonicalType::Int32).not_null())
        .column(ColumnSpec::new("Region", CanonicalType::String).with_length(10).not_null())
        .column(ColumnSpec::new("ProductId", CanonicalType::Int32))
        .constraint(ConstraintSpec::foreign_key(
            ["OrderId", "Region"],
            "Orders",
            ["Id", "Region"],
        ))
        .constraint(ConstraintSpec::foreign_key(["ProductId"], "Products", ["Id"]));

    let text = ddl(&schema, EngineKind::SqlServer);
    assert!(text.contains("ProductId INT REFERENCES Products(Id)"));
    assert!(text.contains("FOREIGN KEY (OrderId, Region) REFERENCES Orders(Id, Region)"));
    assert!(text.contains("OrderId INT NOT NULL,"));
    assert!(!text.contains("Region NVARCHAR(10) NOT NULL REFERENCES"));
    assert!(!text.contains("FOREIGN KEY (ProductId)"));
}

#[test]
fn test_referential_rules_omitted_when_cascade() {
    let cascade = TableSchema::new("Lines")
        .column(ColumnSpec::new("OrderId", CanonicalType::Int32))
        .constraint(ConstraintSpec::foreign_key(["OrderId"], "Orders", ["Id"]).on_delete(ReferentialRule::Cascade));
    let text = ddl(&cascade, EngineKind::SqlServer);
    assert!(!text.contains("ON DELETE"));
    assert!(!text.contains("ON UPDATE"));

    let restricted = TableSchema::new("Lines")
        .column(ColumnSpec::new("OrderId", CanonicalType::Int32))
        .constraint(
            ConstraintSpec::foreign_key(["OrderId"], "Orders", ["Id"])
                .on_delete(ReferentialRule::NoAction)
                .on_update(ReferentialRule::SetNull),
        );
    let text = ddl(&restricted, EngineKind::SqlServer);
    assert!(text.contains("REFERENCES Orders(Id) ON DELETE NO ACTION ON UPDATE SET NULL"));
}

#[test]
fn test_identifier_modes() {
    let schema = TableSchema::new("Order Details")
        .column(ColumnSpec::new("Order Date", CanonicalType::DateTime))
        .column(ColumnSpec::new("Quantity", CanonicalType::Int16));
    let dialect = DialectImpl::for_engine(EngineKind::SqlServer);

    let bracketed = SchemaTranslator::new(IdentifierMode::Bracket)
        .translate(&schema, &dialect)
        .unwrap();
    assert!(bracketed.starts_with("CREATE TABLE [Order Details] ("));
    assert!(bracketed.contains("[Order Date] DATETIME"));
    assert!(bracketed.contains("Quantity SMALLINT"));

    let stripped = SchemaTranslator::new(IdentifierMode::StripSpaces)
        .translate(&schema, &dialect)
        .unwrap();
    assert!(stripped.starts_with("CREATE TABLE OrderDetails ("));
    assert!(stripped.contains("OrderDate DATETIME"));
}

#[test]
fn test_composite_primary_key_is_table_level() {
    let schema = TableSchema::new("Links")
        .column(ColumnSpec::new("A", CanonicalType::Int32).not_null())
        .column(ColumnSpec::new("B", CanonicalType::Int32).not_null())
        .constraint(ConstraintSpec::primary_key(["A", "B"]));
    let text = ddl(&schema, EngineKind::Sqlite);
    assert!(text.ends_with("PRIMARY KEY (A, B)\n)"));
    assert_eq!(text.matches("PRIMARY KEY").count(), 1);
}

#[test]
fn test_unmappable_type_is_schema_error() {
    let schema = TableSchema::new("Big").column(ColumnSpec::new("Total", CanonicalType::Int64));
    let err = SchemaTranslator::default()
        .translate(&schema, &DialectImpl::for_engine(EngineKind::Access))
        .unwrap_err();
    assert!(matches!(err, ForgeError::Schema(_)));
    assert!(err.to_string().contains("Big.Total"));
}

#[test]
fn test_second_primary_key_rejected() {
    let schema = customers().constraint(ConstraintSpec::primary_key(["Name"]));
    let err = SchemaTranslator::default()
        .translate(&schema, &DialectImpl::for_engine(EngineKind::SqlServer))
        .unwrap_err();
    assert!(matches!(err, ForgeError::Schema(_)));
}
