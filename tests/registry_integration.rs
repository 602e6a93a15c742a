use std::sync::Arc;

use num_bigint::BigInt;
use orm_metadata_cache::{
    column_default_via_default, no_column_default, EntitySchema, FieldKind, MetadataError,
    MetadataRegistry, MetadataTable, Model, RegistryConfig, SqlStatement, Value,
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
struct Person {
    id: i32,
    name: String,
}

impl Model for Person {
    fn schema() -> Result<EntitySchema<Self>, MetadataError> {
        EntitySchema::builder()
            .entity()
            .table_in_schema("app", "people")
            .column("id", "person_id", |p: &mut Person| &mut p.id)
            .field("name", |p: &mut Person| &mut p.name)
            .setter("set_id", |p: &mut Person, v: i32| p.id = v)
            .setter("set_name", |p: &mut Person, v: String| p.name = v)
            .build()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Tag(u8);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Token(Uuid);

column_default_via_default!(Tag, Token);

#[derive(Debug)]
struct Everything {
    tiny: i8,
    small: i16,
    int: i32,
    long: i64,
    text: String,
    letter: char,
    single: f32,
    double: f64,
    big: BigInt,
    token: Token,
    tag: Tag,
}

impl Model for Everything {
    fn schema() -> Result<EntitySchema<Self>, MetadataError> {
        EntitySchema::builder()
            .field("tiny", |e: &mut Everything| &mut e.tiny)
            .field("small", |e: &mut Everything| &mut e.small)
            .field("int", |e: &mut Everything| &mut e.int)
            .field("long", |e: &mut Everything| &mut e.long)
            .field("text", |e: &mut Everything| &mut e.text)
            .field("letter", |e: &mut Everything| &mut e.letter)
            .field("single", |e: &mut Everything| &mut e.single)
            .field("double", |e: &mut Everything| &mut e.double)
            .field("big", |e: &mut Everything| &mut e.big)
            .field("token", |e: &mut Everything| &mut e.token)
            .field("tag", |e: &mut Everything| &mut e.tag)
            .build()
    }
}

struct Socket(#[allow(dead_code)] u16);

no_column_default!(Socket);

struct Session {
    user: String,
    socket: Socket,
    retries: u32,
}

impl Model for Session {
    fn schema() -> Result<EntitySchema<Self>, MetadataError> {
        EntitySchema::builder()
            .field("user", |s: &mut Session| &mut s.user)
            .field("socket", |s: &mut Session| &mut s.socket)
            .field("retries", |s: &mut Session| &mut s.retries)
            .build()
    }
}

struct Badge {
    id: i64,
    ident: i64,
}

impl Model for Badge {
    fn schema() -> Result<EntitySchema<Self>, MetadataError> {
        EntitySchema::builder()
            .entity()
            .field("id", |b: &mut Badge| &mut b.id)
            .column("id", "ident", |b: &mut Badge| &mut b.ident)
            .build()
    }
}

fn registry() -> MetadataRegistry {
    MetadataRegistry::new(Arc::new(RegistryConfig::default()), None)
}

#[test]
fn person_table_is_schema_qualified() {
    assert_eq!(registry().table_name::<Person>().unwrap().as_str(), "`app`.`people`");
}

#[test]
fn person_field_columns_honor_overrides() {
    let columns = registry().field_to_column_names::<Person>().unwrap();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns["id"], "person_id");
    assert_eq!(columns["name"], "name");
}

#[test]
fn person_column_resolves_to_field() {
    let registry = registry();
    let by_column = registry.column_to_field::<Person>().unwrap();
    let id = &by_column["person_id"];
    assert_eq!(id.name(), "id");
    assert_eq!(id.kind(), FieldKind::Integer { bits: 32 });
    assert!(!by_column.contains_key("id"));

    let by_name = registry.field_name_to_field::<Person>().unwrap();
    assert_eq!(by_name["id"].as_ref(), id.as_ref());
}

#[test]
fn column_and_field_maps_are_inverse() {
    let registry = registry();
    let columns = registry.field_to_column_names::<Person>().unwrap();
    let by_column = registry.column_to_field::<Person>().unwrap();

    for (field, column) in columns.iter() {
        assert_eq!(by_column[column].name(), field);
    }
    for (column, field) in by_column.iter() {
        assert_eq!(&columns[field.name()], column);
    }
}

#[test]
fn lookups_return_identical_values_on_repeat() {
    let registry = registry();
    assert!(Arc::ptr_eq(
        &registry.table_name::<Person>().unwrap(),
        &registry.table_name::<Person>().unwrap()
    ));
    assert!(Arc::ptr_eq(
        &registry.single_arg_methods::<Person>().unwrap(),
        &registry.single_arg_methods::<Person>().unwrap()
    ));
    assert!(Arc::ptr_eq(
        &registry.column_to_field::<Person>().unwrap(),
        &registry.column_to_field::<Person>().unwrap()
    ));
    assert_eq!(registry.cached_types(), 1);
}

#[test]
fn non_entities_still_expose_field_maps() {
    let registry = registry();
    assert_eq!(registry.table_name::<Everything>().unwrap().as_str(), "`Everything`");
    assert_eq!(registry.field_name_to_field::<Everything>().unwrap().len(), 11);
    assert_eq!(registry.field_to_column_names::<Everything>().unwrap()["big"], "big");
    assert!(matches!(
        registry.column_to_field::<Everything>(),
        Err(MetadataError::NotAnEntity { .. })
    ));
    assert!(!registry.is_cached::<Everything>(MetadataTable::ColumnFields));
}

#[test]
fn reset_assigns_type_defaults() {
    let registry = registry();
    let mut e = Everything {
        tiny: 1,
        small: 2,
        int: 3,
        long: 4,
        text: "hello".to_string(),
        letter: 'q',
        single: 1.5,
        double: 2.5,
        big: BigInt::from(99),
        token: Token(Uuid::new_v4()),
        tag: Tag(5),
    };

    registry.reset_to_defaults(&mut e).unwrap();

    assert_eq!(e.tiny, 0);
    assert_eq!(e.small, 0);
    assert_eq!(e.int, 0);
    assert_eq!(e.long, 0);
    assert_eq!(e.text, " ");
    assert!(!e.text.is_empty());
    assert_eq!(e.letter, ' ');
    assert_eq!(e.single, 0.0);
    assert_eq!(e.double, 0.0);
    assert_eq!(e.big, BigInt::from(0));
    assert_eq!(e.token, Token(Uuid::nil()));
    assert_eq!(e.tag, Tag(0));
}

#[test]
fn reset_stops_at_unconstructible_field() {
    let registry = registry();
    let mut session = Session {
        user: "root".to_string(),
        socket: Socket(22),
        retries: 3,
    };

    match registry.reset_to_defaults(&mut session) {
        Err(MetadataError::Construction { type_name, .. }) => {
            assert!(type_name.ends_with("Socket"))
        }
        other => panic!("expected construction error, got {:?}", other),
    }

    // fields before the failure stay reset, fields after it are untouched
    assert_eq!(session.user, " ");
    assert_eq!(session.retries, 3);
}

#[test]
fn setters_populate_an_entity_from_bound_values() {
    let registry = registry();
    let setters = registry.single_arg_methods::<Person>().unwrap();
    let mut person = Person {
        id: 0,
        name: String::new(),
    };

    setters["set_id"].invoke(&mut person, &[Value::Int(12)]).unwrap();
    setters["set_name"]
        .invoke(&mut person, &[Value::from("ada")])
        .unwrap();

    assert_eq!(
        person,
        Person {
            id: 12,
            name: "ada".to_string()
        }
    );
}

#[test]
fn statement_assembled_from_metadata() {
    let registry = registry();
    let columns = registry.field_to_column_names::<Person>().unwrap();

    let mut stmt = SqlStatement::new();
    stmt.push_sql("SELECT * FROM ")
        .push_sql(&registry.table_name::<Person>().unwrap())
        .push_sql(&format!(" WHERE `{}` = ?", columns["id"]))
        .bind(7);

    assert_eq!(
        stmt.to_string(),
        "Sql: SELECT * FROM `app`.`people` WHERE `person_id` = ?\nvalues: [7]"
    );
}

#[test]
fn repeated_field_declaration_is_rejected_for_every_lookup() {
    let registry = registry();

    match registry.field_to_column_names::<Badge>() {
        Err(MetadataError::DuplicateField { type_name, field }) => {
            assert_eq!(type_name, "Badge");
            assert_eq!(field, "id");
        }
        other => panic!("expected DuplicateField, got {:?}", other),
    }
    assert!(registry.column_to_field::<Badge>().is_err());
    assert!(registry.field_name_to_field::<Badge>().is_err());
    assert!(registry.table_name::<Badge>().is_err());

    let mut badge = Badge { id: 3, ident: 4 };
    assert!(registry.reset_to_defaults(&mut badge).is_err());
    assert_eq!((badge.id, badge.ident), (3, 4));
    assert!(!registry.is_cached::<Badge>(MetadataTable::TypeFields));
    assert_eq!(registry.cached_types(), 0);
}
