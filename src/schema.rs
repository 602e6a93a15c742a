use std::fmt;
use std::sync::Arc;

use crate::defaults::ColumnDefault;
use crate::registry::MetadataError;
use crate::sql::{FromValue, Value};

/// Storage class of a mapped field, derived from its Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Integer { bits: u32 },
    Float { bits: u32 },
    Text,
    Char,
    BigInt,
    Other,
}

/// Explicit table identity for an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOverride {
    pub name: String,
    pub schema: Option<String>,
}

type ResetFn<T> = dyn Fn(&mut T) -> Result<(), MetadataError> + Send + Sync;
type InvokeFn<T> = dyn Fn(&mut T, &[Value]) -> Result<(), MetadataError> + Send + Sync;

pub struct FieldDescriptor<T> {
    name: String,
    column: Option<String>,
    kind: FieldKind,
    type_name: &'static str,
    reset: Arc<ResetFn<T>>,
}

impl<T> FieldDescriptor<T> {
    pub fn new<V>(
        name: impl Into<String>,
        column: Option<String>,
        accessor: fn(&mut T) -> &mut V,
    ) -> Self
    where
        V: ColumnDefault + 'static,
        T: 'static,
    {
        Self {
            name: name.into(),
            column,
            kind: V::KIND,
            type_name: std::any::type_name::<V>(),
            reset: Arc::new(move |target: &mut T| -> Result<(), MetadataError> {
                *accessor(target) = V::column_default()?;
                Ok(())
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column override, if one was declared.
    pub fn column_override(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// Database column backing this field: the override, else the field name.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Overwrites this field on `target` with its type's canonical blank value.
    pub fn reset(&self, target: &mut T) -> Result<(), MetadataError> {
        (self.reset)(target)
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .finish()
    }
}

impl<T> PartialEq for FieldDescriptor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.column == other.column
            && self.kind == other.kind
            && self.type_name == other.type_name
    }
}

pub struct MethodDescriptor<T> {
    name: String,
    arity: usize,
    invoke: Arc<InvokeFn<T>>,
}

impl<T> MethodDescriptor<T> {
    pub fn new<F>(name: impl Into<String>, arity: usize, f: F) -> Self
    where
        F: Fn(&mut T, &[Value]) -> Result<(), MetadataError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            invoke: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn invoke(&self, target: &mut T, args: &[Value]) -> Result<(), MetadataError> {
        if args.len() != self.arity {
            return Err(MetadataError::Arity {
                method: self.name.clone(),
                expected: self.arity,
                found: args.len(),
            });
        }
        (self.invoke)(target, args)
    }
}

impl<T> fmt::Debug for MethodDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Registration-time description of an entity: table identity, fields and
/// callable methods, in declaration order.
pub struct EntitySchema<T> {
    type_name: String,
    table: Option<TableOverride>,
    mapped: bool,
    fields: Vec<FieldDescriptor<T>>,
    methods: Vec<MethodDescriptor<T>>,
}

impl<T: 'static> EntitySchema<T> {
    pub fn builder() -> EntitySchemaBuilder<T> {
        EntitySchemaBuilder {
            error: None,
            schema: EntitySchema {
                type_name: simple_type_name(std::any::type_name::<T>()).to_string(),
                table: None,
                mapped: false,
                fields: Vec::new(),
                methods: Vec::new(),
            },
        }
    }
}

impl<T> EntitySchema<T> {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table(&self) -> Option<&TableOverride> {
        self.table.as_ref()
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    pub fn methods(&self) -> &[MethodDescriptor<T>] {
        &self.methods
    }

    pub(crate) fn into_parts(self) -> (Vec<FieldDescriptor<T>>, Vec<MethodDescriptor<T>>) {
        (self.fields, self.methods)
    }
}

impl<T> fmt::Debug for EntitySchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .field("mapped", &self.mapped)
            .field("fields", &self.fields)
            .field("methods", &self.methods)
            .finish()
    }
}

pub struct EntitySchemaBuilder<T> {
    schema: EntitySchema<T>,
    error: Option<MetadataError>,
}

impl<T: 'static> EntitySchemaBuilder<T> {
    /// Marks the type as a mapped entity.
    pub fn entity(mut self) -> Self {
        self.schema.mapped = true;
        self
    }

    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.schema.type_name = name.into();
        self
    }

    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.schema.table = Some(TableOverride {
            name: name.into(),
            schema: None,
        });
        self
    }

    pub fn table_in_schema(mut self, schema: impl Into<String>, name: impl Into<String>) -> Self {
        self.schema.table = Some(TableOverride {
            name: name.into(),
            schema: Some(schema.into()),
        });
        self
    }

    pub fn field<V>(self, name: impl Into<String>, accessor: fn(&mut T) -> &mut V) -> Self
    where
        V: ColumnDefault + 'static,
    {
        self.push_field(FieldDescriptor::new(name, None, accessor))
    }

    /// Field stored under a column name that differs from the field name.
    pub fn column<V>(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        accessor: fn(&mut T) -> &mut V,
    ) -> Self
    where
        V: ColumnDefault + 'static,
    {
        self.push_field(FieldDescriptor::new(name, Some(column.into()), accessor))
    }

    /// Field names and column names must each be unique within an entity,
    /// otherwise the field and column maps stop being inverses. The first
    /// clash is kept and reported by [`build`](Self::build).
    fn push_field(mut self, field: FieldDescriptor<T>) -> Self {
        if self.error.is_none() {
            let fields = &self.schema.fields;
            if fields.iter().any(|f| f.name() == field.name()) {
                self.error = Some(MetadataError::DuplicateField {
                    type_name: self.schema.type_name.clone(),
                    field: field.name().to_string(),
                });
            } else if fields.iter().any(|f| f.column_name() == field.column_name()) {
                self.error = Some(MetadataError::DuplicateColumn {
                    type_name: self.schema.type_name.clone(),
                    column: field.column_name().to_string(),
                });
            }
        }
        self.schema.fields.push(field);
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, arity: usize, f: F) -> Self
    where
        F: Fn(&mut T, &[Value]) -> Result<(), MetadataError> + Send + Sync + 'static,
    {
        self.schema.methods.push(MethodDescriptor::new(name, arity, f));
        self
    }

    /// Single-argument method converting its argument with [`FromValue`].
    pub fn setter<V>(self, name: impl Into<String>, setter: fn(&mut T, V)) -> Self
    where
        V: FromValue + 'static,
    {
        self.method(name, 1, move |target: &mut T, args: &[Value]| {
            let value = V::from_value(args[0].clone())?;
            setter(target, value);
            Ok(())
        })
    }

    pub fn build(self) -> Result<EntitySchema<T>, MetadataError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.schema),
        }
    }
}

/// Strips module path and generic arguments: `app::model::Person<u8>` -> `Person`.
pub fn simple_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Account {
        id: i64,
        owner: String,
        balance: f64,
    }

    fn account_schema() -> EntitySchema<Account> {
        EntitySchema::builder()
            .entity()
            .table("accounts")
            .column("id", "account_id", |a: &mut Account| &mut a.id)
            .field("owner", |a: &mut Account| &mut a.owner)
            .field("balance", |a: &mut Account| &mut a.balance)
            .setter("set_owner", |a: &mut Account, v: String| a.owner = v)
            .method("transfer", 2, |_: &mut Account, _: &[Value]| Ok(()))
            .build()
            .unwrap()
    }

    #[test]
    fn builder_keeps_declaration_order() {
        let schema = account_schema();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, ["id", "owner", "balance"]);
        assert_eq!(schema.type_name(), "Account");
        assert!(schema.is_mapped());
        assert_eq!(schema.table().map(|t| t.name.as_str()), Some("accounts"));
    }

    #[test]
    fn column_name_prefers_override() {
        let schema = account_schema();
        assert_eq!(schema.fields()[0].column_name(), "account_id");
        assert_eq!(schema.fields()[0].column_override(), Some("account_id"));
        assert_eq!(schema.fields()[1].column_name(), "owner");
        assert_eq!(schema.fields()[1].column_override(), None);
    }

    #[test]
    fn field_kinds_follow_rust_types() {
        let schema = account_schema();
        assert_eq!(schema.fields()[0].kind(), FieldKind::Integer { bits: 64 });
        assert_eq!(schema.fields()[1].kind(), FieldKind::Text);
        assert_eq!(schema.fields()[2].kind(), FieldKind::Float { bits: 64 });
    }

    #[test]
    fn field_reset_writes_blank_value() {
        let schema = account_schema();
        let mut account = Account {
            id: 9,
            owner: "ann".into(),
            balance: 3.5,
        };
        schema.fields()[1].reset(&mut account).unwrap();
        assert_eq!(account.owner, " ");
        assert_eq!(account.id, 9);
    }

    #[test]
    fn setter_converts_and_checks_arity() {
        let schema = account_schema();
        let setter = &schema.methods()[0];
        let mut account = Account::default();

        setter
            .invoke(&mut account, &[Value::Text("zoe".into())])
            .unwrap();
        assert_eq!(account.owner, "zoe");

        assert!(matches!(
            setter.invoke(&mut account, &[]),
            Err(MetadataError::Arity {
                expected: 1,
                found: 0,
                ..
            })
        ));
        assert!(matches!(
            setter.invoke(&mut account, &[Value::Int(1)]),
            Err(MetadataError::ValueType { .. })
        ));
    }

    #[test]
    fn repeated_field_name_is_rejected() {
        let err = EntitySchema::builder()
            .field("id", |a: &mut Account| &mut a.id)
            .column("id", "ident", |a: &mut Account| &mut a.balance)
            .build()
            .unwrap_err();
        match err {
            MetadataError::DuplicateField { type_name, field } => {
                assert_eq!(type_name, "Account");
                assert_eq!(field, "id");
            }
            other => panic!("expected DuplicateField, got {:?}", other),
        }
    }

    #[test]
    fn shared_column_name_is_rejected() {
        let err = EntitySchema::builder()
            .column("id", "owner", |a: &mut Account| &mut a.id)
            .field("owner", |a: &mut Account| &mut a.owner)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            MetadataError::DuplicateColumn { ref column, .. } if column == "owner"
        ));
    }

    #[test]
    fn first_clash_is_the_one_reported() {
        let err = EntitySchema::builder()
            .field("owner", |a: &mut Account| &mut a.owner)
            .column("balance", "owner", |a: &mut Account| &mut a.balance)
            .field("balance", |a: &mut Account| &mut a.balance)
            .build()
            .unwrap_err();
        assert!(matches!(err, MetadataError::DuplicateColumn { .. }));
    }

    #[test]
    fn simple_names_drop_paths_and_generics() {
        assert_eq!(simple_type_name("app::model::Person"), "Person");
        assert_eq!(simple_type_name("Wrapper<app::Inner>"), "Wrapper");
        assert_eq!(simple_type_name("Plain"), "Plain");
    }
}
