use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::config::RegistryConfig;
use crate::metrics::{self, Kind, MetricConfig, Registry, SharedRegistrar};
use crate::schema::{FieldDescriptor, MethodDescriptor, TableOverride};
use crate::traits::Model;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("{type_name} is not a mapped entity")]
    NotAnEntity { type_name: String },

    #[error("{type_name} declares field {field:?} more than once")]
    DuplicateField { type_name: String, field: String },

    #[error("{type_name} maps more than one field to column {column:?}")]
    DuplicateColumn { type_name: String, column: String },

    #[error("Cannot construct default {type_name}: {reason}")]
    Construction {
        type_name: &'static str,
        reason: String,
    },

    #[error("Method {method} takes {expected} argument(s), got {found}")]
    Arity {
        method: String,
        expected: usize,
        found: usize,
    },

    #[error("Expected {expected} value, found {found}")]
    ValueType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Metrics error: {0}")]
    Metrics(#[from] metrics::Error),
}

impl MetadataError {
    fn label(&self) -> &'static str {
        match self {
            Self::NotAnEntity { .. } => "not_an_entity",
            Self::DuplicateField { .. } => "duplicate_field",
            Self::DuplicateColumn { .. } => "duplicate_column",
            Self::Construction { .. } => "construction",
            Self::Arity { .. } => "arity",
            Self::ValueType { .. } => "value_type",
            Self::Metrics(_) => "metrics",
        }
    }
}

/// The per-type tables held by a [`MetadataRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataTable {
    TypeFields,
    FieldColumns,
    TableName,
    ColumnFields,
    FieldNames,
    SingleArgMethods,
}

impl MetadataTable {
    pub const ALL: [MetadataTable; 6] = [
        MetadataTable::TypeFields,
        MetadataTable::FieldColumns,
        MetadataTable::TableName,
        MetadataTable::ColumnFields,
        MetadataTable::FieldNames,
        MetadataTable::SingleArgMethods,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataTable::TypeFields => "type_fields",
            MetadataTable::FieldColumns => "field_columns",
            MetadataTable::TableName => "table_name",
            MetadataTable::ColumnFields => "column_fields",
            MetadataTable::FieldNames => "field_names",
            MetadataTable::SingleArgMethods => "single_arg_methods",
        }
    }
}

pub type FieldMap<T> = HashMap<String, Arc<FieldDescriptor<T>>>;
pub type MethodMap<T> = HashMap<String, Arc<MethodDescriptor<T>>>;

/// Result of the one-time schema scan for a type.
struct ScannedSchema<T> {
    type_name: String,
    table: Option<TableOverride>,
    mapped: bool,
    fields: Arc<Vec<Arc<FieldDescriptor<T>>>>,
    methods: Vec<Arc<MethodDescriptor<T>>>,
}

type Slot = Arc<dyn Any + Send + Sync>;

#[derive(Debug)]
struct MetricNames {
    lookups: String,
    scans: String,
    errors: String,
    cached: String,
}

impl MetricNames {
    fn new(config: &RegistryConfig) -> Self {
        Self {
            lookups: config.metric_name("lookups_total"),
            scans: config.metric_name("scans_total"),
            errors: config.metric_name("errors_total"),
            cached: config.metric_name("cached_types"),
        }
    }
}

/// Memoized entity metadata, keyed by Rust type.
///
/// Each table is populated lazily on the first lookup for a type. Racing
/// first lookups may each compute the entry; the first one stored is kept and
/// every caller gets that value. Entries are never evicted.
pub struct MetadataRegistry {
    config: Arc<RegistryConfig>,
    metrics: Option<SharedRegistrar>,
    metric_names: MetricNames,
    type_fields: DashMap<TypeId, Slot>,
    field_columns: DashMap<TypeId, Slot>,
    table_names: DashMap<TypeId, Slot>,
    column_fields: DashMap<TypeId, Slot>,
    field_names: DashMap<TypeId, Slot>,
    single_arg_methods: DashMap<TypeId, Slot>,
}

impl MetadataRegistry {
    pub fn new(config: Arc<RegistryConfig>, metrics: Option<SharedRegistrar>) -> Self {
        let metric_names = MetricNames::new(&config);

        if let Some(metrics_ref) = &metrics {
            if let Err(e) = Self::register_metrics(metrics_ref, &metric_names) {
                log::error!("Failed to register metadata registry metrics: {}", e);
            }
        }

        log::info!(
            "Metadata registry created [default schema: {:?}]",
            config.default_schema
        );

        Self {
            config,
            metrics,
            metric_names,
            type_fields: DashMap::new(),
            field_columns: DashMap::new(),
            table_names: DashMap::new(),
            column_fields: DashMap::new(),
            field_names: DashMap::new(),
            single_arg_methods: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Declared fields of `T` in declaration order.
    pub fn type_fields<T: Model>(
        &self,
    ) -> Result<Arc<Vec<Arc<FieldDescriptor<T>>>>, MetadataError> {
        let schema = match self.cached::<T, ScannedSchema<T>>(MetadataTable::TypeFields) {
            Some(hit) => hit,
            None => self.scanned::<T>()?,
        };
        Ok(schema.fields.clone())
    }

    /// Field name to column name for every declared field of `T`.
    pub fn field_to_column_names<T: Model>(
        &self,
    ) -> Result<Arc<HashMap<String, String>>, MetadataError> {
        if let Some(hit) = self.cached::<T, _>(MetadataTable::FieldColumns) {
            return Ok(hit);
        }

        let schema = self.scanned::<T>()?;
        let columns = schema
            .fields
            .iter()
            .map(|field| (field.name().to_string(), field.column_name().to_string()))
            .collect::<HashMap<_, _>>();

        Ok(self.store::<T, _>(MetadataTable::FieldColumns, columns))
    }

    /// Backtick-quoted table identifier for `T`, schema-qualified when a
    /// schema is known.
    pub fn table_name<T: Model>(&self) -> Result<Arc<String>, MetadataError> {
        if let Some(hit) = self.cached::<T, _>(MetadataTable::TableName) {
            return Ok(hit);
        }

        let schema = self.scanned::<T>()?;
        let default_schema = self.config.default_schema.clone();
        let (name, qualifier) = match &schema.table {
            Some(table) => (table.name.clone(), table.schema.clone().or(default_schema)),
            None => (schema.type_name.clone(), default_schema),
        };

        let table = match qualifier {
            Some(qualifier) => format!(
                "{}.{}",
                quote_identifier(&qualifier),
                quote_identifier(&name)
            ),
            None => quote_identifier(&name),
        };

        Ok(self.store::<T, _>(MetadataTable::TableName, table))
    }

    /// Column name to field for a mapped entity.
    ///
    /// Fails with [`MetadataError::NotAnEntity`] when `T` is not marked as an
    /// entity; nothing is cached in that case.
    pub fn column_to_field<T: Model>(&self) -> Result<Arc<FieldMap<T>>, MetadataError> {
        if let Some(hit) = self.cached::<T, _>(MetadataTable::ColumnFields) {
            return Ok(hit);
        }

        let schema = self.scanned::<T>()?;
        if !schema.mapped {
            log::error!(
                "Column mapping requested for {}, which is not a mapped entity",
                schema.type_name
            );
            let e = MetadataError::NotAnEntity {
                type_name: schema.type_name.clone(),
            };
            self.record_error(&e);
            return Err(e);
        }

        let fields = schema
            .fields
            .iter()
            .map(|field| (field.column_name().to_string(), field.clone()))
            .collect::<FieldMap<T>>();

        Ok(self.store::<T, _>(MetadataTable::ColumnFields, fields))
    }

    /// Field name to field for every declared field of `T`, entity or not.
    pub fn field_name_to_field<T: Model>(&self) -> Result<Arc<FieldMap<T>>, MetadataError> {
        if let Some(hit) = self.cached::<T, _>(MetadataTable::FieldNames) {
            return Ok(hit);
        }

        let schema = self.scanned::<T>()?;
        let fields = schema
            .fields
            .iter()
            .map(|field| (field.name().to_string(), field.clone()))
            .collect::<FieldMap<T>>();

        Ok(self.store::<T, _>(MetadataTable::FieldNames, fields))
    }

    /// Method name to method for every single-argument method of `T`.
    ///
    /// When several single-argument methods share a name the last declared
    /// one is kept. Which overload a caller wanted is not knowable here.
    pub fn single_arg_methods<T: Model>(&self) -> Result<Arc<MethodMap<T>>, MetadataError> {
        if let Some(hit) = self.cached::<T, _>(MetadataTable::SingleArgMethods) {
            return Ok(hit);
        }

        let schema = self.scanned::<T>()?;
        let mut methods = MethodMap::<T>::new();
        for method in schema.methods.iter().filter(|m| m.arity() == 1) {
            let replaced = methods.insert(method.name().to_string(), method.clone());
            if replaced.is_some() && self.config.warn_on_method_collision {
                log::warn!(
                    "{} declares several single-argument methods named {:?}, keeping the last",
                    schema.type_name,
                    method.name()
                );
            }
        }

        Ok(self.store::<T, _>(MetadataTable::SingleArgMethods, methods))
    }

    /// Assigns every declared field of `instance` its canonical blank value,
    /// in declaration order.
    ///
    /// Stops at the first field whose type cannot be blank-constructed; fields
    /// before it have already been reset.
    pub fn reset_to_defaults<T: Model>(&self, instance: &mut T) -> Result<(), MetadataError> {
        let schema = self.scanned::<T>()?;
        let fields = &schema.fields;

        for (i, field) in fields.iter().enumerate() {
            if let Err(e) = field.reset(instance) {
                log::warn!(
                    "Reset of {} stopped at field {:?} ({}/{} fields reset): {}",
                    std::any::type_name::<T>(),
                    field.name(),
                    i,
                    fields.len(),
                    e
                );
                self.record_error(&e);
                return Err(e);
            }
        }

        Ok(())
    }

    /// Populates every table for `T` ahead of first use.
    pub fn warm_up<T: Model>(&self) -> Result<(), MetadataError> {
        let schema = self.scanned::<T>()?;
        self.field_to_column_names::<T>()?;
        self.table_name::<T>()?;
        self.field_name_to_field::<T>()?;
        self.single_arg_methods::<T>()?;
        if schema.mapped {
            self.column_to_field::<T>()?;
        }

        log::debug!("Metadata for {} warmed up", schema.type_name);
        Ok(())
    }

    pub fn is_cached<T: Model>(&self, table: MetadataTable) -> bool {
        self.slots(table).contains_key(&TypeId::of::<T>())
    }

    /// Number of types whose schema has been scanned.
    pub fn cached_types(&self) -> usize {
        self.type_fields.len()
    }

    /// Schema of `T`, scanned on first use. Internal accesses are not
    /// counted as lookups.
    fn scanned<T: Model>(&self) -> Result<Arc<ScannedSchema<T>>, MetadataError> {
        if let Some(hit) = self.slot::<T, _>(MetadataTable::TypeFields) {
            return Ok(hit);
        }

        let schema = match T::schema() {
            Ok(schema) => schema,
            Err(e) => {
                log::error!(
                    "Rejected schema of {}: {}",
                    std::any::type_name::<T>(),
                    e
                );
                self.record_error(&e);
                return Err(e);
            }
        };
        let type_name = schema.type_name().to_string();
        let table = schema.table().cloned();
        let mapped = schema.is_mapped();
        let (fields, methods) = schema.into_parts();

        let scanned = ScannedSchema {
            type_name,
            table,
            mapped,
            fields: Arc::new(fields.into_iter().map(Arc::new).collect()),
            methods: methods.into_iter().map(Arc::new).collect(),
        };

        Ok(self.store::<T, _>(MetadataTable::TypeFields, scanned))
    }

    fn slots(&self, table: MetadataTable) -> &DashMap<TypeId, Slot> {
        match table {
            MetadataTable::TypeFields => &self.type_fields,
            MetadataTable::FieldColumns => &self.field_columns,
            MetadataTable::TableName => &self.table_names,
            MetadataTable::ColumnFields => &self.column_fields,
            MetadataTable::FieldNames => &self.field_names,
            MetadataTable::SingleArgMethods => &self.single_arg_methods,
        }
    }

    fn slot<T: Model, V: Any + Send + Sync>(&self, table: MetadataTable) -> Option<Arc<V>> {
        self.slots(table)
            .get(&TypeId::of::<T>())
            .map(|entry| Self::downcast(entry.value().clone()))
    }

    /// Cached entry of `table` for `T`, counting the lookup as a hit or miss.
    fn cached<T: Model, V: Any + Send + Sync>(&self, table: MetadataTable) -> Option<Arc<V>> {
        let hit = self.slot::<T, V>(table);
        self.record_lookup(table, if hit.is_some() { "hit" } else { "miss" });
        hit
    }

    /// Inserts a freshly computed entry unless a racing caller stored one
    /// first, and returns whichever value the table now holds.
    fn store<T: Model, V: Any + Send + Sync>(&self, table: MetadataTable, value: V) -> Arc<V> {
        log::debug!(
            "Scanned {} for {}",
            table.as_str(),
            std::any::type_name::<T>()
        );

        let slots = self.slots(table);
        let fresh: Slot = Arc::new(value);
        let stored = slots.entry(TypeId::of::<T>()).or_insert(fresh).value().clone();

        if let Some(metrics) = &self.metrics {
            metrics.inc_int_counter_vec_mut(&self.metric_names.scans, &[table.as_str()]);
            metrics.set_int_gauge_vec_mut(
                &self.metric_names.cached,
                &[table.as_str()],
                slots.len() as i64,
            );
        }

        Self::downcast(stored)
    }

    fn downcast<V: Any + Send + Sync>(slot: Slot) -> Arc<V> {
        slot.downcast::<V>()
            .expect("metadata slot keyed by TypeId holds that type's value")
    }

    fn record_lookup(&self, table: MetadataTable, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_int_counter_vec_mut(&self.metric_names.lookups, &[table.as_str(), result]);
        }
    }

    fn record_error(&self, error: &MetadataError) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_int_counter_vec_mut(&self.metric_names.errors, &[error.label()]);
        }
    }

    fn register_metrics(
        metrics: &SharedRegistrar,
        names: &MetricNames,
    ) -> Result<(), metrics::Error> {
        let metric_configs = [
            MetricConfig {
                kind: Kind::IntCounterVec,
                name: &names.lookups,
                help: "Total no. of metadata lookups",
                label_names: &["table", "result"],
            },
            MetricConfig {
                kind: Kind::IntCounterVec,
                name: &names.scans,
                help: "Total no. of metadata table populations",
                label_names: &["table"],
            },
            MetricConfig {
                kind: Kind::IntCounterVec,
                name: &names.errors,
                help: "Total no. of metadata errors",
                label_names: &["kind"],
            },
            MetricConfig {
                kind: Kind::IntGaugeVec,
                name: &names.cached,
                help: "Current no. of types cached per table",
                label_names: &["table"],
            },
        ];

        metrics.with_metric_configs(&metric_configs)
    }
}

impl fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .field("cached_types", &self.type_fields.len())
            .finish()
    }
}

/// Backtick-quotes an identifier, doubling any embedded backtick.
pub fn quote_identifier(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}
