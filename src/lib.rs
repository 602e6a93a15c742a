pub mod config;
pub mod defaults;
pub mod metrics;
pub mod registry;
pub mod schema;
pub mod sql;
pub mod traits;

pub use config::RegistryConfig;
pub use defaults::ColumnDefault;
pub use registry::{MetadataError, MetadataRegistry, MetadataTable};
pub use schema::{EntitySchema, FieldDescriptor, FieldKind, MethodDescriptor, TableOverride};
pub use sql::{FromValue, SqlStatement, Value};
pub use traits::Model;
