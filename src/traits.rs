use crate::registry::MetadataError;
use crate::schema::EntitySchema;

/// A type whose persistence metadata the registry can describe.
///
/// `schema()` is called at most once per registry for each implementing type;
/// every later lookup is served from the registry's cache. A rejected schema
/// is not cached and fails every lookup of the type.
pub trait Model: Sized + Send + Sync + 'static {
    fn schema() -> Result<EntitySchema<Self>, MetadataError>;
}
