use serde_derive::{Deserialize, Serialize};

pub const WARN_ON_METHOD_COLLISION_DEFAULT: bool = true;
pub const METRICS_NAMESPACE_DEFAULT: &str = "orm_metadata";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Schema used to qualify table names that carry no schema of their own
    #[serde(default)]
    pub default_schema: Option<String>,

    /// Log a warning when two single-argument methods share a name
    #[serde(default = "default_warn_on_method_collision")]
    pub warn_on_method_collision: bool,

    /// Prefix for every metric the registry registers
    #[serde(default = "default_metrics_namespace")]
    pub metrics_namespace: String,
}

fn default_warn_on_method_collision() -> bool {
    WARN_ON_METHOD_COLLISION_DEFAULT
}

fn default_metrics_namespace() -> String {
    METRICS_NAMESPACE_DEFAULT.to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_schema: None,
            warn_on_method_collision: WARN_ON_METHOD_COLLISION_DEFAULT,
            metrics_namespace: METRICS_NAMESPACE_DEFAULT.to_string(),
        }
    }
}

impl RegistryConfig {
    pub fn new(
        default_schema: Option<String>,
        warn_on_method_collision: bool,
        metrics_namespace: String,
    ) -> Self {
        Self {
            default_schema,
            warn_on_method_collision,
            metrics_namespace,
        }
    }

    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    /// Fully qualified metric name under the configured namespace.
    pub fn metric_name(&self, suffix: &str) -> String {
        if self.metrics_namespace.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.metrics_namespace, suffix)
        }
    }
}
