use prometheus::{IntCounterVec, IntGaugeVec, Opts};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),

    #[error("metric {0:?} has no kind")]
    MissingKind(String),
}

#[derive(Debug, Default, Clone)]
pub enum Kind {
    #[default]
    Default,
    IntGaugeVec,
    IntCounterVec,
}

#[derive(Debug, Default, Clone)]
pub struct MetricConfig<'a> {
    pub kind: Kind,
    pub name: &'a str,
    pub help: &'a str,
    pub label_names: &'a [&'a str],
}

pub type SharedRegistrar = Arc<Registrar>;

/// An abstracted metrics registrar for Prometheus.
#[derive(Clone, Default)]
pub struct Registrar {
    registry: prometheus::Registry,
    int_counters_vecs: Arc<RwLock<HashMap<String, IntCounterVec>>>,
    int_gauges_vecs: Arc<RwLock<HashMap<String, IntGaugeVec>>>,
}

impl std::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrar")
            .field(
                "int_counters_vecs",
                &format!("{:?}", self.int_counters_vecs),
            )
            .field("int_gauges_vecs", &format!("{:?}", self.int_gauges_vecs))
            .finish()
    }
}

pub trait Registry {
    fn with_metric_configs<'a>(&self, metrics: &'a [MetricConfig<'a>]) -> Result<(), Error>;
    fn with_metric_config<'a>(&self, metric: &'a MetricConfig<'a>) -> Result<(), Error>;
}

impl Registry for Registrar {
    fn with_metric_config<'a>(&self, metric: &'a MetricConfig<'a>) -> Result<(), Error> {
        log::info!(
            "Attempting to register metric with name {:?} and labels {:?}",
            metric.name,
            metric.label_names
        );
        match &metric.kind {
            Kind::Default => Err(Error::MissingKind(metric.name.to_string())),
            Kind::IntGaugeVec => {
                let gauge =
                    IntGaugeVec::new(Opts::new(metric.name, metric.help), metric.label_names)?;
                match self.registry.register(Box::new(gauge.clone())) {
                    Ok(()) => {
                        self.int_gauges_vecs
                            .write()
                            .unwrap_or_else(PoisonError::into_inner)
                            .insert(metric.name.to_string(), gauge);
                        Ok(())
                    }
                    Err(e) => Self::already_registered(metric.name, e),
                }
            }
            Kind::IntCounterVec => {
                let counter =
                    IntCounterVec::new(Opts::new(metric.name, metric.help), metric.label_names)?;
                match self.registry.register(Box::new(counter.clone())) {
                    Ok(()) => {
                        self.int_counters_vecs
                            .write()
                            .unwrap_or_else(PoisonError::into_inner)
                            .insert(metric.name.to_string(), counter);
                        Ok(())
                    }
                    Err(e) => Self::already_registered(metric.name, e),
                }
            }
        }
    }

    fn with_metric_configs<'a>(&self, metrics: &'a [MetricConfig<'a>]) -> Result<(), Error> {
        for metric in metrics {
            self.with_metric_config(metric)?;
        }
        Ok(())
    }
}

impl Registrar {
    pub fn new(registry: prometheus::Registry) -> Self {
        Self {
            registry,
            ..Default::default()
        }
    }

    pub fn registry(&self) -> &prometheus::Registry {
        &self.registry
    }

    fn already_registered(name: &str, e: prometheus::Error) -> Result<(), Error> {
        if let prometheus::Error::AlreadyReg = e {
            log::info!("Metric {:?} is already registered.", name);
            Ok(())
        } else {
            log::error!("Failed to register metric {:?}. {:?}", name, e);
            Err(Error::Prometheus(e))
        }
    }

    pub fn inc_int_counter_vec_mut(&self, key: &str, labels: &[&str]) {
        let counters = self
            .int_counters_vecs
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let counter = match counters.get(key) {
            Some(r) => r,
            None => return,
        };

        counter.with_label_values(labels).inc()
    }

    pub fn set_int_gauge_vec_mut(&self, key: &str, labels: &[&str], value: i64) {
        let gauges = self
            .int_gauges_vecs
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let gauge = match gauges.get(key) {
            Some(r) => r,
            None => return,
        };

        gauge.with_label_values(labels).set(value)
    }

    /// Current value of a labelled counter, `None` when the counter was never registered.
    pub fn int_counter_vec_value(&self, key: &str, labels: &[&str]) -> Option<u64> {
        let counters = self
            .int_counters_vecs
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        counters
            .get(key)
            .map(|counter| counter.with_label_values(labels).get())
    }

    pub fn int_gauge_vec_value(&self, key: &str, labels: &[&str]) -> Option<i64> {
        let gauges = self
            .int_gauges_vecs
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        gauges.get(key).map(|gauge| gauge.with_label_values(labels).get())
    }
}
