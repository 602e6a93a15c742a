use std::sync::Arc;

use anyhow::Result;
use orm_metadata_cache::{
    metrics::Registrar, MetadataRegistry, RegistryConfig, SqlStatement, Value,
};
use prometheus::Encoder;
use tokio::task;
use uuid::Uuid;

mod model;

use crate::model::{Price, Quote};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let config = load_config();
    let registrar = Arc::new(Registrar::default());
    let registry = Arc::new(MetadataRegistry::new(config, Some(registrar.clone())));

    warm_up(&registry).await?;

    let price = Price::new(Uuid::new_v4(), "SOL".to_string(), 42.58);
    let insert = insert_statement(&registry, &price)?;
    println!("{}", insert);

    println!("Quote table: {}", registry.table_name::<Quote>()?);
    if let Err(e) = registry.column_to_field::<Quote>() {
        println!("Quote has no column mapping: {}", e);
    }

    let mut loaded = price.clone();
    let setters = registry.single_arg_methods::<Price>()?;
    setters["set_asset"].invoke(&mut loaded, &[Value::from("BTC")])?;
    setters["set_price"].invoke(&mut loaded, &[Value::from(61_000.5)])?;
    println!("Loaded via setters: {:?}", loaded);

    registry.reset_to_defaults(&mut loaded)?;
    println!("Reset: {:?}", loaded);

    let mut buffer = Vec::new();
    prometheus::TextEncoder::new().encode(&registrar.registry().gather(), &mut buffer)?;
    println!("{}", String::from_utf8_lossy(&buffer));

    Ok(())
}

fn load_config() -> Arc<RegistryConfig> {
    let mut config = RegistryConfig::default();
    if let Ok(schema) = std::env::var("ORM_DEFAULT_SCHEMA") {
        config = config.with_default_schema(schema);
    }
    Arc::new(config)
}

async fn warm_up(registry: &Arc<MetadataRegistry>) -> Result<()> {
    let prices = {
        let registry = registry.clone();
        task::spawn(async move { registry.warm_up::<Price>() })
    };
    let quotes = {
        let registry = registry.clone();
        task::spawn(async move { registry.warm_up::<Quote>() })
    };

    prices.await??;
    quotes.await??;

    log::info!("Warmed up metadata for {} types", registry.cached_types());
    Ok(())
}

fn insert_statement(registry: &MetadataRegistry, price: &Price) -> Result<SqlStatement> {
    let fields = registry.type_fields::<Price>()?;
    let columns: Vec<String> = fields
        .iter()
        .map(|field| format!("`{}`", field.column_name()))
        .collect();
    let placeholders = vec!["?"; columns.len()].join(", ");

    let mut stmt = SqlStatement::new();
    stmt.push_sql("INSERT INTO ")
        .push_sql(&registry.table_name::<Price>()?)
        .push_sql(&format!(" ({}) VALUES ({})", columns.join(", "), placeholders))
        .bind(price.id.0.to_string())
        .bind(price.created_at)
        .bind(price.asset.as_str())
        .bind(price.price);

    Ok(stmt)
}

