use chrono::Utc;
use orm_metadata_cache::{column_default_via_default, EntitySchema, MetadataError, Model};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceId(pub Uuid);

column_default_via_default!(PriceId);

#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub id: PriceId,
    pub created_at: i64,
    pub asset: String,
    pub price: f64,
}

impl Price {
    pub fn new(id: Uuid, asset: String, price: f64) -> Self {
        Self {
            id: PriceId(id),
            created_at: Utc::now().timestamp_millis(),
            asset,
            price,
        }
    }
}

impl Model for Price {
    fn schema() -> Result<EntitySchema<Self>, MetadataError> {
        EntitySchema::builder()
            .entity()
            .table_in_schema("market", "test_prices")
            .column("id", "price_id", |p: &mut Price| &mut p.id)
            .column("created_at", "created_at_ms", |p: &mut Price| &mut p.created_at)
            .field("asset", |p: &mut Price| &mut p.asset)
            .field("price", |p: &mut Price| &mut p.price)
            .setter("set_asset", |p: &mut Price, v: String| p.asset = v)
            .setter("set_price", |p: &mut Price, v: f64| p.price = v)
            .build()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
}

impl Model for Quote {
    fn schema() -> Result<EntitySchema<Self>, MetadataError> {
        EntitySchema::builder()
            .field("symbol", |q: &mut Quote| &mut q.symbol)
            .field("bid", |q: &mut Quote| &mut q.bid)
            .field("ask", |q: &mut Quote| &mut q.ask)
            .build()
    }
}
