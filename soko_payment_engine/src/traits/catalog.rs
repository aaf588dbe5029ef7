use soko_common::Kobo;
use thiserror::Error;

/// Read-only view of a product as the catalog service reports it at pricing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProduct {
    pub id: i64,
    pub store_id: i64,
    pub name: String,
    pub sku: String,
    pub unit_price: Kobo,
    pub unit_discount_price: Option<Kobo>,
    pub stock: i64,
}

/// A variant narrows a product to a specific colour/size and may override its price and stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogVariant {
    pub id: i64,
    pub product_id: i64,
    pub color: Option<String>,
    pub size: Option<String>,
    pub price_override: Option<Kobo>,
    pub stock: i64,
}

#[derive(Debug, Clone, Error)]
#[error("Catalog service failure: {0}")]
pub struct CatalogError(pub String);

/// The catalog is owned by another service; the engine only ever reads prices and stock through
/// this interface, and only at checkout time. Order items snapshot what was read, so later catalog
/// edits never touch existing orders.
#[allow(async_fn_in_trait)]
pub trait ProductCatalog {
    async fn product(&self, id: i64) -> Result<Option<CatalogProduct>, CatalogError>;

    async fn variant(&self, id: i64) -> Result<Option<CatalogVariant>, CatalogError>;
}
