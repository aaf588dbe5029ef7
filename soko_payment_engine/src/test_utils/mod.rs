//! Helpers for tests: throwaway databases and an in-memory catalog stub.
#[cfg(feature = "sqlite")]
pub mod prepare_env;

use std::collections::HashMap;

use crate::traits::{CatalogError, CatalogProduct, CatalogVariant, ProductCatalog};

/// In-memory stand-in for the external catalog service.
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    products: HashMap<i64, CatalogProduct>,
    variants: HashMap<i64, CatalogVariant>,
}

impl MemoryCatalog {
    pub fn with_product(mut self, product: CatalogProduct) -> Self {
        self.products.insert(product.id, product);
        self
    }

    pub fn with_variant(mut self, variant: CatalogVariant) -> Self {
        self.variants.insert(variant.id, variant);
        self
    }
}

impl ProductCatalog for MemoryCatalog {
    async fn product(&self, id: i64) -> Result<Option<CatalogProduct>, CatalogError> {
        Ok(self.products.get(&id).cloned())
    }

    async fn variant(&self, id: i64) -> Result<Option<CatalogVariant>, CatalogError> {
        Ok(self.variants.get(&id).cloned())
    }
}
