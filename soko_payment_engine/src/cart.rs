//! Cart aggregation, catalog pricing and checkout assembly.
//!
//! Pricing is a read-only pass over the catalog that produces immutable [`PricedLine`] snapshots;
//! assembly turns those into an [`AssembledOrder`] whose totals already satisfy the grand-total
//! identity. Nothing in this module touches the database.
use std::collections::BTreeMap;

use log::debug;
use soko_common::Kobo;

use crate::{
    config::PlatformConfig,
    db_types::PaymentMethod,
    helpers::new_order_no,
    traits::{AssembledOrder, AssembledStoreOrder, MarketplaceError, ProductCatalog},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub qty: i64,
}

#[derive(Debug, Clone)]
pub struct Cart {
    pub user_id: i64,
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(user_id: i64) -> Self {
        Self { user_id, lines: Vec::new() }
    }

    pub fn with_line(mut self, product_id: i64, variant_id: Option<i64>, qty: i64) -> Self {
        self.lines.push(CartLine { product_id, variant_id, qty });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Prices every line against the catalog, snapshotting names, skus and unit prices so that
    /// later catalog edits cannot rewrite this order. Fails with a validation error on unknown
    /// products, zero quantities or insufficient stock.
    pub async fn price<C: ProductCatalog>(
        &self,
        catalog: &C,
        coupon: Option<&Coupon>,
    ) -> Result<PricedCart, MarketplaceError> {
        if self.is_empty() {
            return Err(MarketplaceError::Validation("cart is empty".to_string()));
        }
        let mut lines = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if line.qty <= 0 {
                return Err(MarketplaceError::Validation(format!(
                    "quantity for product {} must be positive",
                    line.product_id
                )));
            }
            let product = catalog
                .product(line.product_id)
                .await
                .map_err(|e| MarketplaceError::ExternalCollaborator(e.to_string()))?
                .ok_or_else(|| {
                    MarketplaceError::Validation(format!("product {} is not available", line.product_id))
                })?;
            let variant = match line.variant_id {
                Some(vid) => {
                    let variant = catalog
                        .variant(vid)
                        .await
                        .map_err(|e| MarketplaceError::ExternalCollaborator(e.to_string()))?
                        .ok_or_else(|| MarketplaceError::Validation(format!("variant {vid} is not available")))?;
                    if variant.product_id != product.id {
                        return Err(MarketplaceError::Validation(format!(
                            "variant {vid} does not belong to product {}",
                            product.id
                        )));
                    }
                    Some(variant)
                },
                None => None,
            };
            let stock = variant.as_ref().map(|v| v.stock).unwrap_or(product.stock);
            if stock < line.qty {
                return Err(MarketplaceError::Validation(format!(
                    "only {stock} of '{}' left in stock",
                    product.name
                )));
            }
            let unit_price = variant.as_ref().and_then(|v| v.price_override).unwrap_or(product.unit_price);
            let unit_discount_price = product.unit_discount_price.filter(|d| *d < unit_price);
            let effective = unit_discount_price.unwrap_or(unit_price);
            lines.push(PricedLine {
                store_id: product.store_id,
                product_id: product.id,
                variant_id: line.variant_id,
                name: product.name,
                sku: product.sku,
                color: variant.as_ref().and_then(|v| v.color.clone()),
                size: variant.as_ref().and_then(|v| v.size.clone()),
                unit_price,
                unit_discount_price,
                qty: line.qty,
                line_total: effective * line.qty,
            });
        }
        let items_total: Kobo = lines.iter().map(|l| l.line_total).sum();
        let discount = coupon.map(|c| c.discount_on(items_total)).unwrap_or_default();
        debug!("🛒️ Priced cart for user {}: {} lines, items total {items_total}", self.user_id, lines.len());
        Ok(PricedCart { user_id: self.user_id, lines, items_total, discount })
    }
}

/// A discount voucher applied at checkout. Percentages are in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coupon {
    Percent(i64),
    Fixed(Kobo),
}

impl Coupon {
    /// The discount this coupon grants on `items_total`, clamped so it never exceeds the total.
    pub fn discount_on(&self, items_total: Kobo) -> Kobo {
        let raw = match *self {
            Coupon::Percent(bps) => Kobo::from(items_total.value() * bps.clamp(0, 10_000) / 10_000),
            Coupon::Fixed(amount) => amount,
        };
        raw.min(items_total).max(Kobo::from(0))
    }
}

/// One cart line, priced and frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub store_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub name: String,
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub unit_price: Kobo,
    pub unit_discount_price: Option<Kobo>,
    pub qty: i64,
    pub line_total: Kobo,
}

#[derive(Debug, Clone)]
pub struct PricedCart {
    pub user_id: i64,
    pub lines: Vec<PricedLine>,
    pub items_total: Kobo,
    pub discount: Kobo,
}

/// Groups a priced cart into per-store orders and computes the order totals.
///
/// The platform fee is charged on the items total and allocated to stores in proportion to their
/// items subtotal, as is the coupon discount, so that the per-store payables sum exactly to the
/// grand total.
pub fn assemble_order(
    priced: &PricedCart,
    config: &PlatformConfig,
    delivery_address_id: i64,
    payment_method: PaymentMethod,
) -> AssembledOrder {
    let mut by_store: BTreeMap<i64, Vec<PricedLine>> = BTreeMap::new();
    for line in &priced.lines {
        by_store.entry(line.store_id).or_default().push(line.clone());
    }
    let platform_fee = Kobo::from(priced.items_total.value() * config.platform_fee_bps / 10_000);
    let subtotals: Vec<Kobo> =
        by_store.values().map(|lines| lines.iter().map(|l| l.line_total).sum()).collect();
    let fee_shares = allocate_proportionally(platform_fee, &subtotals);
    let discount_shares = allocate_proportionally(priced.discount, &subtotals);

    let mut stores = Vec::with_capacity(by_store.len());
    for (i, (store_id, lines)) in by_store.into_iter().enumerate() {
        let items_subtotal = subtotals[i];
        let shipping_fee = config.shipping_flat_fee;
        let discount = discount_shares[i];
        let subtotal_with_shipping = items_subtotal + shipping_fee + fee_shares[i] - discount;
        stores.push(AssembledStoreOrder { store_id, items_subtotal, shipping_fee, discount, subtotal_with_shipping, lines });
    }
    let shipping_total: Kobo = stores.iter().map(|s| s.shipping_fee).sum();
    let grand_total = priced.items_total + shipping_total + platform_fee - priced.discount;
    AssembledOrder {
        order_no: new_order_no(),
        user_id: priced.user_id,
        delivery_address_id,
        payment_method,
        items_total: priced.items_total,
        shipping_total,
        platform_fee,
        discount_total: priced.discount,
        grand_total,
        stores,
    }
}

/// Splits `total` across `weights` proportionally in integer kobo. The rounding remainder lands
/// on the first share so the parts always sum exactly to `total`.
fn allocate_proportionally(total: Kobo, weights: &[Kobo]) -> Vec<Kobo> {
    if weights.is_empty() {
        return Vec::new();
    }
    let weight_sum: i64 = weights.iter().map(|w| w.value()).sum();
    if weight_sum == 0 {
        let mut shares = vec![Kobo::from(0); weights.len()];
        shares[0] = total;
        return shares;
    }
    let mut shares: Vec<Kobo> =
        weights.iter().map(|w| Kobo::from(total.value() * w.value() / weight_sum)).collect();
    let allocated: i64 = shares.iter().map(|s| s.value()).sum();
    shares[0] = shares[0] + Kobo::from(total.value() - allocated);
    shares
}
