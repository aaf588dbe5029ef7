//! Platform-level pricing knobs, read from the environment with sensible defaults.
use std::env;

use log::info;
use soko_common::{parse_boolean_flag, Kobo};

const DEFAULT_PLATFORM_FEE_BPS: i64 = 150;
const DEFAULT_SHIPPING_FLAT_FEE: i64 = 1_000;

#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Platform fee in basis points of the order's items total.
    pub platform_fee_bps: i64,
    /// Flat shipping fee charged per store order.
    pub shipping_flat_fee: Kobo,
    /// When set, sellers must present the buyer's delivery code before escrow is released to them.
    pub require_delivery_code: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            platform_fee_bps: DEFAULT_PLATFORM_FEE_BPS,
            shipping_flat_fee: Kobo::from(DEFAULT_SHIPPING_FLAT_FEE),
            require_delivery_code: true,
        }
    }
}

impl PlatformConfig {
    pub fn from_env() -> Self {
        let platform_fee_bps = env::var("SOKO_PLATFORM_FEE_BPS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_PLATFORM_FEE_BPS);
        let shipping_flat_fee = env::var("SOKO_SHIPPING_FLAT_FEE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .map(Kobo::from)
            .unwrap_or_else(|| Kobo::from(DEFAULT_SHIPPING_FLAT_FEE));
        let require_delivery_code = parse_boolean_flag(env::var("SOKO_REQUIRE_DELIVERY_CODE").ok(), true);
        let config = Self { platform_fee_bps, shipping_flat_fee, require_delivery_code };
        info!("Platform config: {config:?}");
        config
    }
}
