use chrono::Utc;
use rand::Rng;

/// Generates a prefix-tagged, time-ordered transaction id, e.g. `WD-1722980000-483920`.
///
/// The timestamp keeps ids sortable for support staff; the random suffix disambiguates ids minted
/// in the same second. Uniqueness is ultimately enforced by the database constraint.
pub fn new_tx_id(prefix: &str) -> String {
    let ts = Utc::now().timestamp();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{prefix}-{ts}-{suffix:06}")
}

/// Generates a public order number.
pub fn new_order_no() -> String {
    new_tx_id("ORD")
}

/// Generates the reference handed to the payout provider with a withdrawal.
pub fn new_payout_reference() -> String {
    new_tx_id("PYT")
}

/// Generates the 6-digit code the buyer hands over at the door.
pub fn new_delivery_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}
