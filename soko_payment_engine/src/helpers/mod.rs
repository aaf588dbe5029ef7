//! Small shared utilities.
mod ids;

pub use ids::{new_delivery_code, new_order_no, new_payout_reference, new_tx_id};
