pub mod order_flow_api;
pub mod wallet_api;
pub mod withdrawal_api;
