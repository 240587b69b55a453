//! The engine's public APIs: the order-flow/settlement orchestration, the deposit ledger, and the
//! pricing automation surface. Each API is generic over the backend traits so tests can drive
//! them against throwaway databases.
pub mod cost;
mod ledger_api;
mod order_flow_api;
mod pricing_api;

pub use ledger_api::LedgerApi;
pub use order_flow_api::{ImportOutcome, OrderFlowApi, SettlementStatus};
pub use pricing_api::{PriceCheck, PricingApi};
