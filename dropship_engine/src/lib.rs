//! Dropship Back Office Engine
//!
//! The core of the multi-marketplace back office: the canonical order model with idempotent
//! upsert semantics, the append-only deposit ledger a client's balance is folded from, the
//! settlement flow that debits the ledger exactly once per payable order, and the
//! margin-preserving pricing engine.
//!
//! The library is split into:
//! 1. Database management ([`mod@sqlite`]). SQLite is the supported backend; access it through
//!    the public APIs rather than directly. The data types live in [`mod@db_types`] and are
//!    public.
//! 2. The engine's public APIs ([`mod@api`]): [`OrderFlowApi`] for the import/settlement flow,
//!    [`LedgerApi`] for manual deposit operations, [`PricingApi`] plus the pure [`mod@pricing`]
//!    solver for the pricing automation. Backends implement the traits in [`mod@traits`].
//!
//! The engine also emits events (order settled, low balance, status changed) through a small
//! hook system ([`mod@events`]) so the server can attach notifications without the engine
//! knowing how they are delivered.
mod api;

pub mod db_types;
pub mod events;
pub mod order_objects;
pub mod pricing;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{cost, ImportOutcome, LedgerApi, OrderFlowApi, PriceCheck, PricingApi, SettlementStatus};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDatabase, MIGRATOR};
pub use traits::{BackOfficeDatabase, BackOfficeError, LedgerError, LedgerManagement, OrderManagement, PricingStore};
