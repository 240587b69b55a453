use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use dsb_common::Kopecks;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row, Type};
use thiserror::Error;

//--------------------------------------    Marketplace    -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Marketplace {
    Wildberries,
    Ozon,
    YandexMarket,
}

impl Marketplace {
    pub const ALL: [Marketplace; 3] = [Marketplace::Wildberries, Marketplace::Ozon, Marketplace::YandexMarket];
}

impl Display for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Marketplace::Wildberries => write!(f, "wildberries"),
            Marketplace::Ozon => write!(f, "ozon"),
            Marketplace::YandexMarket => write!(f, "yandex_market"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

impl FromStr for Marketplace {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wildberries" => Ok(Self::Wildberries),
            "ozon" => Ok(Self::Ozon),
            "yandex_market" | "yandexmarket" => Ok(Self::YandexMarket),
            s => Err(ConversionError(format!("Invalid marketplace: {s}"))),
        }
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
/// Canonical order lifecycle: `new → in_assembly → shipped → delivered`, with `cancelled`
/// reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Imported, not yet settled against the deposit ledger.
    New,
    /// Settled; the purchase cost has been debited and the order is being assembled.
    InAssembly,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Delivered | OrderStatusType::Cancelled)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::New => write!(f, "new"),
            OrderStatusType::InAssembly => write!(f, "in_assembly"),
            OrderStatusType::Shipped => write!(f, "shipped"),
            OrderStatusType::Delivered => write!(f, "delivered"),
            OrderStatusType::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "in_assembly" => Ok(Self::InAssembly),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------      OrderType      ---------------------------------------------------------
/// Who warehouses and delivers: fulfilment-by-seller, delivery-by-marketplace-warehouse,
/// delivery-by-seller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Fbs,
    Dbw,
    Dbs,
}

impl Default for OrderType {
    fn default() -> Self {
        Self::Fbs
    }
}

impl Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Fbs => write!(f, "FBS"),
            OrderType::Dbw => write!(f, "DBW"),
            OrderType::Dbs => write!(f, "DBS"),
        }
    }
}

//--------------------------------------       OrderId       ---------------------------------------------------------
/// The order id as assigned by the marketplace. Only unique together with the client and
/// marketplace — see [`OrderKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       OrderKey      ---------------------------------------------------------
/// The identity triple every order is keyed by. This is the upsert key and the basis of the
/// settlement idempotency id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub client_id: i64,
    pub marketplace: Marketplace,
    pub order_id: OrderId,
}

impl OrderKey {
    pub fn new(client_id: i64, marketplace: Marketplace, order_id: impl Into<OrderId>) -> Self {
        Self { client_id, marketplace, order_id: order_id.into() }
    }

    /// Deterministic settlement id for this order. Contains no timestamp or random component, so
    /// re-importing the same order always derives the same id and the ledger's unique index can
    /// reject a second debit.
    pub fn payment_id(&self) -> String {
        format!("order_{}_{}_{}", self.client_id, self.marketplace, self.order_id.as_str())
    }
}

impl Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} (client #{})", self.marketplace, self.order_id, self.client_id)
    }
}

//--------------------------------------      OrderItem      ---------------------------------------------------------
/// One line of an order. Stored inside the order's JSON `items` blob (camelCase keys — the
/// contract consumed by the UI and reports), replaced wholesale on every upsert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderItem {
    pub article: String,
    pub name: String,
    pub quantity: i64,
    /// Unit price in minor units.
    pub price: Kopecks,
    pub total_price: Kopecks,
    pub subject: Option<String>,
    pub brand: Option<String>,
    /// The marketplace's product id (Wildberries `nmId`).
    pub nm_id: Option<i64>,
    pub chrt_id: Option<i64>,
    /// Barcodes; the first one drives the warehouse cost lookup.
    pub skus: Option<Vec<String>>,
    /// The fulfilment assignment this line belongs to; used for status re-polling.
    pub assignment_id: Option<String>,
    pub order_type: Option<OrderType>,
    pub supplier_status: Option<String>,
    pub marketplace_status: Option<String>,
}

impl OrderItem {
    pub fn primary_barcode(&self) -> Option<&str> {
        self.skus.as_ref().and_then(|s| s.first()).map(|s| s.as_str()).filter(|s| !s.is_empty())
    }
}

//--------------------------------------     CustomerInfo    ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    pub email: String,
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct Order {
    pub id: i64,
    pub client_id: i64,
    pub marketplace: Marketplace,
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub order_type: OrderType,
    pub total_amount: Kopecks,
    pub customer: CustomerInfo,
    pub delivery_address: String,
    pub items: Vec<OrderItem>,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn key(&self) -> OrderKey {
        OrderKey::new(self.client_id, self.marketplace, self.order_id.clone())
    }
}

// The items blob needs JSON decoding, so the row mapping is spelled out rather than derived.
impl<'r> FromRow<'r, SqliteRow> for Order {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let items_json: String = row.try_get("items")?;
        let items: Vec<OrderItem> = serde_json::from_str(&items_json)
            .map_err(|e| sqlx::Error::ColumnDecode { index: "items".to_string(), source: Box::new(e) })?;
        Ok(Self {
            id: row.try_get("id")?,
            client_id: row.try_get("client_id")?,
            marketplace: row.try_get("marketplace")?,
            order_id: row.try_get("marketplace_order_id")?,
            status: row.try_get("status")?,
            order_type: row.try_get("order_type")?,
            total_amount: row.try_get("total_amount")?,
            customer: CustomerInfo {
                name: row.try_get("customer_name")?,
                phone: row.try_get("customer_phone")?,
                email: row.try_get("customer_email")?,
            },
            delivery_address: row.try_get("delivery_address")?,
            items,
            tracking_number: row.try_get("tracking_number")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

//--------------------------------------       NewOrder      ---------------------------------------------------------
/// A canonical order as produced by a normalizer, ready for the idempotent upsert.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub key: OrderKey,
    pub status: OrderStatusType,
    pub order_type: OrderType,
    pub total_amount: Kopecks,
    pub customer: CustomerInfo,
    pub delivery_address: String,
    pub items: Vec<OrderItem>,
    /// When the order was created on the marketplace, not when we first saw it.
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(key: OrderKey, total_amount: Kopecks) -> Self {
        Self {
            key,
            status: OrderStatusType::New,
            order_type: OrderType::default(),
            total_amount,
            customer: CustomerInfo::default(),
            delivery_address: String::new(),
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

//--------------------------------------    UpsertOutcome    ---------------------------------------------------------
/// What the idempotent upsert observed: the stored row after the write, whether the row is brand
/// new, and the status it had immediately before this write. This return value drives settlement.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub order: Order,
    pub is_new: bool,
    pub previous_status: Option<OrderStatusType>,
}

impl UpsertOutcome {
    /// Whether a settlement attempt is due: the order is brand new, or it is (still) sitting in
    /// the payable `new` state. An order left unsettled by an earlier cycle — insufficient funds,
    /// say — is retried naturally on every re-import; the deterministic payment id is what keeps
    /// the debit at-most-once, not this check.
    pub fn payable(&self) -> bool {
        self.is_new || self.order.status == OrderStatusType::New
    }
}

//--------------------------------------     OrderChanged    ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct OrderChanged {
    pub old_status: OrderStatusType,
    pub order: Order,
}

//--------------------------------------   TransactionType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    OrderPayment,
    Return,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Deposit => write!(f, "deposit"),
            TransactionType::Withdrawal => write!(f, "withdrawal"),
            TransactionType::OrderPayment => write!(f, "order_payment"),
            TransactionType::Return => write!(f, "return"),
        }
    }
}

//--------------------------------------     EntryStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

impl Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryStatus::Pending => write!(f, "pending"),
            EntryStatus::Completed => write!(f, "completed"),
            EntryStatus::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------     LedgerEntry     ---------------------------------------------------------
/// One immutable movement of a client's deposit balance.
#[derive(Debug, Clone, FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub client_id: i64,
    /// Signed: positive credits, negative debits.
    pub amount: Kopecks,
    pub balance_before: Kopecks,
    pub balance_after: Kopecks,
    pub transaction_type: TransactionType,
    pub description: String,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub client_id: i64,
    pub amount: Kopecks,
    pub transaction_type: TransactionType,
    pub description: String,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
    pub status: EntryStatus,
}

impl NewLedgerEntry {
    pub fn new(client_id: i64, amount: Kopecks, transaction_type: TransactionType, description: String) -> Self {
        Self {
            client_id,
            amount,
            transaction_type,
            description,
            payment_method: None,
            payment_id: None,
            status: EntryStatus::Completed,
        }
    }
}

//--------------------------------------  SettlementOutcome  ---------------------------------------------------------
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    /// The debit was written and the order moved to `in_assembly`.
    Settled { order: Order, entry: LedgerEntry },
    /// A completed debit with this order's payment id already exists; nothing was charged.
    AlreadySettled(LedgerEntry),
}

//-------------------------------------- InsufficientFunds   ---------------------------------------------------------
/// Expected business condition, not a bug: the client's balance does not cover the purchase cost.
/// The order stays `new` and the next import cycle retries naturally.
#[derive(Debug, Clone, Error)]
#[error("Insufficient funds: balance {balance}, required {required}, short {shortfall}")]
pub struct InsufficientFunds {
    pub balance: Kopecks,
    pub required: Kopecks,
    pub shortfall: Kopecks,
}

//--------------------------------------       Client        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Client {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// Raw per-marketplace credential JSON; parsed by the import worker.
    pub api_keys: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   PricingSettings   ---------------------------------------------------------
/// Per-client, per-marketplace pricing knobs. Percentages are whole percents (15.0 = 15%).
#[derive(Debug, Clone, FromRow)]
pub struct PricingSettings {
    pub id: i64,
    pub client_id: i64,
    pub marketplace: Marketplace,
    /// Target margin.
    pub markup_percent: f64,
    pub acquiring_percent: f64,
    pub first_liter_logistics: f64,
    pub additional_liter_logistics: f64,
    pub warehouse_coeff_percent: f64,
    pub shipment_handling: f64,
    pub min_purchase_price: f64,
    pub max_purchase_price: f64,
    pub maintain_margin_in_promotions: bool,
    pub auto_exit_promotions: bool,
    pub fallback_cost_percent: i64,
    pub purchase_estimate_percent: f64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            id: 0,
            client_id: 0,
            marketplace: Marketplace::Wildberries,
            markup_percent: 15.0,
            acquiring_percent: 2.0,
            first_liter_logistics: 50.0,
            additional_liter_logistics: 10.0,
            warehouse_coeff_percent: 0.0,
            shipment_handling: 30.0,
            min_purchase_price: 0.0,
            max_purchase_price: 1_000_000.0,
            maintain_margin_in_promotions: true,
            auto_exit_promotions: false,
            fallback_cost_percent: 70,
            purchase_estimate_percent: 60.0,
        }
    }
}

//--------------------------------------   ProductSnapshot   ---------------------------------------------------------
/// Cached marketplace product, the price solver's input. Listing prices are roubles, matching the
/// marketplace price APIs; they never mix with the ledger's minor units.
#[derive(Debug, Clone, FromRow)]
pub struct ProductSnapshot {
    pub id: i64,
    pub client_id: i64,
    /// Marketplace product id (nmId).
    pub external_id: i64,
    pub article: String,
    pub name: String,
    pub current_price: f64,
    pub purchase_price: Option<f64>,
    pub commission_percent: f64,
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub volume_liters: Option<f64>,
    pub in_promotion: bool,
    pub promotion_discount_percent: f64,
    pub is_active: bool,
}

//--------------------------------------   NewPriceChange    ---------------------------------------------------------
/// One row for the pricing audit log.
#[derive(Debug, Clone)]
pub struct NewPriceChange {
    pub client_id: i64,
    pub external_id: i64,
    pub article: String,
    pub old_price: f64,
    pub new_price: f64,
    pub calculated_price: f64,
    pub margin_percent: f64,
    pub logistics_cost: f64,
    pub commission_percent: f64,
    pub change_reason: String,
    pub change_source: String,
}

//--------------------------------------   ProductReturn     ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct ProductReturn {
    pub key: OrderKey,
    pub article: String,
    pub quantity: i64,
    pub reason: String,
}
