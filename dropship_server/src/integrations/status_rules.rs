//! The status decision table.
//!
//! An imported order carries several possibly-conflicting status signals: an explicit
//! cancellation flag, the seller-facing assignment status, the customer-facing marketplace
//! status, a plain status string, and its own age. Which one wins used to be buried in nested
//! conditionals; here the precedence is a first-class, ordered rule list — each rule a named pure
//! predicate — so it can be read, logged and tested rule by rule.
use chrono::Duration;
use dropship_engine::db_types::OrderStatusType;

/// Everything the rules may look at, extracted from a raw order and its enrichment.
#[derive(Debug, Clone)]
pub struct StatusSignals<'a> {
    /// The marketplace says the order is cancelled, full stop.
    pub cancel_flag: bool,
    /// Seller-facing assignment status (Wildberries `supplierStatus`).
    pub supplier_status: Option<&'a str>,
    /// Customer-facing status (Wildberries `wbStatus`). Overrides the seller-facing view in a
    /// handful of cases: what the customer experienced is what actually happened.
    pub marketplace_status: Option<&'a str>,
    /// A plain status string on the raw order itself, for marketplaces with a single vocabulary.
    pub native_status: Option<&'a str>,
    /// How old the order is.
    pub age: Duration,
    /// Orders older than this with no matched signal are presumed delivered.
    pub stale_after: Duration,
}

impl Default for StatusSignals<'_> {
    fn default() -> Self {
        Self {
            cancel_flag: false,
            supplier_status: None,
            marketplace_status: None,
            native_status: None,
            age: Duration::zero(),
            stale_after: Duration::days(3),
        }
    }
}

pub struct StatusRule {
    pub name: &'static str,
    apply: fn(&StatusSignals) -> Option<OrderStatusType>,
}

/// Priority-ordered: the first rule that produces a status wins.
pub const RULES: &[StatusRule] = &[
    StatusRule {
        name: "explicit_cancel_flag",
        apply: |s| s.cancel_flag.then_some(OrderStatusType::Cancelled),
    },
    StatusRule {
        name: "customer_facing_override",
        apply: |s| match s.marketplace_status? {
            "sold" => Some(OrderStatusType::Delivered),
            "canceled" | "canceled_by_client" | "declined_by_client" | "defect" => Some(OrderStatusType::Cancelled),
            _ => None,
        },
    },
    StatusRule {
        name: "seller_facing_assignment",
        apply: |s| match s.supplier_status? {
            "cancel" => Some(OrderStatusType::Cancelled),
            "complete" => Some(OrderStatusType::Shipped),
            "confirm" => Some(OrderStatusType::InAssembly),
            "new" => Some(OrderStatusType::New),
            _ => None,
        },
    },
    StatusRule {
        name: "stale_order_presumed_delivered",
        apply: |s| (s.age > s.stale_after).then_some(OrderStatusType::Delivered),
    },
    StatusRule {
        name: "native_status_field",
        apply: |s| match s.native_status? {
            // Wildberries statistics vocabulary
            "new" => Some(OrderStatusType::New),
            "confirm" => Some(OrderStatusType::InAssembly),
            "cancel" | "cancelled" => Some(OrderStatusType::Cancelled),
            "shipped" => Some(OrderStatusType::Shipped),
            "delivered" => Some(OrderStatusType::Delivered),
            // Ozon posting vocabulary
            "awaiting_packaging" | "acceptance_in_progress" => Some(OrderStatusType::New),
            "awaiting_deliver" => Some(OrderStatusType::InAssembly),
            "delivering" => Some(OrderStatusType::Shipped),
            // Yandex Market vocabulary
            "PROCESSING" => Some(OrderStatusType::New),
            "DELIVERY" | "PICKUP" => Some(OrderStatusType::Shipped),
            "DELIVERED" => Some(OrderStatusType::Delivered),
            "CANCELLED" => Some(OrderStatusType::Cancelled),
            _ => None,
        },
    },
];

/// Resolves the canonical status and reports which rule decided, for the import log.
pub fn resolve_status(signals: &StatusSignals) -> (OrderStatusType, &'static str) {
    for rule in RULES {
        if let Some(status) = (rule.apply)(signals) {
            return (status, rule.name);
        }
    }
    (OrderStatusType::New, "default_new")
}

#[cfg(test)]
mod test {
    use super::*;

    fn fresh() -> StatusSignals<'static> {
        StatusSignals { stale_after: Duration::days(3), age: Duration::hours(1), ..Default::default() }
    }

    #[test]
    fn cancel_flag_beats_everything() {
        let signals = StatusSignals {
            cancel_flag: true,
            supplier_status: Some("confirm"),
            marketplace_status: Some("sold"),
            ..fresh()
        };
        let (status, rule) = resolve_status(&signals);
        assert_eq!(status, OrderStatusType::Cancelled);
        assert_eq!(rule, "explicit_cancel_flag");
    }

    #[test]
    fn customer_facing_status_overrides_the_seller_view() {
        // the customer received the parcel, whatever the assembly state claims
        let signals = StatusSignals { supplier_status: Some("confirm"), marketplace_status: Some("sold"), ..fresh() };
        assert_eq!(resolve_status(&signals).0, OrderStatusType::Delivered);

        let signals =
            StatusSignals { supplier_status: Some("complete"), marketplace_status: Some("canceled_by_client"), ..fresh() };
        assert_eq!(resolve_status(&signals).0, OrderStatusType::Cancelled);
    }

    #[test]
    fn seller_facing_assignment_maps_the_lifecycle() {
        for (supplier, expected) in [
            ("new", OrderStatusType::New),
            ("confirm", OrderStatusType::InAssembly),
            ("complete", OrderStatusType::Shipped),
            ("cancel", OrderStatusType::Cancelled),
        ] {
            let signals = StatusSignals { supplier_status: Some(supplier), ..fresh() };
            assert_eq!(resolve_status(&signals).0, expected, "supplier status {supplier}");
        }
        // non-overriding customer-facing values fall through to the seller view
        let signals =
            StatusSignals { supplier_status: Some("confirm"), marketplace_status: Some("waiting"), ..fresh() };
        assert_eq!(resolve_status(&signals).0, OrderStatusType::InAssembly);
    }

    #[test]
    fn stale_orders_with_no_matched_signal_are_presumed_delivered() {
        let signals = StatusSignals { age: Duration::days(4), ..fresh() };
        let (status, rule) = resolve_status(&signals);
        assert_eq!(status, OrderStatusType::Delivered);
        assert_eq!(rule, "stale_order_presumed_delivered");

        // an unmatched assignment value does not count as a matched signal
        let signals = StatusSignals { age: Duration::days(4), supplier_status: Some("waiting"), ..fresh() };
        assert_eq!(resolve_status(&signals).0, OrderStatusType::Delivered);

        // but a matched one resolved earlier
        let signals = StatusSignals { age: Duration::days(4), supplier_status: Some("confirm"), ..fresh() };
        assert_eq!(resolve_status(&signals).0, OrderStatusType::InAssembly);
    }

    #[test]
    fn native_status_maps_each_marketplace_vocabulary() {
        for (native, expected) in [
            ("awaiting_packaging", OrderStatusType::New),
            ("awaiting_deliver", OrderStatusType::InAssembly),
            ("delivering", OrderStatusType::Shipped),
            ("delivered", OrderStatusType::Delivered),
            ("cancelled", OrderStatusType::Cancelled),
            ("PROCESSING", OrderStatusType::New),
            ("DELIVERY", OrderStatusType::Shipped),
        ] {
            let signals = StatusSignals { native_status: Some(native), ..fresh() };
            assert_eq!(resolve_status(&signals).0, expected, "native status {native}");
        }
    }

    #[test]
    fn everything_unknown_defaults_to_new() {
        let (status, rule) = resolve_status(&fresh());
        assert_eq!(status, OrderStatusType::New);
        assert_eq!(rule, "default_new");
    }
}
