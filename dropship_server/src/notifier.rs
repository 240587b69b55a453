//! The notifier collaborator and the event-hook wiring that feeds it.
//!
//! This core only decides *that* and *what* to notify. Delivery (internal inbox, email, SMS) is
//! someone else's problem behind the [`Notifier`] trait; the default implementation just logs.
use std::sync::Arc;

use dropship_engine::{events::EventHooks, BackOfficeDatabase, SqliteDatabase};
use log::*;

#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, user_id: i64, title: &str, message: &str);
}

/// Fallback notifier: writes the notification to the operational log and nothing else.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, user_id: i64, title: &str, message: &str) {
        info!("🔔️ [user #{user_id}] {title}: {message}");
    }
}

/// Wires the engine's settlement events to the notifier. Messages mirror what clients are used
/// to seeing in their notification feed.
pub fn default_event_hooks(db: SqliteDatabase, notifier: Arc<dyn Notifier>) -> EventHooks {
    let mut hooks = EventHooks::default();

    let n = notifier.clone();
    let hook_db = db.clone();
    hooks.on_order_settled(move |ev| {
        let notifier = n.clone();
        let db = hook_db.clone();
        Box::pin(async move {
            let Some(user_id) = user_for_client(&db, ev.order.client_id).await else { return };
            let message = settled_message(&ev);
            notifier.notify(user_id, "Заказ оплачен", &message);
        })
    });

    let n = notifier.clone();
    let hook_db = db.clone();
    hooks.on_low_balance(move |ev| {
        let notifier = n.clone();
        let db = hook_db.clone();
        Box::pin(async move {
            let Some(user_id) = user_for_client(&db, ev.client_id).await else { return };
            let message = low_balance_message(&ev);
            notifier.notify(user_id, "Недостаточно средств", &message);
        })
    });

    hooks.on_status_changed(move |ev| {
        Box::pin(async move {
            debug!("🔔️ Order {} moved {} -> {}", ev.order.key(), ev.old_status, ev.order.status);
        })
    });

    hooks
}

pub(crate) fn settled_message(ev: &dropship_engine::events::OrderSettledEvent) -> String {
    format!(
        "С вашего депозита списано {} за заказ {}. Новый баланс: {}",
        -ev.entry.amount, ev.order.order_id, ev.entry.balance_after
    )
}

pub(crate) fn low_balance_message(ev: &dropship_engine::events::LowBalanceEvent) -> String {
    format!(
        "Для оплаты заказа {} не хватает {}. Баланс: {}, требуется: {}. Пополните депозит — заказ будет оплачен при следующем импорте.",
        ev.order.order_id, ev.shortfall.shortfall, ev.shortfall.balance, ev.shortfall.required
    )
}

async fn user_for_client(db: &SqliteDatabase, client_id: i64) -> Option<i64> {
    match db.fetch_client(client_id).await {
        Ok(Some(client)) => Some(client.user_id),
        Ok(None) => {
            warn!("🔔️ Client #{client_id} vanished before its notification could be routed");
            None
        },
        Err(e) => {
            warn!("🔔️ Could not resolve the user for client #{client_id}: {e}");
            None
        },
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use dropship_engine::{
        db_types::{
            CustomerInfo,
            EntryStatus,
            InsufficientFunds,
            LedgerEntry,
            Marketplace,
            Order,
            OrderId,
            OrderStatusType,
            OrderType,
            TransactionType,
        },
        events::{LowBalanceEvent, OrderSettledEvent},
    };
    use dsb_common::Kopecks;

    use super::*;

    fn order() -> Order {
        Order {
            id: 1,
            client_id: 7,
            marketplace: Marketplace::Wildberries,
            order_id: OrderId::from("wb-1001"),
            status: OrderStatusType::InAssembly,
            order_type: OrderType::Fbs,
            total_amount: Kopecks::from(150_000),
            customer: CustomerInfo::default(),
            delivery_address: String::new(),
            items: vec![],
            tracking_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn entry() -> LedgerEntry {
        LedgerEntry {
            id: 42,
            client_id: 7,
            amount: Kopecks::from(-105_000),
            balance_before: Kopecks::from(200_000),
            balance_after: Kopecks::from(95_000),
            transaction_type: TransactionType::OrderPayment,
            description: String::new(),
            payment_method: Some("internal".to_string()),
            payment_id: Some("order_7_wildberries_wb-1001".to_string()),
            status: EntryStatus::Completed,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn settled_message_reports_debit_and_new_balance() {
        let message = settled_message(&OrderSettledEvent::new(order(), entry()));
        assert_eq!(message, "С вашего депозита списано 1050.00₽ за заказ #wb-1001. Новый баланс: 950.00₽");
    }

    #[test]
    fn low_balance_message_reports_the_shortfall() {
        let shortfall = InsufficientFunds {
            balance: Kopecks::from(50_000),
            required: Kopecks::from(70_000),
            shortfall: Kopecks::from(20_000),
        };
        let message = low_balance_message(&LowBalanceEvent::new(order(), shortfall));
        assert!(message.contains("не хватает 200.00₽"), "{message}");
        assert!(message.contains("Баланс: 500.00₽"), "{message}");
    }

    #[test]
    fn mock_notifier_receives_the_call() {
        let mut mock = MockNotifier::new();
        mock.expect_notify()
            .withf(|user_id, title, message| *user_id == 3 && title == "Заказ оплачен" && message.contains("950.00₽"))
            .times(1)
            .return_const(());
        let message = settled_message(&OrderSettledEvent::new(order(), entry()));
        mock.notify(3, "Заказ оплачен", &message);
    }
}
