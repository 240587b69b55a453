use dsb_common::Kopecks;
use log::*;

use crate::{
    db_types::{EntryStatus, LedgerEntry, NewLedgerEntry, TransactionType},
    order_objects::LedgerQueryFilter,
    traits::{LedgerError, LedgerManagement},
};

/// Manual deposit-ledger operations: top-ups, withdrawals and history. Settlement debits never go
/// through here — they are written by the settlement transaction itself.
pub struct LedgerApi<B> {
    db: B,
}

impl<B> LedgerApi<B>
where B: LedgerManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn balance(&self, client_id: i64) -> Result<Kopecks, LedgerError> {
        self.db.balance(client_id).await
    }

    /// Credits a top-up. Only positive amounts make sense here; corrections go through
    /// withdrawals or returns.
    pub async fn deposit(
        &self,
        client_id: i64,
        amount: Kopecks,
        description: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        if amount <= Kopecks::from(0) {
            return Err(LedgerError::InvalidAmount(format!("Deposit amount must be positive, got {amount}")));
        }
        let entry = NewLedgerEntry::new(client_id, amount, TransactionType::Deposit, description.to_string());
        let entry = self.db.append_entry(entry).await?;
        info!("💰️ Client #{client_id} deposited {amount}. New balance: {}", entry.balance_after);
        Ok(entry)
    }

    /// Debits a manual withdrawal. The balance check and the chained append are not one atomic
    /// unit here — withdrawals are operator-initiated and rare — but the append itself still
    /// chains atomically, so the ledger invariant holds regardless.
    pub async fn withdraw(
        &self,
        client_id: i64,
        amount: Kopecks,
        description: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        if amount <= Kopecks::from(0) {
            return Err(LedgerError::InvalidAmount(format!("Withdrawal amount must be positive, got {amount}")));
        }
        let balance = self.db.balance(client_id).await?;
        if balance < amount {
            return Err(LedgerError::InvalidAmount(format!(
                "Withdrawal of {amount} exceeds the current balance {balance}"
            )));
        }
        let entry = NewLedgerEntry {
            client_id,
            amount: -amount,
            transaction_type: TransactionType::Withdrawal,
            description: description.to_string(),
            payment_method: None,
            payment_id: None,
            status: EntryStatus::Completed,
        };
        let entry = self.db.append_entry(entry).await?;
        info!("💰️ Client #{client_id} withdrew {amount}. New balance: {}", entry.balance_after);
        Ok(entry)
    }

    /// Entries for a client, newest first. Pass a type filter for e.g. the order-payment history.
    pub async fn history(
        &self,
        client_id: i64,
        query: LedgerQueryFilter,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.db.ledger_history(client_id, query).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
