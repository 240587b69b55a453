use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};

use crate::db_types::{Marketplace, OrderStatusType, TransactionType};

/// How long a `new` order may sit before the default list view hides it. Such orders are usually
/// stuck on upstream reconciliation; they still show in the history view and the next import
/// cycle keeps retrying them.
pub const STALE_NEW_ORDER_DAYS: i64 = 1;

//--------------------------------------  OrderQueryFilter  ----------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    pub client_id: Option<i64>,
    pub marketplace: Option<Marketplace>,
    pub status: Option<Vec<OrderStatusType>>,
    /// Substring match over order id, customer name and delivery address.
    pub search: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// When set, `new` orders older than this are excluded (the "current" view). The history view
    /// leaves it unset.
    pub exclude_stale_new: Option<Duration>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl OrderQueryFilter {
    /// The default open-orders view for a client: everything, except `new` orders that went stale.
    pub fn current_view(client_id: i64) -> Self {
        Self {
            client_id: Some(client_id),
            exclude_stale_new: Some(Duration::days(STALE_NEW_ORDER_DAYS)),
            ..Default::default()
        }
    }

    /// Full history, nothing hidden.
    pub fn history_view(client_id: i64) -> Self {
        Self { client_id: Some(client_id), ..Default::default() }
    }

    pub fn with_marketplace(mut self, marketplace: Marketplace) -> Self {
        self.marketplace = Some(marketplace);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_search(mut self, needle: impl Into<String>) -> Self {
        self.search = Some(needle.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn paged(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.client_id.is_none()
            && self.marketplace.is_none()
            && self.status.is_none()
            && self.search.is_none()
            && self.since.is_none()
            && self.until.is_none()
            && self.exclude_stale_new.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(client_id) = self.client_id {
            write!(f, "client_id: {client_id}. ")?;
        }
        if let Some(marketplace) = self.marketplace {
            write!(f, "marketplace: {marketplace}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        if let Some(search) = &self.search {
            write!(f, "search: {search}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(window) = &self.exclude_stale_new {
            write!(f, "hiding new orders older than {}h. ", window.num_hours())?;
        }
        Ok(())
    }
}

//--------------------------------------  LedgerQueryFilter ----------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct LedgerQueryFilter {
    pub transaction_type: Option<TransactionType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl LedgerQueryFilter {
    pub fn with_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }
}
