use dropship_engine::{BackOfficeError, LedgerError};
use marketplace_tools::MarketplaceApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(#[from] BackOfficeError),
    #[error("Ledger error. {0}")]
    LedgerError(#[from] LedgerError),
    #[error("Marketplace API error. {0}")]
    MarketplaceError(#[from] MarketplaceApiError),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
}
