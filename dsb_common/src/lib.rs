mod kopecks;

pub mod op;
mod secret;

pub use kopecks::{Kopecks, KopecksConversionError, RUB_CURRENCY_CODE};
pub use secret::Secret;
