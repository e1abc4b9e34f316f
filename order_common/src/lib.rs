mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Money, MoneyParseError, CURRENCY_SCALE};
pub use secret::Secret;
