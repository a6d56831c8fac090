mod yen;

pub mod helpers;
pub mod op;
mod secret;

pub use helpers::parse_boolean_flag;
pub use secret::Secret;
pub use yen::{Yen, YenConversionError, YEN_CURRENCY_CODE};
