pub mod arith;
mod money;
mod secret;
mod status;

pub use money::{Money, MoneyConversionError, BASIS_POINTS_SCALE, CENTS_PER_UNIT, SITE_CURRENCY_CODE};
pub use secret::Secret;
pub use status::{PaymentStatus, StatusConversionError};
