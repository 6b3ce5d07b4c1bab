pub mod amount;
pub mod period;
pub mod transaction;

pub use amount::{Amount, AmountError};
pub use period::DateRange;
pub use transaction::{CanonicalTransaction, Direction};
