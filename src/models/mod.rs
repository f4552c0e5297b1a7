mod card;
mod identity;
mod investment;
mod statement;

pub use card::{CardLimits, CreditCard, OpenInvoice};
pub use identity::{normalize_identifier, AccountIdentity};
pub use investment::{AssetHolding, InvestmentPosition};
pub use statement::{AccountStatement, Direction, Transaction};
