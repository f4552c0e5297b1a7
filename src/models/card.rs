use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Credit limit triple as reported by the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardLimits {
    pub total: Decimal,
    pub used: Decimal,
    pub available: Decimal,
}

/// The invoice shown for a card: an open one when present, otherwise the
/// most recent closed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenInvoice {
    pub total: Decimal,
    pub due_date: NaiveDate,
    pub close_date: NaiveDate,
}

/// A credit card with its current invoice. Cards the portal reports without
/// any open or closed invoice never make it into a result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCard {
    pub id: String,
    pub name: String,
    /// Masked number as the portal renders it (last digits only).
    pub masked_number: String,
    pub expiration_date: NaiveDate,
    pub limits: Option<CardLimits>,
    pub open_invoice: OpenInvoice,
}
