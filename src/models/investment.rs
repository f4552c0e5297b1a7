use serde::{Deserialize, Serialize};

/// A single product inside an investment category.
///
/// Amounts come from the investment service as plain JSON numbers, not BRL
/// strings, so they stay `f64` end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetHolding {
    pub code: String,
    pub name: String,
    pub amount: f64,
}

/// Consolidated position for one investment category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentPosition {
    /// Machine tag the portal groups by (e.g. `investimentosimobiliarios`);
    /// drives the real-estate-fund subset.
    pub category_tag: String,
    /// Human-readable category label.
    pub category: String,
    pub amount: f64,
    /// Share of the whole portfolio, as reported (0-100).
    pub percentage: f64,
    pub assets: Vec<AssetHolding>,
}
