//! High-level operations over an authenticated session.
//!
//! Thin orchestration: each method issues the raw call(s) through the client
//! and hands the body to the normalizer. Expiry handling lives entirely in
//! the client; normalization failures propagate unchanged.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::client::PortalClient;
use crate::error::Result;
use crate::models::{AccountStatement, AssetHolding, CreditCard, InvestmentPosition};
use crate::normalize;
use crate::session::{SessionArtifacts, SessionSource};

pub struct BankService {
    client: PortalClient,
}

impl BankService {
    pub fn new(artifacts: SessionArtifacts, source: Arc<dyn SessionSource>) -> Result<Self> {
        Ok(Self {
            client: PortalClient::new(artifacts, source)?,
        })
    }

    /// Artifacts currently held by the client (fresh ones after any
    /// re-acquisition), so callers can persist them.
    pub fn artifacts(&self) -> &SessionArtifacts {
        self.client.artifacts()
    }

    /// The 90-day statement with normalized entries.
    pub async fn account_statement(&mut self) -> Result<AccountStatement> {
        let raw = self.client.account_statement().await?;
        normalize::statement::parse(&raw)
    }

    /// Available balance, as reported on the statement.
    pub async fn available_balance(&mut self) -> Result<Decimal> {
        Ok(self.account_statement().await?.available_balance)
    }

    /// Credit cards with their current invoices. Combines the card-list call
    /// (ids) with the card-detail call keyed by those ids.
    pub async fn credit_cards(&mut self) -> Result<Vec<CreditCard>> {
        let list = self.client.card_list().await?;
        let ids = normalize::cards::card_ids(&list)?;
        let details = self.client.card_details(&ids).await?;
        normalize::cards::parse(&details)
    }

    /// Consolidated investments by category.
    pub async fn investments(&mut self) -> Result<Vec<InvestmentPosition>> {
        let raw = self.client.investments().await?;
        normalize::investments::parse(&raw)
    }

    /// Individual real-estate-fund holdings, largest first.
    pub async fn real_estate_funds(&mut self) -> Result<Vec<AssetHolding>> {
        let positions = self.investments().await?;
        Ok(normalize::investments::real_estate_funds(&positions))
    }
}
