//! Session artifacts harvested from the portal and their persistence.
//!
//! Every authenticated call is multiplexed through a single routing endpoint
//! and authorized by two security tokens plus a per-operation opcode. None
//! of these are documented or stable, so they are captured from live traffic
//! during the scripted login and reused until the portal rejects them.

mod acquirer;
mod prompt;
mod store;

pub use acquirer::{Acquirer, BrowserSessionSource, SessionSource};
pub use prompt::{FixedOtpPrompter, OtpPrompter, TerminalOtpPrompter};
pub use store::SessionStore;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Portal entry page the scripted login starts from.
pub const PORTAL_URL: &str = "https://www.itau.com.br";
/// Shared between the automated browser and the direct API client so the
/// portal sees one consistent client.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36";
/// Host serving the consolidated-investments widget.
pub const INVESTMENT_HOST: &str = "apicd.cloud.itau.com.br";
/// Path fragment identifying the routing endpoint.
pub const ROUTER_PATH: &str = "router-app/router";

/// Marker found in investment-service response bodies; the opcode is read
/// off the originating request since the request body alone is ambiguous.
pub const INVESTMENT_RESPONSE_MARKER: &str = "ordenadoPorTipo";

const STATEMENT_BODY: &str = "filtro=periodoVisualizacao&valor=90";
const CARD_LIST_BODY: &str = "secao=Cartoes&item=Home";
const INVESTMENTS_BODY: &str = "isAberto=false";

/// The four business operations the router multiplexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Statement,
    CardList,
    CardDetail,
    Investments,
}

impl Operation {
    /// Fixed form-encoded body for this operation, when it has one.
    /// Card detail posts a JSON array of card ids instead.
    pub fn form_body(self) -> Option<&'static str> {
        match self {
            Operation::Statement => Some(STATEMENT_BODY),
            Operation::CardList => Some(CARD_LIST_BODY),
            Operation::Investments => Some(INVESTMENTS_BODY),
            Operation::CardDetail => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Statement => "account-statement",
            Operation::CardList => "card-list",
            Operation::CardDetail => "card-detail",
            Operation::Investments => "investments",
        };
        write!(f, "{name}")
    }
}

/// Opcodes harvested per operation. A field left unset means that opcode was
/// never observed during acquisition; calls needing it fail individually.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCodes {
    #[serde(default)]
    pub statement: Option<String>,
    #[serde(default)]
    pub card_list: Option<String>,
    #[serde(default)]
    pub card_detail: Option<String>,
    #[serde(default)]
    pub investments: Option<String>,
}

impl OperationCodes {
    pub fn for_operation(&self, operation: Operation) -> Option<&str> {
        match operation {
            Operation::Statement => self.statement.as_deref(),
            Operation::CardList => self.card_list.as_deref(),
            Operation::CardDetail => self.card_detail.as_deref(),
            Operation::Investments => self.investments.as_deref(),
        }
    }
}

/// Everything needed to call the portal's internal API without repeating the
/// browser dance. Produced once per successful acquisition and never mutated;
/// expiry replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionArtifacts {
    /// Full routing endpoint URL observed in traffic.
    pub router_url: String,
    pub client_id: String,
    pub auth_token: String,
    pub operations: OperationCodes,
    /// When the session was captured (Unix timestamp).
    #[serde(default)]
    pub captured_at: Option<i64>,
}
