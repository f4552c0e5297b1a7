//! Session acquisition by scripted login.
//!
//! The portal never hands out API credentials directly; they only exist in
//! the traffic its own frontend generates. So acquisition drives a real
//! Chrome through the login flow (account entry, app token, secure-keypad
//! password) and a fixed walk of the panels that trigger each business call,
//! while fetch-domain interception passively harvests the routing URL, the
//! security headers, and the per-operation opcodes from the requests the
//! frontend makes along the way.
//!
//! All harvested values land in a single accumulator scoped to one
//! acquisition and become an immutable [`SessionArtifacts`] only on success.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::Headers;
use chromiumoxide::{Element, Page};
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::BrowserSettings;
use crate::error::{Error, Result};
use crate::models::AccountIdentity;
use crate::session::{
    Operation, OperationCodes, OtpPrompter, SessionArtifacts, SessionStore, INVESTMENT_HOST,
    INVESTMENT_RESPONSE_MARKER, PORTAL_URL, ROUTER_PATH, USER_AGENT,
};

const MORE_ACCESS_BUTTON: &str = "button#open_modal_more_access";
const MORE_ACCESS_MODAL: &str = "div.idl-modal-more-access-container";
const AGENCY_INPUT: &str = "input#idl-more-access-input-agency";
const ACCOUNT_INPUT: &str = "input#idl-more-access-input-account";
const COOKIE_BANNER_ACCEPT: &str = "button#itau-cookie-consent-banner-accept-cookies-btn";
const MORE_ACCESS_SUBMIT: &str = "button#idl-more-access-submit-button:not([disabled])";
const TOKEN_INPUT: &str = "input#app-entraCodigo";
const TOKEN_SUBMIT: &str = "a#app-codigoOk:not([disabled])";
const KEYPAD_KEYS: &str = ".teclas.clearfix a";
const LOGIN_BUTTON: &str = "#acessar";
const HOME_LOGO: &str = "#HomeLogo";
const INVESTMENTS_ACCORDION: &str = "#investimento-card-accordion";
const INVESTMENTS_OPEN: &str = "#verInvestimentos";
const STATEMENT_ACCORDION: &str = "#saldo-extrato-card-accordion";
const VIEW_STATEMENT: &str = "button[aria-label=\"ver extrato\"]";
const PERIOD_FILTER: &str = "div#periodoFiltro";
const PERIOD_FILTER_LIST: &str = "ul#periodoFiltroList";
const PERIOD_FILTER_ITEMS: &str = "ul#periodoFiltroList li";
const CARD_ACCORDION: &str = "button#cartao-card-accordion";
const CARD_TABLE: &str = "div.content-cartoes";

/// The statement filter option carrying this data-id covers 90 days.
const STATEMENT_PERIOD_DAYS: &str = "90";

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const TYPE_DELAY: Duration = Duration::from_millis(50);
const KEYPAD_CLICK_PAUSE: Duration = Duration::from_millis(1000);
const SETTLE_DELAY: Duration = Duration::from_millis(2000);
const CARD_EXPAND_ATTEMPTS: usize = 5;

/// Anything that can produce fresh session artifacts on demand.
///
/// The client re-acquires through this seam when the portal rejects a call;
/// tests substitute a fixed or counting implementation.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn acquire(&self) -> Result<SessionArtifacts>;
}

/// Production [`SessionSource`]: runs the full browser flow and persists the
/// fresh artifacts so the next process reuses them.
pub struct BrowserSessionSource {
    acquirer: Acquirer,
    identity: AccountIdentity,
    prompter: Arc<dyn OtpPrompter>,
    store: Option<SessionStore>,
}

impl BrowserSessionSource {
    pub fn new(
        acquirer: Acquirer,
        identity: AccountIdentity,
        prompter: Arc<dyn OtpPrompter>,
    ) -> Self {
        Self {
            acquirer,
            identity,
            prompter,
            store: None,
        }
    }

    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }
}

#[async_trait]
impl SessionSource for BrowserSessionSource {
    async fn acquire(&self) -> Result<SessionArtifacts> {
        let artifacts = self
            .acquirer
            .acquire(&self.identity, self.prompter.as_ref())
            .await?;
        if let Some(store) = &self.store {
            store.save(&self.identity, &artifacts)?;
        }
        Ok(artifacts)
    }
}

/// Drives the scripted login and harvests session artifacts.
pub struct Acquirer {
    settings: BrowserSettings,
}

impl Acquirer {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    /// Run the full acquisition flow once.
    ///
    /// Fails with [`Error::Acquisition`] if any UI step's target never
    /// appears within the step timeout or a required artifact is never
    /// observed. The one-time-token prompt blocks with no timeout.
    pub async fn acquire(
        &self,
        identity: &AccountIdentity,
        prompter: &dyn OtpPrompter,
    ) -> Result<SessionArtifacts> {
        let (browser, mut handler) = self.launch().await?;
        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

        let result = self.acquire_on(&browser, identity, prompter).await;

        drop(browser);
        handler_task.abort();
        result
    }

    async fn acquire_on(
        &self,
        browser: &Browser,
        identity: &AccountIdentity,
        prompter: &dyn OtpPrompter,
    ) -> Result<SessionArtifacts> {
        let page = browser.new_page("about:blank").await.map_err(cdp_err)?;

        // Observers must be live before the first navigation; the frontend
        // fires harvestable traffic as soon as login completes.
        let harvest: Arc<Mutex<Harvest>> = Arc::new(Mutex::new(Harvest::default()));
        let intercept_task = install_traffic_observers(&page, harvest.clone()).await?;

        let outcome = self.navigate(&page, identity, prompter).await;

        intercept_task.abort();
        outcome?;

        let harvested = harvest.lock().await.clone();
        harvested.into_artifacts(Utc::now().timestamp())
    }

    async fn navigate(
        &self,
        page: &Page,
        identity: &AccountIdentity,
        prompter: &dyn OtpPrompter,
    ) -> Result<()> {
        info!(
            agency = identity.agency(),
            account = identity.account(),
            "starting portal login"
        );
        page.goto(PORTAL_URL).await.map_err(cdp_err)?;

        self.fill_account_data(page, identity).await?;

        let token = prompter.one_time_token().await?;
        self.submit_token(page, &token).await?;

        self.enter_password(page, identity.password()).await?;
        info!("signed in; walking panels to surface API traffic");

        self.open_investments(page).await?;
        debug!("investments panel opened");

        self.goto_home(page).await?;
        self.open_statement(page).await?;
        debug!("statement panel opened with 90-day filter");

        self.goto_home(page).await?;
        self.expand_cards(page).await?;
        debug!("credit card panel expanded");

        Ok(())
    }

    async fn fill_account_data(&self, page: &Page, identity: &AccountIdentity) -> Result<()> {
        self.click(page, MORE_ACCESS_BUTTON).await?;
        self.wait_for(page, MORE_ACCESS_MODAL).await?;

        let agency_input = self.wait_for(page, AGENCY_INPUT).await?;
        agency_input.click().await.map_err(cdp_err)?;
        type_slowly(&agency_input, identity.agency()).await?;

        let account_input = self.wait_for(page, ACCOUNT_INPUT).await?;
        account_input.click().await.map_err(cdp_err)?;
        type_slowly(&account_input, identity.account()).await?;

        // The consent banner covers the submit button when it shows up.
        if let Ok(banner) = page.find_element(COOKIE_BANNER_ACCEPT).await {
            let _ = banner.click().await;
        }

        self.click(page, MORE_ACCESS_SUBMIT).await?;
        tokio::time::sleep(SETTLE_DELAY).await;
        Ok(())
    }

    async fn submit_token(&self, page: &Page, token: &str) -> Result<()> {
        let input = self.wait_for(page, TOKEN_INPUT).await?;
        input.click().await.map_err(cdp_err)?;
        type_slowly(&input, token).await?;

        self.click(page, TOKEN_SUBMIT).await?;
        tokio::time::sleep(SETTLE_DELAY).await;
        Ok(())
    }

    /// Type the password on the portal's anti-keylogging keypad, where every
    /// on-screen key stands for two digits announced in its `aria-label`.
    async fn enter_password(&self, page: &Page, password: &str) -> Result<()> {
        self.wait_for(page, KEYPAD_KEYS).await?;
        let keys = page.find_elements(KEYPAD_KEYS).await.map_err(cdp_err)?;
        let lookup = keypad_lookup(&keys).await?;

        for digit in password.chars() {
            let idx = lookup.get(&digit).ok_or_else(|| {
                Error::Acquisition("secure keypad is missing a key for a password digit".into())
            })?;
            keys[*idx].click().await.map_err(cdp_err)?;
            tokio::time::sleep(KEYPAD_CLICK_PAUSE).await;
        }

        self.click(page, LOGIN_BUTTON).await?;
        // The card accordion is the first element unique to the account home.
        self.wait_for(page, CARD_ACCORDION).await?;
        Ok(())
    }

    async fn open_investments(&self, page: &Page) -> Result<()> {
        self.click(page, INVESTMENTS_ACCORDION).await?;
        self.click(page, INVESTMENTS_OPEN).await?;
        tokio::time::sleep(SETTLE_DELAY).await;
        Ok(())
    }

    async fn goto_home(&self, page: &Page) -> Result<()> {
        self.click(page, HOME_LOGO).await?;
        tokio::time::sleep(SETTLE_DELAY).await;
        Ok(())
    }

    async fn open_statement(&self, page: &Page) -> Result<()> {
        if page.find_element(VIEW_STATEMENT).await.is_err() {
            self.click(page, STATEMENT_ACCORDION).await?;
        }
        self.click(page, VIEW_STATEMENT).await?;
        tokio::time::sleep(SETTLE_DELAY).await;

        // The period dropdown lazy-loads its options; scan for the 90-day one.
        self.click(page, PERIOD_FILTER).await?;
        self.wait_for(page, PERIOD_FILTER_LIST).await?;
        let items = page.find_elements(PERIOD_FILTER_ITEMS).await.map_err(cdp_err)?;

        for item in items {
            let _ = item.scroll_into_view().await;
            if item.attribute("data-id").await.map_err(cdp_err)?.as_deref()
                == Some(STATEMENT_PERIOD_DAYS)
            {
                item.click().await.map_err(cdp_err)?;
                tokio::time::sleep(SETTLE_DELAY).await;
                return Ok(());
            }
        }

        Err(Error::Acquisition(
            "90-day option never appeared in the statement period filter".into(),
        ))
    }

    /// The card panel sometimes needs more than one expand click before the
    /// card table renders, so poll visibility up to a bound.
    async fn expand_cards(&self, page: &Page) -> Result<()> {
        for _ in 0..CARD_EXPAND_ATTEMPTS {
            if page.find_element(CARD_TABLE).await.is_ok() {
                return Ok(());
            }
            self.click(page, CARD_ACCORDION).await?;
            tokio::time::sleep(SETTLE_DELAY).await;
        }

        if page.find_element(CARD_TABLE).await.is_ok() {
            return Ok(());
        }
        Err(Error::Acquisition(
            "credit card panel never expanded".into(),
        ))
    }

    async fn wait_for(&self, page: &Page, selector: &str) -> Result<Element> {
        let timeout = Duration::from_secs(self.settings.step_timeout_secs);
        let start = Instant::now();
        loop {
            if let Ok(element) = page.find_element(selector).await {
                return Ok(element);
            }
            if start.elapsed() >= timeout {
                return Err(Error::Acquisition(format!("{selector} never appeared")));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&self, page: &Page, selector: &str) -> Result<()> {
        let element = self.wait_for(page, selector).await?;
        element.click().await.map_err(cdp_err)?;
        tokio::time::sleep(Duration::from_millis(self.settings.slow_motion_ms)).await;
        Ok(())
    }

    async fn launch(&self) -> Result<(Browser, chromiumoxide::handler::Handler)> {
        let chrome_path = match &self.settings.chrome_executable {
            Some(path) => path.clone(),
            None => find_chrome().ok_or_else(|| {
                Error::Acquisition(
                    "Chrome/Chromium not found; install it or set browser.chrome_executable"
                        .into(),
                )
            })?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .viewport(None)
            .arg(format!("--user-agent={USER_AGENT}"))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !self.settings.headless {
            builder = builder.with_head();
        }

        let config = builder
            .build()
            .map_err(|e| Error::Acquisition(format!("failed to configure browser: {e}")))?;

        Browser::launch(config)
            .await
            .map_err(|e| Error::Acquisition(format!("failed to launch browser: {e}")))
    }
}

/// Mutable accumulator for values observed in traffic during one
/// acquisition. Converted to immutable artifacts only on success.
#[derive(Debug, Clone, Default)]
struct Harvest {
    router_url: Option<String>,
    client_id: Option<String>,
    auth_token: Option<String>,
    codes: OperationCodes,
}

impl Harvest {
    fn set_opcode(&mut self, operation: Operation, opcode: String) {
        let slot = match operation {
            Operation::Statement => &mut self.codes.statement,
            Operation::CardList => &mut self.codes.card_list,
            Operation::CardDetail => &mut self.codes.card_detail,
            Operation::Investments => &mut self.codes.investments,
        };
        *slot = Some(opcode);
    }

    fn into_artifacts(self, captured_at: i64) -> Result<SessionArtifacts> {
        let router_url = self
            .router_url
            .ok_or_else(|| Error::Acquisition("routing endpoint URL was never observed".into()))?;
        let client_id = self
            .client_id
            .ok_or_else(|| Error::Acquisition("x-client-id header was never observed".into()))?;
        let auth_token = self
            .auth_token
            .ok_or_else(|| Error::Acquisition("x-auth-token header was never observed".into()))?;

        // Opcodes stay optional: a missing one fails only its operation.
        Ok(SessionArtifacts {
            router_url,
            client_id,
            auth_token,
            operations: self.codes,
            captured_at: Some(captured_at),
        })
    }
}

/// Register fetch-domain interception for the routing endpoint and the
/// investment host, then spawn the task that feeds every paused event
/// through the harvest accumulator and lets the request continue untouched.
async fn install_traffic_observers(
    page: &Page,
    harvest: Arc<Mutex<Harvest>>,
) -> Result<tokio::task::JoinHandle<()>> {
    let patterns = [ROUTER_PATH, INVESTMENT_HOST]
        .iter()
        .flat_map(|fragment| {
            [RequestStage::Request, RequestStage::Response].map(|stage| RequestPattern {
                url_pattern: Some(format!("*{fragment}*")),
                resource_type: None,
                request_stage: Some(stage),
            })
        })
        .collect::<Vec<_>>();

    page.execute(fetch::EnableParams {
        patterns: Some(patterns),
        handle_auth_requests: None,
    })
    .await
    .map_err(cdp_err)?;

    let mut events = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(cdp_err)?;

    let page_clone = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            harvest_from_event(&page_clone, &event, &harvest).await;

            let _ = page_clone
                .execute(ContinueRequestParams {
                    request_id: event.request_id.clone(),
                    url: None,
                    method: None,
                    post_data: None,
                    headers: None,
                    intercept_response: None,
                })
                .await;
        }
    }))
}

async fn harvest_from_event(
    page: &Page,
    event: &EventRequestPaused,
    harvest: &Arc<Mutex<Harvest>>,
) {
    let url = event.request.url.as_str();
    if !url.contains(ROUTER_PATH) && !url.contains(INVESTMENT_HOST) {
        return;
    }

    if event.response_status_code.is_some() {
        // Response stage: security headers, and the investment opcode, which
        // is only identifiable by a marker in the response body.
        if let Some(headers) = &event.response_headers {
            let mut guard = harvest.lock().await;
            for header in headers {
                if header.name.eq_ignore_ascii_case("x-client-id") && guard.client_id.is_none() {
                    guard.client_id = Some(header.value.clone());
                }
                if header.name.eq_ignore_ascii_case("x-auth-token") && guard.auth_token.is_none() {
                    guard.auth_token = Some(header.value.clone());
                }
            }
        }

        let wanted = harvest.lock().await.codes.investments.is_none();
        if wanted {
            if let Some(body) = response_body_text(page, event).await {
                if body.contains(INVESTMENT_RESPONSE_MARKER) {
                    if let Some(opcode) = header_value(&event.request.headers, "op") {
                        debug!("captured investments opcode");
                        harvest
                            .lock()
                            .await
                            .set_opcode(Operation::Investments, opcode);
                    }
                }
            }
        }
    } else {
        // Request stage: routing URL plus any opcode whose request body is
        // recognizable on its own.
        let mut guard = harvest.lock().await;
        if url.contains(ROUTER_PATH) && guard.router_url.is_none() {
            debug!(url, "captured routing endpoint");
            guard.router_url = Some(url.to_string());
        }

        if let Some(body) = request_post_body(event) {
            if let Some(operation) = classify_request_body(&body) {
                if let Some(opcode) = header_value(&event.request.headers, "op") {
                    debug!(%operation, "captured opcode");
                    guard.set_opcode(operation, opcode);
                }
            }
        }
    }
}

/// Match a request body against the known per-operation markers. Card-detail
/// requests carry a JSON array of card ids rather than a fixed literal, so
/// they are recognized by the array brackets alone.
fn classify_request_body(body: &str) -> Option<Operation> {
    if body.contains(Operation::Statement.form_body().unwrap()) {
        Some(Operation::Statement)
    } else if body.contains(Operation::CardList.form_body().unwrap()) {
        Some(Operation::CardList)
    } else if body.contains('[') && body.contains(']') {
        Some(Operation::CardDetail)
    } else {
        None
    }
}

/// Reconstruct the request body text from the intercepted request. CDP delivers
/// post data as base64-encoded entries (`postDataEntries`), so decode and
/// concatenate them, mirroring the response-body handling below.
fn request_post_body(event: &EventRequestPaused) -> Option<String> {
    let entries = event.request.post_data_entries.as_ref()?;
    let mut body = Vec::new();
    for entry in entries {
        let bytes = entry.bytes.as_ref()?;
        let decoded = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            bytes,
        )
        .ok()?;
        body.extend_from_slice(&decoded);
    }
    Some(String::from_utf8_lossy(&body).to_string())
}

async fn response_body_text(page: &Page, event: &EventRequestPaused) -> Option<String> {
    let response = page
        .execute(fetch::GetResponseBodyParams::new(event.request_id.clone()))
        .await
        .ok()?;

    if response.base64_encoded {
        let decoded = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            &response.body,
        )
        .ok()?;
        Some(String::from_utf8_lossy(&decoded).to_string())
    } else {
        Some(response.body.clone())
    }
}

fn header_value(headers: &Headers, name: &str) -> Option<String> {
    headers.inner().as_object().and_then(|map| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.as_str())
            .map(str::to_string)
    })
}

/// Build the digit -> key index table for the secure keypad. Each key's
/// `aria-label` announces both digits it can type, e.g. `"1 ou 3"`.
async fn keypad_lookup(keys: &[Element]) -> Result<HashMap<char, usize>> {
    let mut lookup = HashMap::new();
    for (idx, key) in keys.iter().enumerate() {
        let label = key
            .attribute("aria-label")
            .await
            .map_err(cdp_err)?
            .unwrap_or_default();
        if let Some((first, second)) = parse_keypad_label(&label) {
            lookup.insert(first, idx);
            lookup.insert(second, idx);
        }
    }
    Ok(lookup)
}

fn parse_keypad_label(label: &str) -> Option<(char, char)> {
    let mut parts = label.split_whitespace();
    let first = parts.next()?.chars().next()?;
    let second = parts.nth(1)?.chars().next()?;
    if first.is_ascii_digit() && second.is_ascii_digit() {
        Some((first, second))
    } else {
        None
    }
}

async fn type_slowly(element: &Element, text: &str) -> Result<()> {
    for ch in text.chars() {
        element
            .type_str(ch.to_string())
            .await
            .map_err(cdp_err)?;
        tokio::time::sleep(TYPE_DELAY).await;
    }
    Ok(())
}

fn cdp_err(err: chromiumoxide::error::CdpError) -> Error {
    Error::Acquisition(err.to_string())
}

/// Find a Chrome/Chromium executable.
fn find_chrome() -> Option<String> {
    for name in ["google-chrome", "chromium"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/run/current-system/sw/bin/google-chrome",
        "/run/current-system/sw/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    for candidate in candidates {
        if std::path::Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypad_labels_yield_both_digits() {
        assert_eq!(parse_keypad_label("1 ou 3"), Some(('1', '3')));
        assert_eq!(parse_keypad_label("0 ou 7"), Some(('0', '7')));
        assert_eq!(parse_keypad_label("limpar"), None);
        assert_eq!(parse_keypad_label(""), None);
    }

    #[test]
    fn request_bodies_classify_by_marker() {
        assert_eq!(
            classify_request_body("filtro=periodoVisualizacao&valor=90"),
            Some(Operation::Statement)
        );
        assert_eq!(
            classify_request_body("secao=Cartoes&item=Home"),
            Some(Operation::CardList)
        );
        assert_eq!(
            classify_request_body(r#"["card-1","card-2"]"#),
            Some(Operation::CardDetail)
        );
        assert_eq!(classify_request_body("foo=bar"), None);
    }

    #[test]
    fn harvest_requires_url_and_tokens_but_not_opcodes() {
        let mut harvest = Harvest {
            router_url: Some("https://x/router-app/router".into()),
            client_id: Some("client".into()),
            auth_token: Some("token".into()),
            ..Harvest::default()
        };
        harvest.set_opcode(Operation::Statement, "op-1".into());

        let artifacts = harvest.clone().into_artifacts(123).unwrap();
        assert_eq!(artifacts.operations.statement.as_deref(), Some("op-1"));
        assert_eq!(artifacts.operations.investments, None);
        assert_eq!(artifacts.captured_at, Some(123));

        harvest.auth_token = None;
        assert!(matches!(
            harvest.into_artifacts(123),
            Err(Error::Acquisition(_))
        ));
    }
}
