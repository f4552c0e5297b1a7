use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use itau_sync::config::Config;
use itau_sync::format::{format_brl, format_brl_f64, to_display_date};
use itau_sync::models::{normalize_identifier, AccountIdentity};
use itau_sync::service::BankService;
use itau_sync::session::{
    Acquirer, BrowserSessionSource, SessionSource, SessionStore, TerminalOtpPrompter,
};

#[derive(Parser)]
#[command(name = "itau-sync")]
#[command(about = "Itaú consumer-portal scraper")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "itau-sync.toml")]
    config: PathBuf,

    /// Agency number (hyphens and periods are stripped)
    #[arg(short, long)]
    agency: String,

    /// Account number (hyphens and periods are stripped)
    #[arg(short = 'n', long)]
    account: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in through the portal and store fresh session artifacts
    Login,
    /// Re-run the browser login using the stored identity
    RefreshSession,
    /// Available balance
    Balance,
    /// Statement for the last 90 days
    Statement,
    /// Credit cards with their current invoices
    Cards,
    /// Consolidated investments by category
    Investments,
    /// Individual real-estate-fund holdings
    Fiis,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    match &cli.command {
        Command::Login => login(&cli, &config).await,
        Command::RefreshSession => refresh_session(&cli, &config).await,
        Command::Balance => balance(&cli, &config).await,
        Command::Statement => statement(&cli, &config).await,
        Command::Cards => cards(&cli, &config).await,
        Command::Investments => investments(&cli, &config).await,
        Command::Fiis => fiis(&cli, &config).await,
    }
}

fn open_store(config: &Config) -> Result<SessionStore> {
    let store = match &config.cache_dir {
        Some(dir) => SessionStore::with_path(dir)?,
        None => SessionStore::new()?,
    };
    Ok(store)
}

fn prompt_password() -> Result<String> {
    let password = dialoguer::Password::new()
        .with_prompt("Account password (6 digits)")
        .interact()?;
    Ok(password)
}

async fn login(cli: &Cli, config: &Config) -> Result<()> {
    let password = prompt_password()?;
    let identity = AccountIdentity::new(&cli.agency, &cli.account, &password)?;

    let acquirer = Acquirer::new(config.browser.clone());
    let artifacts = acquirer.acquire(&identity, &TerminalOtpPrompter).await?;

    let store = open_store(config)?;
    store.save_identity(&identity)?;
    store.save(&identity, &artifacts)?;

    println!(
        "Logged in to account {} (agency {}); session artifacts saved.",
        identity.account(),
        identity.agency()
    );
    Ok(())
}

fn stored_identity(cli: &Cli, config: &Config) -> Result<AccountIdentity> {
    let agency = normalize_identifier(&cli.agency);
    let account = normalize_identifier(&cli.account);
    let store = open_store(config)?;
    match store.load_identity(&agency, &account)? {
        Some(identity) => Ok(identity),
        None => bail!(
            "No stored identity for account {account} (agency {agency}); run `itau-sync login` first."
        ),
    }
}

async fn refresh_session(cli: &Cli, config: &Config) -> Result<()> {
    let identity = stored_identity(cli, config)?;
    let acquirer = Acquirer::new(config.browser.clone());
    let artifacts = acquirer.acquire(&identity, &TerminalOtpPrompter).await?;
    open_store(config)?.save(&identity, &artifacts)?;
    println!("Session refreshed.");
    Ok(())
}

/// Build the service for a data command: stored artifacts when present,
/// otherwise a fresh browser acquisition; expiry mid-command re-acquires
/// through the same source and persists the replacement.
async fn service_for(cli: &Cli, config: &Config) -> Result<BankService> {
    let identity = stored_identity(cli, config)?;
    let store = open_store(config)?;

    let source: Arc<dyn SessionSource> = Arc::new(
        BrowserSessionSource::new(
            Acquirer::new(config.browser.clone()),
            identity.clone(),
            Arc::new(TerminalOtpPrompter),
        )
        .with_store(open_store(config)?),
    );

    let artifacts = match store.load(&identity)? {
        Some(artifacts) => artifacts,
        None => source.acquire().await?,
    };

    Ok(BankService::new(artifacts, source)?)
}

async fn balance(cli: &Cli, config: &Config) -> Result<()> {
    let mut service = service_for(cli, config).await?;
    let balance = service.available_balance().await?;
    println!("Available balance: {}", format_brl(balance));
    Ok(())
}

async fn statement(cli: &Cli, config: &Config) -> Result<()> {
    let mut service = service_for(cli, config).await?;
    let statement = service.account_statement().await?;

    println!(
        "{} transactions in the last 90 days",
        statement.transactions.len()
    );
    println!("## Date - Direction - Amount - Description ##");
    for tx in &statement.transactions {
        println!(
            "{} - {} - {} - {}",
            to_display_date(tx.date),
            tx.direction,
            format_brl(tx.amount),
            tx.description
        );
    }
    println!("Available balance: {}", format_brl(statement.available_balance));
    Ok(())
}

async fn cards(cli: &Cli, config: &Config) -> Result<()> {
    let mut service = service_for(cli, config).await?;
    let cards = service.credit_cards().await?;

    println!("{} credit cards with invoices", cards.len());
    println!("## Due date - Number - Name - Invoice total ##");
    for card in &cards {
        println!(
            "{} - {} - {} - {}",
            to_display_date(card.open_invoice.due_date),
            card.masked_number,
            card.name,
            format_brl(card.open_invoice.total)
        );
    }
    Ok(())
}

async fn investments(cli: &Cli, config: &Config) -> Result<()> {
    let mut service = service_for(cli, config).await?;
    let positions = service.investments().await?;

    println!("## Share - Category - Amount ##");
    for position in &positions {
        println!(
            "{}% - {} - {}",
            position.percentage,
            position.category,
            format_brl_f64(position.amount)
        );
    }
    Ok(())
}

async fn fiis(cli: &Cli, config: &Config) -> Result<()> {
    let mut service = service_for(cli, config).await?;
    let funds = service.real_estate_funds().await?;

    println!("## Code - Amount - Name ##");
    for fund in &funds {
        println!(
            "{} - {} - {}",
            fund.code,
            format_brl_f64(fund.amount),
            fund.name
        );
    }
    Ok(())
}
