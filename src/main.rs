use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use coinledger::clock::{Clock, SystemClock};
use coinledger::config::{default_config_path, ResolvedConfig};
use coinledger::ledger::{LedgerError, LedgerService, NewAsset, NewTransaction};
use coinledger::market_data::providers::CoinGeckoFeed;
use coinledger::market_data::{JsonPriceCacheStore, MarketDataService, NoopPriceFeed, PriceFeed};
use coinledger::models::{Id, TransactionType, TypeFilter};
use coinledger::portfolio::{DateBound, DateRange, PortfolioService};
use coinledger::snapshot::SnapshotRecorder;
use coinledger::storage::{JsonFileStorage, Storage};

#[derive(Parser)]
#[command(name = "coinledger")]
#[command(about = "Crypto portfolio ledger with average-cost accounting")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the price feed and use last known prices only
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the resolved configuration
    Config,
    /// Manage tracked assets
    #[command(subcommand)]
    Asset(AssetCommand),
    /// Manage transactions
    #[command(subcommand)]
    Tx(TxCommand),
    /// Value current holdings with live prices
    Portfolio {
        /// Display currency (defaults to the configured one)
        #[arg(long)]
        currency: Option<String>,
    },
    /// Investment, sales and holdings for a period
    Stats {
        #[arg(long)]
        year: Option<i32>,
        /// Month of `--year` (or of the current year), 1-12
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        /// Start bound, RFC 3339 or `YYYY-MM-DD[ HH:MM]` in the configured zone
        #[arg(long, conflicts_with_all = ["year", "month"])]
        from: Option<String>,
        #[arg(long, conflicts_with_all = ["year", "month"])]
        to: Option<String>,
    },
    /// Daily value history
    #[command(subcommand)]
    Snapshot(SnapshotCommand),
    /// Historical price series for one feed id
    History {
        feed_id: String,
        #[arg(long, default_value_t = 30)]
        days: u32,
        #[arg(long)]
        currency: Option<String>,
    },
}

#[derive(Subcommand)]
enum AssetCommand {
    Add {
        symbol: String,
        name: String,
        /// Price feed id, e.g. `bitcoin`
        feed_id: String,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long, default_value = "")]
        location: String,
    },
    List,
    Remove { id: String },
}

#[derive(Subcommand)]
enum TxCommand {
    Add {
        /// Asset id
        asset: String,
        /// Buy, Sell, Transfer, Airdrop, Staking Reward, Interest or Gift
        #[arg(value_parser = parse_type)]
        kind: TransactionType,
        quantity: Decimal,
        /// USD per unit
        #[arg(long, default_value = "0")]
        price: Decimal,
        /// Defaults to quantity * price
        #[arg(long)]
        total: Option<Decimal>,
        /// Defaults to now
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    List {
        #[arg(long, value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,
    },
    Remove { id: String },
}

#[derive(Subcommand)]
enum SnapshotCommand {
    /// Value the portfolio in JPY and store it as today's snapshot
    Record,
    History {
        #[arg(long, default_value_t = 30)]
        days: usize,
    },
    Latest,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum FilterArg {
    All,
    CostBased,
    CostFree,
}

impl From<FilterArg> for TypeFilter {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::All => TypeFilter::All,
            FilterArg::CostBased => TypeFilter::CostBased,
            FilterArg::CostFree => TypeFilter::CostFree,
        }
    }
}

fn parse_type(s: &str) -> Result<TransactionType, String> {
    s.parse()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn parse_id(raw: &str) -> Result<Id> {
    Ok(Id::parse(raw)?)
}

struct App {
    config: ResolvedConfig,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    market_data: Arc<MarketDataService>,
}

impl App {
    fn build(config: ResolvedConfig, offline: bool) -> Result<Self> {
        let storage: Arc<dyn Storage> = Arc::new(JsonFileStorage::new(&config.data_dir));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let feed: Arc<dyn PriceFeed> = if offline {
            Arc::new(NoopPriceFeed)
        } else {
            let mut coingecko = CoinGeckoFeed::with_timeout(config.prices.request_timeout)?
                .with_max_retries(config.prices.max_retries);
            if let Some(base_url) = &config.prices.base_url {
                coingecko = coingecko.with_base_url(base_url.clone());
            }
            Arc::new(coingecko)
        };
        let market_data = MarketDataService::new(
            Arc::new(JsonPriceCacheStore::new(&config.data_dir)),
            feed,
        )
        .with_clock(clock.clone())
        .with_ttl(config.cache_ttl());

        Ok(Self {
            config,
            storage,
            clock,
            market_data: Arc::new(market_data),
        })
    }

    fn ledger(&self) -> LedgerService {
        LedgerService::new(self.storage.clone())
            .with_clock(self.clock.clone())
            .with_duplicate_tolerance(self.config.duplicate_tolerance())
    }

    fn portfolio(&self) -> PortfolioService {
        PortfolioService::new(self.storage.clone(), self.market_data.clone())
            .with_clock(self.clock.clone())
            .with_timezone(self.config.timezone)
    }

    fn snapshots(&self) -> SnapshotRecorder {
        SnapshotRecorder::new(self.storage.clone())
            .with_clock(self.clock.clone())
            .with_timezone(self.config.timezone)
    }

    fn currency(&self, requested: Option<String>) -> String {
        requested.unwrap_or_else(|| self.config.display_currency.clone())
    }

    fn stats_range(
        &self,
        year: Option<i32>,
        month: Option<u32>,
        from: Option<String>,
        to: Option<String>,
    ) -> Result<DateRange> {
        let tz = self.config.timezone;
        let range = match (year, month) {
            (Some(year), None) => DateRange::year(year, tz),
            (year, Some(month)) => {
                let year = year.unwrap_or_else(|| self.clock.today_in(tz).year());
                DateRange::month(year, month, tz)
            }
            (None, None) => {
                let parse = |raw: Option<String>, end: bool| -> Result<Option<DateBound>> {
                    raw.map(|s| {
                        DateBound::parse(&s, end).with_context(|| format!("Invalid date: {s}"))
                    })
                    .transpose()
                };
                Some(DateRange::between(parse(from, false)?, parse(to, true)?, tz))
            }
        };
        range.context("Date out of range")
    }

    async fn run(&self, command: Command, config_path: PathBuf) -> Result<()> {
        match command {
            Command::Config => print_json(&serde_json::json!({
                "config_file": config_path,
                "resolved": &self.config,
            })),
            Command::Asset(cmd) => self.run_asset(cmd).await,
            Command::Tx(cmd) => self.run_tx(cmd).await,
            Command::Portfolio { currency } => {
                let report = self.portfolio().report(&self.currency(currency)).await?;
                print_json(&report)
            }
            Command::Stats {
                year,
                month,
                from,
                to,
            } => {
                let range = self.stats_range(year, month, from, to)?;
                print_json(&self.portfolio().statistics(&range).await?)
            }
            Command::Snapshot(cmd) => self.run_snapshot(cmd).await,
            Command::History {
                feed_id,
                days,
                currency,
            } => {
                let series = self
                    .portfolio()
                    .price_history(&feed_id, &self.currency(currency), days)
                    .await?;
                print_json(&series)
            }
        }
    }

    async fn run_asset(&self, cmd: AssetCommand) -> Result<()> {
        let ledger = self.ledger();
        match cmd {
            AssetCommand::Add {
                symbol,
                name,
                feed_id,
                icon,
                location,
            } => {
                let asset = ledger
                    .add_asset(NewAsset {
                        symbol,
                        name,
                        price_feed_id: feed_id,
                        icon,
                        location,
                    })
                    .await?;
                print_json(&asset)
            }
            AssetCommand::List => print_json(&ledger.list_assets().await?),
            AssetCommand::Remove { id } => {
                let id = parse_id(&id)?;
                ledger.delete_asset(&id).await?;
                print_json(&serde_json::json!({ "deleted": id }))
            }
        }
    }

    async fn run_tx(&self, cmd: TxCommand) -> Result<()> {
        let ledger = self.ledger();
        match cmd {
            TxCommand::Add {
                asset,
                kind,
                quantity,
                price,
                total,
                date,
                notes,
            } => {
                let date = match date {
                    Some(raw) => DateBound::parse(&raw, false)
                        .with_context(|| format!("Invalid date: {raw}"))?
                        .to_utc(self.config.timezone),
                    None => self.clock.now(),
                };
                let recorded = ledger
                    .add_transaction(NewTransaction {
                        date,
                        kind,
                        asset_id: parse_id(&asset)?,
                        quantity,
                        unit_price: price,
                        total_amount: total,
                        notes,
                    })
                    .await?;
                print_json(&recorded)
            }
            TxCommand::List { filter } => print_json(&ledger.list_transactions(filter.into()).await?),
            TxCommand::Remove { id } => {
                let id = parse_id(&id)?;
                ledger.delete_transaction(&id).await?;
                print_json(&serde_json::json!({ "deleted": id }))
            }
        }
    }

    async fn run_snapshot(&self, cmd: SnapshotCommand) -> Result<()> {
        let snapshots = self.snapshots();
        match cmd {
            SnapshotCommand::Record => {
                let valuation = self.portfolio().valuation("jpy").await?;
                print_json(&snapshots.record_valuation(&valuation).await?)
            }
            SnapshotCommand::History { days } => print_json(&snapshots.history(days).await?),
            SnapshotCommand::Latest => print_json(&snapshots.latest().await?),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .json(),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code(&e)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = ResolvedConfig::load_or_default(&config_path)?;

    let app = App::build(config, cli.offline)?;
    app.run(cli.command, config_path).await
}

/// 2 for rejected ledger requests, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<LedgerError>() {
        Some(ledger) if ledger.is_user_error() => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}
