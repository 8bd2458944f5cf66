mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use analysis::{AnalysisConfig, Analyzer, AnalyzerSet};
use backtest::{BacktestConfig, Backtester};
use common::{Config, LogNotifier, MarketDataProvider, Notifier, Timeframe};
use engine::{render_table, scan, BinanceClient, CandleFile, Monitor, WatchItem};
use telegram_notify::TelegramNotifier;

#[derive(Parser)]
#[command(
    name = "smc-assistant",
    about = "Smart Money Concepts market structure analysis and signals"
)]
struct Cli {
    /// Symbols, comma separated (e.g. BTC/USDT,ETH/USDT). Defaults to DEFAULT_SYMBOL.
    #[arg(long, alias = "symbol", global = true, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Timeframes, comma separated (e.g. 1h,4h). Defaults to DEFAULT_TIMEFRAME.
    #[arg(long, alias = "timeframe", global = true, value_delimiter = ',')]
    timeframes: Vec<Timeframe>,

    /// Candles fetched per pair. Defaults to DEFAULT_LIMIT.
    #[arg(long, global = true)]
    limit: Option<usize>,

    /// Analysis thresholds TOML file. Overrides ANALYSIS_CONFIG_PATH.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read candles from a JSON file instead of the exchange.
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse each pair once and print the result.
    Analyze {
        /// Print the full analysis as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// One summary row per symbol and timeframe.
    Scan,
    /// Poll the pairs and send an alert when a signal changes.
    Monitor {
        /// Minutes between polling cycles.
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
    /// Replay the analysis bar by bar over historical candles.
    Backtest {
        /// Start date (YYYY-MM-DD). Without it the last `--limit` candles are used.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), inclusive. Defaults to now.
        #[arg(long)]
        end: Option<String>,

        /// Ignore signals below this confidence.
        #[arg(long, default_value_t = 0.0)]
        min_confidence: f64,

        /// Close a trade at the bar's close after this many bars.
        #[arg(long, default_value_t = 20)]
        max_hold: usize,

        /// Bars skipped before the first signal is considered.
        #[arg(long, default_value_t = 50)]
        warmup: usize,

        /// Also print every trade.
        #[arg(long, default_value_t = false)]
        trades: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cli = Cli::parse();
    let cfg = Config::from_env().context("invalid environment configuration")?;

    let symbols = if cli.symbols.is_empty() {
        vec![cfg.default_symbol.clone()]
    } else {
        cli.symbols.clone()
    };
    let timeframes = if cli.timeframes.is_empty() {
        vec![cfg.default_timeframe]
    } else {
        cli.timeframes.clone()
    };
    let watch_list: Vec<WatchItem> = symbols
        .iter()
        .flat_map(|s| timeframes.iter().map(move |&tf| WatchItem::new(s.clone(), tf)))
        .collect();
    let limit = cli.limit.unwrap_or(cfg.default_limit);

    let analyzers = build_analyzers(&cli, &cfg, &timeframes)?;

    // ── Market data ───────────────────────────────────────────────────────────
    let provider: Arc<dyn MarketDataProvider> = match &cli.file {
        Some(path) => {
            info!(path = %path.display(), "Using candle file");
            Arc::new(CandleFile::new(path))
        }
        None => Arc::new(BinanceClient::new(cfg.binance_base_url.clone())?),
    };

    match cli.command {
        Commands::Analyze { json } => {
            for item in &watch_list {
                let series = provider
                    .fetch_candles(&item.symbol, item.timeframe, limit)
                    .await
                    .with_context(|| format!("fetching candles for {item}"))?;
                let analysis = analyzers.get(item.timeframe).analyze(&series);
                if json {
                    println!("{}", serde_json::to_string_pretty(&analysis)?);
                } else {
                    println!("{}", output::render_analysis(item, &analysis));
                }
            }
        }
        Commands::Scan => {
            let rows = scan(provider, &analyzers, &watch_list, limit).await;
            print!("{}", render_table(&rows));
        }
        Commands::Monitor { interval } => {
            if interval == 0 {
                bail!("--interval must be at least 1 minute");
            }
            let notifier: Arc<dyn Notifier> = match cfg.telegram() {
                Some((token, chat_id)) => Arc::new(TelegramNotifier::new(token, chat_id)),
                None => {
                    warn!("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set, alerts go to the log");
                    Arc::new(LogNotifier)
                }
            };
            let monitor = Monitor::new(provider, notifier, analyzers, watch_list)
                .with_interval(Duration::from_secs(interval * 60))
                .with_limit(limit);
            monitor
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "Cannot listen for shutdown signal");
                        std::future::pending::<()>().await;
                    }
                })
                .await;
            info!("Shutdown signal received. Exiting.");
        }
        Commands::Backtest {
            start,
            end,
            min_confidence,
            max_hold,
            warmup,
            trades,
        } => {
            let config = BacktestConfig {
                warmup,
                min_confidence,
                max_hold,
                ..Default::default()
            };
            for item in &watch_list {
                let analyzer = Analyzer::clone(&analyzers.get(item.timeframe));
                let backtester = Backtester::new(analyzer, config.clone())?;
                let series = match &start {
                    Some(start) => {
                        let start = day_start(start)?;
                        let end = match &end {
                            Some(end) => day_end(end)?,
                            None => Utc::now(),
                        };
                        provider
                            .fetch_range(&item.symbol, item.timeframe, start, end)
                            .await
                    }
                    None => provider.fetch_candles(&item.symbol, item.timeframe, limit).await,
                }
                .with_context(|| format!("fetching candles for {item}"))?;

                info!(pair = %item, candles = series.len(), "Running backtest");
                let report = tokio::task::spawn_blocking(move || backtester.run(&series)).await?;

                println!("== {item} ==");
                println!("{report}");
                if trades {
                    print!("{}", output::render_trades(&report.trades));
                }
                println!();
            }
        }
    }

    Ok(())
}

/// A config file applies to every timeframe. Without one each timeframe
/// gets the default thresholds with its own swing lookback.
fn build_analyzers(cli: &Cli, cfg: &Config, timeframes: &[Timeframe]) -> Result<AnalyzerSet> {
    let path = cli
        .config
        .clone()
        .or_else(|| cfg.analysis_config_path.as_ref().map(PathBuf::from));
    match path {
        Some(path) => {
            let config = AnalysisConfig::load(&path.to_string_lossy())
                .with_context(|| format!("loading analysis config {}", path.display()))?;
            Ok(AnalyzerSet::uniform(Analyzer::new(config)?))
        }
        None => Ok(AnalyzerSet::per_timeframe(timeframes.iter().copied())?),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("'{s}' is not a YYYY-MM-DD date"))
}

fn day_start(s: &str) -> Result<DateTime<Utc>> {
    let naive = parse_date(s)?
        .and_hms_opt(0, 0, 0)
        .context("invalid start time")?;
    Ok(Utc.from_utc_datetime(&naive))
}

fn day_end(s: &str) -> Result<DateTime<Utc>> {
    let naive = parse_date(s)?
        .and_hms_opt(23, 59, 59)
        .context("invalid end time")?;
    Ok(Utc.from_utc_datetime(&naive))
}
