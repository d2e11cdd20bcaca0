use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use marketfeed::cache::{CacheRead, Freshness};
use marketfeed::config;
use marketfeed::errors::CacheResult;
use marketfeed::logger::{self, LogTag};
use marketfeed::marketdata::MarketDataService;
use serde::Serialize;
use std::time::Duration;

/// Cached crypto market data from CoinGecko and CryptoCompare
///
/// Logging flags (`--debug-<tag>`, `--verbose`, `--quiet`) may appear anywhere.
#[derive(Parser)]
#[command(name = "marketfeed", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = config::CONFIG_FILE_PATH)]
    config: String,

    /// Run the command this many times (watch fresh hits and stale fallback)
    #[arg(long, global = true, default_value_t = 1)]
    repeat: u32,

    /// Pause between repeated runs
    #[arg(long, global = true, default_value_t = 1000)]
    interval_ms: u64,

    /// Print cache counters when done
    #[arg(long, global = true)]
    stats: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum CoinView {
    Basic,
    Details,
    Stats,
}

#[derive(Subcommand)]
enum Command {
    /// Ranked coin listing
    Coins {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 50)]
        per_page: u32,
    },
    /// Single coin by CoinGecko id
    Coin {
        id: String,
        #[arg(long, value_enum, default_value = "basic")]
        view: CoinView,
    },
    /// Price history by day count or period (1h, 24h, 7d, 30d, 1y)
    History {
        id: String,
        #[arg(long)]
        days: Option<u32>,
        #[arg(long, default_value = "7d")]
        period: String,
    },
    Search {
        query: String,
    },
    Trending,
    /// Global totals with BTC and ETH prices
    Overview,
    Gainers {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    Losers {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    News {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Only the featured articles
        #[arg(long)]
        featured: bool,
        /// Single article by id
        #[arg(long)]
        id: Option<String>,
    },
    /// OHLCV candles (1m, 5m, 1h, 1d)
    Ohlcv {
        coin_id: String,
        #[arg(long, default_value = "1d")]
        period: String,
    },
    Convert {
        from: String,
        to: String,
        amount: f64,
    },
    /// Compare a comma separated list of coin ids
    Compare {
        ids: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logger flags are free-form (--debug-<tag>), keep them away from clap
    let mut log_args = Vec::new();
    let mut cli_args = Vec::new();
    for (i, arg) in std::env::args().enumerate() {
        if i > 0 && logger::is_logger_flag(&arg) {
            log_args.push(arg);
        } else {
            cli_args.push(arg);
        }
    }

    logger::set_logger_config(logger::config_from_args(&log_args));
    let cli = Cli::parse_from(cli_args);

    config::load_config_from_path(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config))?;
    let cfg = config::get_config_clone();

    let service = MarketDataService::from_config(&cfg)
        .map_err(anyhow::Error::msg)
        .context("building market data service")?;

    if cli.repeat > 1 {
        if let Some(interval) = cfg.cache.sweep_interval() {
            let _sweeper = service.cache().store().spawn_sweeper(interval);
        }
    }

    let mut last_error = None;
    for run in 1..=cli.repeat.max(1) {
        if run > 1 {
            tokio::time::sleep(Duration::from_millis(cli.interval_ms)).await;
        }
        if let Err(e) = run_command(&service, &cli.command).await {
            logger::error(LogTag::System, &format!("{:#}", e));
            last_error = Some(e);
        }
    }

    if cli.stats {
        let stats = service.cache().stats();
        println!("{}", "cache stats".bold());
        println!("{}", serde_json::to_string_pretty(&stats)?);
        println!("hit rate: {:.1}%", stats.hit_rate() * 100.0);
    }

    match last_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn run_command(service: &MarketDataService, command: &Command) -> Result<()> {
    match command {
        Command::Coins { page, per_page } => report(service.coins(*page, *per_page).await),
        Command::Coin { id, view } => match view {
            CoinView::Basic => report(service.coin(id).await),
            CoinView::Details => report(service.coin_details(id).await),
            CoinView::Stats => report(service.market_stats(id).await),
        },
        Command::History { id, days, period } => match days {
            Some(days) => report(service.price_history(id, *days).await),
            None => report(service.price_history_by_period(id, period).await),
        },
        Command::Search { query } => report(service.search(query).await),
        Command::Trending => report(service.trending().await),
        Command::Overview => report(service.market_overview().await),
        Command::Gainers { limit } => report(service.top_gainers(*limit).await),
        Command::Losers { limit } => report(service.top_losers(*limit).await),
        Command::News {
            page,
            limit,
            featured,
            id,
        } => match (id, featured) {
            (Some(id), _) => report(service.news_by_id(id).await),
            (None, true) => report(service.featured_news().await),
            (None, false) => report(service.news(*page, *limit).await),
        },
        Command::Ohlcv { coin_id, period } => report(service.ohlcv(coin_id, period).await),
        Command::Convert { from, to, amount } => {
            report(service.convert(from, to, *amount).await)
        }
        Command::Compare { ids } => report(service.compare(ids).await),
    }
}

fn report<T: Serialize>(result: CacheResult<CacheRead<T>>) -> Result<()> {
    let read = result?;
    println!("{}", serde_json::to_string_pretty(read.value.as_ref())?);

    let freshness = match read.freshness {
        Freshness::Fresh => read.freshness.as_str().green(),
        Freshness::Fetched => read.freshness.as_str().cyan(),
        Freshness::Stale => read.freshness.as_str().yellow().bold(),
    };
    println!("{} {}", "freshness:".dimmed(), freshness);
    Ok(())
}
