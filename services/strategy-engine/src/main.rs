use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use strategy_engine::{
    grid_search, report, Algorithm, AppConfig, BacktestSimulator, Market, ParameterGrid,
    ZScoreWindow,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "strategy-engine")]
#[command(about = "Mean reversion backtests and trading decisions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./strategy.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest the strategy over historical daily prices
    Backtest {
        /// CoinGecko token id (e.g., solana)
        #[arg(short, long)]
        token: Option<String>,

        /// Days of history
        #[arg(short, long)]
        days: Option<u32>,

        /// Starting cash
        #[arg(long)]
        balance: Option<f64>,

        #[arg(long)]
        z_threshold: Option<f64>,

        /// Stop-loss fraction (0.05 = 5%)
        #[arg(long)]
        stop_loss: Option<f64>,

        /// Take-profit fraction (0.10 = 10%)
        #[arg(long)]
        take_profit: Option<f64>,

        /// Use a trailing Z-score window of this many prices
        #[arg(long)]
        trailing_window: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Buy/Sell/Hold for the most recent price
    Decide {
        #[arg(short, long)]
        token: Option<String>,

        #[arg(short, long)]
        days: Option<u32>,

        /// Let the prediction service override the Z-score
        #[arg(long)]
        ai_override: bool,

        #[arg(long)]
        json: bool,
    },

    /// Backtest a grid of thresholds, stop-losses and take-profits
    Sweep {
        #[arg(short, long)]
        token: Option<String>,

        #[arg(short, long)]
        days: Option<u32>,

        /// Number of best results to print
        #[arg(long, default_value_t = 5)]
        top: usize,

        #[arg(long)]
        json: bool,
    },

    /// Current spot price
    Price {
        /// Ticker symbol (e.g., SOL)
        symbol: String,

        #[arg(long, default_value = "usd")]
        quote: String,
    },

    /// Token metadata
    Info {
        /// CoinGecko token id
        token: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            dotenvy::dotenv().ok();
            AppConfig::load_from(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => AppConfig::load().context("Failed to load configuration"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_ref())?;
    let market =
        Market::from_config(&config).context("Failed to set up market data clients")?;

    match cli.command {
        Commands::Backtest {
            token,
            days,
            balance,
            z_threshold,
            stop_loss,
            take_profit,
            trailing_window,
            json,
        } => {
            let mut params = config.backtest;
            if let Some(balance) = balance {
                params.initial_balance = balance;
            }
            if let Some(z) = z_threshold {
                params.z_threshold = z;
            }
            if let Some(sl) = stop_loss {
                params.stop_loss_pct = sl;
            }
            if let Some(tp) = take_profit {
                params.take_profit_pct = tp;
            }
            if let Some(size) = trailing_window {
                params.window = ZScoreWindow::Trailing(size);
            }
            let simulator = BacktestSimulator::new(params).context("Invalid backtest parameters")?;

            let token = token.unwrap_or_else(|| config.market.token.clone());
            let (token_id, series) = market
                .history(&token, days.unwrap_or(config.market.days))
                .await;

            info!("Backtesting {} over {} prices", token_id, series.len());
            let outcome = simulator.run(&series);

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", report::render(&outcome));
            }
            info!("{}", report::summary_line(&outcome));
        }

        Commands::Decide {
            token,
            days,
            ai_override,
            json,
        } => {
            let token = token.unwrap_or_else(|| config.market.token.clone());
            let (token_id, series) = market
                .history(&token, days.unwrap_or(config.market.days))
                .await;

            let prediction = if ai_override {
                market.prediction(&token_id).await
            } else {
                None
            };

            let strategy = config.decision;
            let decision = strategy.evaluate(&token_id, &series, ai_override, &prediction);
            info!("{} decision: {}", strategy.name(), decision.reason);

            if json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                println!(
                    "Mean Reversion Trading Decision for {}: {}",
                    token_id, decision.signal
                );
            }
        }

        Commands::Sweep {
            token,
            days,
            top,
            json,
        } => {
            let token = token.unwrap_or_else(|| config.market.token.clone());
            let (token_id, series) = market
                .history(&token, days.unwrap_or(config.market.days))
                .await;

            let grid = ParameterGrid {
                initial_balance: config.backtest.initial_balance,
                window: config.backtest.window,
                ..ParameterGrid::default()
            };
            info!(
                "Sweeping {} parameter combinations for {}",
                grid.combinations().len(),
                token_id
            );

            let mut results = tokio::task::spawn_blocking(move || grid_search(&series, &grid))
                .await
                .context("Grid search task failed")?;
            results.truncate(top);

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for result in &results {
                    println!(
                        "z={:.2} sl={:.0}% tp={:.0}% | {} | {}",
                        result.params.z_threshold,
                        result.params.stop_loss_pct * 100.0,
                        result.params.take_profit_pct * 100.0,
                        report::final_report_line(&result.outcome),
                        report::summary_line(&result.outcome)
                    );
                }
            }
        }

        Commands::Price { symbol, quote } => {
            let spot = market
                .client()
                .get_price(&symbol, &quote)
                .await
                .with_context(|| format!("Failed to fetch {} price", symbol))?;
            println!("{} Price: ${}", symbol.to_uppercase(), spot.price);
        }

        Commands::Info { token } => {
            let client = market.client();
            let resolved = market
                .fallback()
                .resolve(&token, |t| async move { client.get_token_info(&t).await })
                .await
                .with_context(|| format!("Failed to fetch token info for {}", token))?;

            if resolved.substituted {
                println!("{} not found, showing {}", token, resolved.token_id);
            }
            let info = resolved.value;
            println!("{} ({})", info.name, info.symbol);
            let fields = [
                ("Website", info.website),
                ("Twitter", info.twitter),
                ("Reddit", info.reddit),
                ("Image", info.image),
            ];
            for (label, value) in fields {
                if let Some(value) = value {
                    println!("{}: {}", label, value);
                }
            }
            if let Some(market_cap) = info.market_cap_usd {
                println!("Market Cap: ${:.0}", market_cap);
            }
            if let Some(fdv) = info.fdv_usd {
                println!("FDV: ${:.0}", fdv);
            }
            if let Some(max_supply) = info.max_supply {
                println!("Max Supply: {:.0}", max_supply);
            }
        }
    }

    Ok(())
}
