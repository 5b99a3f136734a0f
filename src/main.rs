use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use trendscan::alerts::format::sample_record;
use trendscan::alerts::AlertChannel;
use trendscan::config::Settings;
use trendscan::report::render_table;
use trendscan::scanner::{run_scheduled, Scanner};
use trendscan::strategy::{SignalMode, SupertrendEmaStrategy};
use trendscan::{Result, Timeframe, YahooClient};

#[derive(Debug, Parser)]
#[command(name = "trendscan", version, about = "EMA + Supertrend signal scanner with ATR exits")]
struct Cli {
    /// Config file (defaults to ./trendscan.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bar interval: 5m, 15m, 1h or 1d
    #[arg(short, long, global = true)]
    timeframe: Option<Timeframe>,

    /// Comma separated tickers, replaces the configured universe
    #[arg(short, long, global = true)]
    symbols: Option<String>,

    /// Entry rule: flip_confirmed or state_filter
    #[arg(short, long, global = true)]
    mode: Option<SignalMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan once and print a results table
    Scan {
        /// Also list symbols without a signal
        #[arg(long)]
        all: bool,
    },
    /// Scan on a schedule, sending alerts and journaling signals
    Watch {
        /// Keep scanning outside market hours
        #[arg(long)]
        ignore_market_hours: bool,
    },
    /// Send the sample signal through one alert channel
    TestAlert {
        #[arg(long, value_enum)]
        channel: ChannelArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ChannelArg {
    Telegram,
    Sms,
    Whatsapp,
}

impl ChannelArg {
    fn as_str(self) -> &'static str {
        match self {
            ChannelArg::Telegram => "telegram",
            ChannelArg::Sms => "sms",
            ChannelArg::Whatsapp => "whatsapp",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(timeframe) = cli.timeframe {
        settings.scan.timeframe = timeframe.to_string();
    }
    if let Some(symbols) = cli.symbols {
        settings.scan.symbols = Some(symbols);
    }
    if let Some(mode) = cli.mode {
        settings.strategy.signal_mode = mode.to_string();
    }

    match cli.command {
        Command::Scan { all } => {
            let scanner = build_scanner(&settings, false)?;
            let symbols = settings.scan.symbols()?;
            let report = scanner.scan(&symbols).await;
            print!("{}", render_table(&report, all));
        }
        Command::Watch {
            ignore_market_hours,
        } => {
            settings.scan.ignore_market_hours |= ignore_market_hours;
            let scanner = build_scanner(&settings, true)?;
            let symbols = settings.scan.symbols()?;
            let schedule = settings.scan.schedule()?;

            tracing::info!("🚀 trendscan watching {} symbols", symbols.len());
            tracing::info!("Press Ctrl+C to stop...");

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                }
            };
            let scans = run_scheduled(&scanner, &symbols, &schedule, shutdown).await;
            tracing::info!("👋 trendscan stopped after {} scans", scans);
        }
        Command::TestAlert { channel } => {
            let channel = settings.alerts.channel(channel.as_str())?;
            channel.send(&sample_record()).await?;
            tracing::info!("✅ Test alert sent via {}", channel.name());
        }
    }

    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trendscan=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_scanner(settings: &Settings, notify: bool) -> anyhow::Result<Scanner> {
    let config = settings.strategy.signal_config()?;
    let timeframe = settings.scan.timeframe()?;

    tracing::info!(
        ema = config.ema_period,
        supertrend_atr = config.supertrend_atr_period,
        multiplier = config.supertrend_multiplier,
        mode = %config.signal_mode,
        timeframe = %timeframe,
        "Strategy configured"
    );

    let mut scanner = Scanner::new(
        Arc::new(YahooClient::new()?),
        Arc::new(SupertrendEmaStrategy::new(config)),
    )
    .with_timeframe(timeframe)
    .with_concurrency(settings.scan.concurrency);

    if notify {
        let dispatcher = settings.alerts.dispatcher();
        if dispatcher.is_empty() {
            tracing::warn!("No alert channels configured, signals will only be logged");
        } else {
            tracing::info!(channels = ?dispatcher.channel_names(), "Alerts enabled");
        }
        scanner = scanner.with_dispatcher(dispatcher);

        for log in settings.journal.logs() {
            tracing::info!(log = log.name(), "Signal journal enabled");
            scanner = scanner.with_log(log);
        }
    }

    Ok(scanner)
}
