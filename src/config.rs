use crate::alerts::{
    AlertChannel, AlertDispatcher, SmsChannel, TelegramChannel, TwilioCredentials, WhatsAppChannel,
};
use crate::models::Timeframe;
use crate::persistence::{CsvSignalLog, GoogleSheetsLog, SignalLog};
use crate::scanner::{MarketHours, ScheduleConfig};
use crate::strategy::{ExitPolicy, SignalConfig, SignalMode};
use crate::universe::{parse_symbol_list, Universe};
use anyhow::{anyhow, Context};
use chrono::NaiveTime;
use chrono_tz::Tz;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "trendscan.toml";
const ENV_PREFIX: &str = "TRENDSCAN";

/// Credential variables read directly from the environment, and the keys they
/// override
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("TELEGRAM_BOT_TOKEN", "alerts.telegram_bot_token"),
    ("TELEGRAM_CHAT_ID", "alerts.telegram_chat_id"),
    ("TWILIO_ACCOUNT_SID", "alerts.twilio_account_sid"),
    ("TWILIO_AUTH_TOKEN", "alerts.twilio_auth_token"),
    ("TWILIO_PHONE_NUMBER", "alerts.twilio_phone_number"),
    ("TWILIO_WHATSAPP_NUMBER", "alerts.twilio_whatsapp_number"),
    ("USER_PHONE_NUMBER", "alerts.sms_to"),
    ("USER_WHATSAPP_NUMBER", "alerts.whatsapp_to"),
    ("GOOGLE_SHEET_ID", "journal.google_sheet_id"),
    ("GOOGLE_SHEETS_ACCESS_TOKEN", "journal.google_access_token"),
];

/// Top-level settings, layered from defaults, `trendscan.toml` and the
/// environment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub strategy: StrategySettings,
    pub scan: ScanSettings,
    pub alerts: AlertSettings,
    pub journal: JournalSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub ema_period: usize,
    pub supertrend_atr_period: usize,
    pub supertrend_multiplier: f64,
    /// `atr` for ATR-multiple exits, `supertrend_band` for band stops
    pub exit_mode: String,
    pub exit_atr_period: usize,
    /// Size exits off the Supertrend ATR and ignore `exit_atr_period`
    pub exit_atr_reuse_supertrend: bool,
    pub sl_multiplier: f64,
    pub tp_multiplier: f64,
    pub signal_mode: String,
    pub guard_margin: usize,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            ema_period: 30,
            supertrend_atr_period: 10,
            supertrend_multiplier: 2.0,
            exit_mode: "atr".to_string(),
            exit_atr_period: 14,
            exit_atr_reuse_supertrend: false,
            sl_multiplier: 1.5,
            tp_multiplier: 3.0,
            signal_mode: "flip_confirmed".to_string(),
            guard_margin: 2,
        }
    }
}

impl StrategySettings {
    /// Build and validate the engine parameters
    pub fn signal_config(&self) -> anyhow::Result<SignalConfig> {
        let exit = match self.exit_mode.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "atr" | "atr_multiple" => ExitPolicy::AtrMultiple {
                atr_period: (!self.exit_atr_reuse_supertrend).then_some(self.exit_atr_period),
                sl_multiplier: self.sl_multiplier,
                tp_multiplier: self.tp_multiplier,
            },
            "supertrend_band" | "band" => ExitPolicy::SupertrendBand,
            other => {
                return Err(anyhow!(
                    "unknown exit mode '{}' (expected atr or supertrend_band)",
                    other
                ))
            }
        };

        let config = SignalConfig {
            ema_period: self.ema_period,
            supertrend_atr_period: self.supertrend_atr_period,
            supertrend_multiplier: self.supertrend_multiplier,
            exit,
            signal_mode: self.signal_mode.parse::<SignalMode>()?,
            guard_margin: self.guard_margin,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub timeframe: String,
    /// Named list used when `symbols` is empty
    pub universe: String,
    /// Comma separated tickers, overrides `universe`
    pub symbols: Option<String>,
    pub concurrency: usize,
    pub poll_interval_minutes: u64,
    pub timezone: String,
    pub market_open: String,
    pub market_close: String,
    pub ignore_market_hours: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            timeframe: "15m".to_string(),
            universe: "nifty50".to_string(),
            symbols: None,
            concurrency: 8,
            poll_interval_minutes: 5,
            timezone: "Asia/Kolkata".to_string(),
            market_open: "09:15".to_string(),
            market_close: "15:30".to_string(),
            ignore_market_hours: false,
        }
    }
}

impl ScanSettings {
    pub fn timeframe(&self) -> anyhow::Result<Timeframe> {
        self.timeframe.parse::<Timeframe>().map_err(|e| anyhow!(e))
    }

    pub fn symbols(&self) -> anyhow::Result<Vec<String>> {
        if let Some(list) = self.symbols.as_deref() {
            let symbols = parse_symbol_list(list);
            if !symbols.is_empty() {
                return Ok(symbols);
            }
        }

        Universe::from_name(&self.universe)
            .map(Universe::symbols)
            .ok_or_else(|| anyhow!("unknown universe '{}'", self.universe))
    }

    pub fn market_hours(&self) -> anyhow::Result<MarketHours> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|e| anyhow!("invalid timezone '{}': {}", self.timezone, e))?;
        let open = NaiveTime::parse_from_str(&self.market_open, "%H:%M")
            .with_context(|| format!("invalid market_open '{}'", self.market_open))?;
        let close = NaiveTime::parse_from_str(&self.market_close, "%H:%M")
            .with_context(|| format!("invalid market_close '{}'", self.market_close))?;

        if close <= open {
            return Err(anyhow!("market_close must be after market_open"));
        }
        Ok(MarketHours::new(timezone, open, close))
    }

    pub fn schedule(&self) -> anyhow::Result<ScheduleConfig> {
        if self.poll_interval_minutes == 0 {
            return Err(anyhow!("poll_interval_minutes must be at least 1"));
        }
        Ok(ScheduleConfig {
            poll_interval: Duration::from_secs(self.poll_interval_minutes * 60),
            market_hours: self.market_hours()?,
            ignore_market_hours: self.ignore_market_hours,
            align_to_clock: true,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_phone_number: Option<String>,
    pub sms_to: Option<String>,
    pub twilio_whatsapp_number: Option<String>,
    pub whatsapp_to: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl AlertSettings {
    fn twilio_credentials(&self) -> Option<TwilioCredentials> {
        Some(TwilioCredentials {
            account_sid: present(&self.twilio_account_sid)?.to_string(),
            auth_token: present(&self.twilio_auth_token)?.to_string(),
        })
    }

    pub fn telegram(&self) -> Option<TelegramChannel> {
        Some(TelegramChannel::new(
            present(&self.telegram_bot_token)?,
            present(&self.telegram_chat_id)?,
        ))
    }

    pub fn sms(&self) -> Option<SmsChannel> {
        Some(SmsChannel::new(
            self.twilio_credentials()?,
            present(&self.twilio_phone_number)?,
            present(&self.sms_to)?,
        ))
    }

    pub fn whatsapp(&self) -> Option<WhatsAppChannel> {
        Some(WhatsAppChannel::new(
            self.twilio_credentials()?,
            present(&self.twilio_whatsapp_number),
            present(&self.whatsapp_to)?,
        ))
    }

    /// Look up a single channel by name, e.g. for a test message
    pub fn channel(&self, name: &str) -> anyhow::Result<Box<dyn AlertChannel>> {
        let channel: Option<Box<dyn AlertChannel>> = match name {
            "telegram" => self.telegram().map(|c| Box::new(c) as Box<dyn AlertChannel>),
            "sms" => self.sms().map(|c| Box::new(c) as Box<dyn AlertChannel>),
            "whatsapp" => self.whatsapp().map(|c| Box::new(c) as Box<dyn AlertChannel>),
            other => return Err(anyhow!("unknown alert channel '{}'", other)),
        };

        channel.ok_or_else(|| {
            anyhow!(
                "{} alerts are not configured; check the credentials and recipient in .env",
                name
            )
        })
    }

    /// Dispatcher with every fully configured channel
    pub fn dispatcher(&self) -> AlertDispatcher {
        let mut dispatcher = AlertDispatcher::new();
        if let Some(channel) = self.telegram() {
            dispatcher.add_channel(Box::new(channel));
        }
        if let Some(channel) = self.sms() {
            dispatcher.add_channel(Box::new(channel));
        }
        if let Some(channel) = self.whatsapp() {
            dispatcher.add_channel(Box::new(channel));
        }
        dispatcher
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JournalSettings {
    pub csv_path: Option<String>,
    pub google_sheet_id: Option<String>,
    pub google_access_token: Option<String>,
    pub sheet_range: Option<String>,
}

impl JournalSettings {
    pub fn logs(&self) -> Vec<Box<dyn SignalLog>> {
        let mut logs: Vec<Box<dyn SignalLog>> = Vec::new();

        if let Some(path) = present(&self.csv_path) {
            logs.push(Box::new(CsvSignalLog::new(path)));
        }

        match (present(&self.google_sheet_id), present(&self.google_access_token)) {
            (Some(sheet_id), Some(token)) => {
                let mut log = GoogleSheetsLog::new(sheet_id, token);
                if let Some(range) = present(&self.sheet_range) {
                    log = log.with_range(range);
                }
                logs.push(Box::new(log));
            }
            (Some(_), None) => {
                tracing::warn!("GOOGLE_SHEET_ID is set without an access token, sheet logging disabled");
            }
            _ => {}
        }

        logs
    }
}

fn apply_env_overrides(
    mut builder: ConfigBuilder<DefaultState>,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ConfigBuilder<DefaultState>> {
    for (var, key) in ENV_OVERRIDES {
        builder = builder.set_override_option(*key, lookup(var))?;
    }
    Ok(builder)
}

fn build(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let settings: Settings = apply_env_overrides(builder, lookup)?
        .build()
        .context("Failed to load configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;

    settings.strategy.signal_config()?;
    Ok(settings)
}

impl Settings {
    /// Load `.env`, then layer the config file and environment over defaults
    ///
    /// Strategy parameters are validated here so a bad value stops the
    /// program before any scan runs.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env loaded: {}", e);
        }
        build(path, |var| std::env::var(var).ok())
    }
}
