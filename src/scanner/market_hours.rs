use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

/// Daily trading session in exchange-local time
///
/// Weekends are always closed; exchange holidays are not modelled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketHours {
    pub timezone: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for MarketHours {
    /// NSE cash session, 09:15 to 15:30 IST
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Kolkata,
            open: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl MarketHours {
    pub fn new(timezone: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            timezone,
            open,
            close,
        }
    }

    /// Whether `now` falls inside the session, both ends inclusive
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let time = local.time();
        self.open <= time && time <= self.close
    }

    /// Exchange-local clock time, for log lines
    pub fn local_time(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.timezone)
            .format("%H:%M:%S %Z")
            .to_string()
    }
}
