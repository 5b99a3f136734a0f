use crate::models::{Decision, Signal, SignalRecord, TrendDirection};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Asia::Kolkata;

const NOT_AVAILABLE: &str = "N/A";

fn price(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Decision bar time in exchange-local time, falling back to the scan time
fn signal_time(record: &SignalRecord) -> String {
    let at: DateTime<Utc> = record.signal.timestamp.unwrap_or(record.scanned_at);
    at.with_timezone(&Kolkata).format("%Y-%m-%d %H:%M IST").to_string()
}

/// Plain text body for SMS
pub fn sms_message(record: &SignalRecord) -> String {
    let s = &record.signal;
    let mut message = String::from("TRADING SIGNAL\n");
    message.push_str(&format!("Symbol: {}\n", record.symbol));
    message.push_str(&format!("Signal: {}\n", s.decision));
    message.push_str(&format!("Price: {}\n", price(s.entry_price)));
    message.push_str(&format!("EMA: {}\n", price(s.ema)));
    message.push_str(&format!("SuperTrend: {}\n", price(s.supertrend)));
    message.push_str(&format!("ATR: {}\n", price(s.atr)));
    message.push_str(&format!("Stop Loss: {}\n", price(s.stop_loss)));
    message.push_str(&format!("Take Profit: {}\n", price(s.take_profit)));
    message.push_str(&format!("RRR: {}\n", price(s.risk_reward)));
    message.push_str(&format!("Time: {}\n", signal_time(record)));
    message.push_str("#2XCleanExecution #Trading");
    message
}

/// Telegram body, grouped into indicator and exit blocks
pub fn telegram_message(record: &SignalRecord) -> String {
    let s = &record.signal;
    format!(
        "TRADING SIGNAL\n\n\
         Symbol: {}\n\
         Signal: {}\n\
         Price: {}\n\
         EMA: {}\n\
         SuperTrend: {}\n\
         ATR: {}\n\n\
         Stop Loss: {}\n\
         Take Profit: {}\n\
         Risk-Reward: {}\n\
         Time: {}\n\n\
         #2XCleanExecution #Trading #TechnicalAnalysis",
        record.symbol,
        s.decision,
        price(s.entry_price),
        price(s.ema),
        price(s.supertrend),
        price(s.atr),
        price(s.stop_loss),
        price(s.take_profit),
        price(s.risk_reward),
        signal_time(record),
    )
}

/// WhatsApp body with the emoji layout
pub fn whatsapp_message(record: &SignalRecord) -> String {
    let s = &record.signal;
    let trend = s
        .direction
        .map(|d| d.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let risk = s
        .risk_points()
        .map(|r| format!("{:.2} pts", r))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    format!(
        "🎯 2X CLEAN EXECUTION SIGNAL 🎯\n\n\
         📊 {}\n\
         🔔 Signal: {}\n\
         ⏰ Time: {}\n\n\
         💰 Entry Price: {}\n\
         📈 EMA: {}\n\
         📉 Supertrend: {} ({})\n\n\
         🛑 Stop Loss: {}\n\
         🎁 Take Profit: {}\n\
         ⚖️ Risk: {}\n\
         📊 Risk/Reward: {}\n\n\
         💡 ATR: {}\n\n\
         #2XCleanExecution #Trading #NIFTY50",
        record.symbol,
        s.decision,
        signal_time(record),
        price(s.entry_price),
        price(s.ema),
        price(s.supertrend),
        trend,
        price(s.stop_loss),
        price(s.take_profit),
        risk,
        price(s.risk_reward),
        price(s.atr),
    )
}

/// Fixed BUY record used to check that a channel is wired up
pub fn sample_record() -> SignalRecord {
    let at = Kolkata
        .with_ymd_and_hms(2024, 3, 4, 14, 30, 0)
        .single()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let signal = Signal {
        decision: Decision::Buy,
        timestamp: Some(at),
        entry_price: Some(8500.0),
        stop_loss: Some(8386.75),
        take_profit: Some(8726.5),
        risk_reward: Some(2.0),
        ema: Some(8450.0),
        atr: Some(75.5),
        supertrend: Some(8400.0),
        direction: Some(TrendDirection::Up),
    };

    SignalRecord::new("MARUTI.NS", signal, at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sms_message_layout() {
        let message = sms_message(&sample_record());

        assert!(message.starts_with("TRADING SIGNAL\nSymbol: MARUTI.NS\nSignal: BUY\n"));
        assert!(message.contains("Price: 8500.00\n"));
        assert!(message.contains("Stop Loss: 8386.75\n"));
        assert!(message.contains("RRR: 2.00\n"));
        assert!(message.contains("Time: 2024-03-04 14:30 IST\n"));
        assert!(message.ends_with("#2XCleanExecution #Trading"));
    }

    #[test]
    fn test_missing_values_render_as_not_available() {
        let mut record = sample_record();
        record.signal.take_profit = None;
        record.signal.risk_reward = None;

        let telegram = telegram_message(&record);
        assert!(telegram.contains("Take Profit: N/A\n"));
        assert!(telegram.contains("Risk-Reward: N/A\n"));

        let whatsapp = whatsapp_message(&record);
        assert!(whatsapp.contains("🎁 Take Profit: N/A"));
    }

    #[test]
    fn test_whatsapp_message_includes_risk_points() {
        let message = whatsapp_message(&sample_record());

        assert!(message.starts_with("🎯 2X CLEAN EXECUTION SIGNAL 🎯"));
        assert!(message.contains("📊 MARUTI.NS\n"));
        assert!(message.contains("Supertrend: 8400.00 (UP)"));
        assert!(message.contains("Risk: 113.25 pts"));
        assert!(message.ends_with("#NIFTY50"));
    }

    #[test]
    fn test_time_falls_back_to_scan_time() {
        let mut record = sample_record();
        record.signal.timestamp = None;
        record.scanned_at = Utc.with_ymd_and_hms(2024, 3, 4, 4, 0, 0).unwrap();

        assert!(sms_message(&record).contains("Time: 2024-03-04 09:30 IST"));
    }
}
