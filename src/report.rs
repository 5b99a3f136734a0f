use crate::models::SignalRecord;
use crate::scanner::ScanReport;
use chrono_tz::Asia::Kolkata;
use std::fmt::Write;

const HEADERS: [&str; 11] = [
    "Symbol",
    "Signal",
    "Price",
    "EMA",
    "Supertrend",
    "Trend",
    "ATR",
    "SL",
    "TP",
    "R:R",
    "Time",
];

fn num(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

fn row(record: &SignalRecord) -> [String; 11] {
    let s = &record.signal;
    [
        record.symbol.clone(),
        s.decision.to_string(),
        num(s.entry_price),
        num(s.ema),
        num(s.supertrend),
        s.direction.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
        num(s.atr),
        num(s.stop_loss),
        num(s.take_profit),
        num(s.risk_reward),
        s.timestamp
            .map(|t| t.with_timezone(&Kolkata).format("%H:%M").to_string())
            .unwrap_or_else(|| "-".to_string()),
    ]
}

fn format_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, &width)| format!("{:<width$}", cell, width = width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Render a scan as a fixed-width text table
///
/// Only BUY/SELL rows are shown unless `include_none` is set.
pub fn render_table(report: &ScanReport, include_none: bool) -> String {
    let rows: Vec<[String; 11]> = report
        .records
        .iter()
        .filter(|r| include_none || r.decision().is_actionable())
        .map(row)
        .collect();

    let mut out = String::new();

    if rows.is_empty() {
        out.push_str("No signals found.\n");
    } else {
        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let _ = writeln!(out, "{}", format_line(HEADERS.iter().copied(), &widths));
        let separator_len = widths.iter().sum::<usize>() + 2 * (widths.len() - 1);
        let _ = writeln!(out, "{}", "-".repeat(separator_len));
        for row in &rows {
            let _ = writeln!(out, "{}", format_line(row.iter().map(String::as_str), &widths));
        }
    }

    let _ = writeln!(
        out,
        "\n{} signal(s) from {} symbol(s), {} failed",
        report.signal_count(),
        report.records.len() + report.failures.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        let _ = writeln!(out, "  ✗ {}: {}", failure.symbol, failure.error);
    }

    out
}
