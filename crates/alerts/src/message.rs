//! Chat message formatting.

use crate::transport::ActionButton;
use movewatch_core::{pair_label, Candle, SymbolSet, Timeframe};
use teloxide::utils::html;

/// Callback prefix of the per-symbol query buttons.
pub const QUERY_PREFIX: &str = "req_";

/// One button per tracked symbol, in configured order.
pub fn symbol_keyboard(symbols: &SymbolSet) -> Vec<ActionButton> {
    symbols
        .iter()
        .map(|s| ActionButton::new(s.name.as_str(), format!("{}{}", QUERY_PREFIX, s.name)))
        .collect()
}

/// Extract the symbol name from a query button payload.
pub fn parse_query_callback(data: &str) -> Option<&str> {
    data.strip_prefix(QUERY_PREFIX).filter(|name| !name.is_empty())
}

/// Format a price with precision based on magnitude.
fn format_price(price: f64) -> String {
    let abs_price = price.abs();
    if abs_price >= 1.0 || price == 0.0 {
        format!("{:.4}", price)
    } else if abs_price >= 0.0001 {
        format!("{:.6}", price)
    } else {
        format!("{:.10}", price)
    }
}

/// Format a significant candle as an alert message.
pub fn format_candle_message(candle: &Candle) -> String {
    let direction = if candle.is_up() { "🟢" } else { "🔴" };

    format!(
        "<b>{} {} {:.2}%</b>\n\
         ┌ Time: <i>{}</i>\n\
         ├ Price: <b>{}</b>\n\
         ├ Volume: {:.2}\n\
         └ Range: {}-{}",
        direction,
        pair_label(candle.symbol()),
        candle.change().abs(),
        candle.open_time().format("%Y-%m-%d %H:%M UTC"),
        format_price(candle.close()),
        candle.volume(),
        format_price(candle.low()),
        format_price(candle.high()),
    )
}

/// Reply for an on-demand query whose latest candle is below the threshold.
pub fn format_no_move_message(pair: &str, threshold: f64, change: Option<f64>) -> String {
    let mut msg = format!("❌ No {} candle above {}% right now", pair_label(pair), threshold);
    if let Some(change) = change {
        msg.push_str(&format!(" (latest: {:+.2}%)", change));
    }
    msg
}

/// Reply for an on-demand query that matches the last alert.
pub fn format_duplicate_message(pair: &str, elapsed_secs: i64) -> String {
    format!(
        "ℹ️ {} move already reported {}s ago, no new significant candle",
        pair_label(pair),
        elapsed_secs
    )
}

/// Reply when market data could not be fetched.
pub fn format_unavailable_message(pair: &str) -> String {
    format!("⚠️ Could not fetch {} candles, try again shortly", pair_label(pair))
}

/// Reply for a button naming a symbol that is no longer tracked.
pub fn format_unknown_symbol_message(name: &str) -> String {
    format!("❓ {} is not tracked", html::escape(name))
}

/// Announcement sent once when polling starts.
pub fn format_startup_message(timeframe: Timeframe, threshold: f64) -> String {
    format!("🔔 Bot activated | TF: {} | >{}%", timeframe, threshold)
}

/// Prompt shown with the symbol keyboard.
pub fn format_prompt_message(threshold: f64) -> String {
    format!(
        "📊 Pick a pair to request its latest large candle (>{}%):",
        threshold
    )
}
