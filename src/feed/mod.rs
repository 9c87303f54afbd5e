//! Live feed controller: websocket tick ingestion, 15-minute cadence
//! scheduling, and outcome watching (§4.7, §5).

pub mod ingestor;
pub mod scheduler;
pub mod watcher;

use chrono::{NaiveTime, Timelike};

use crate::pipeline::SessionWindow;

const SECONDS_PER_DAY: i64 = 86_400;
const IST_OFFSET_SECS: i64 = 5 * 3600 + 1800;

/// Parses an `"HH:MM"` config value into seconds-since-midnight.
pub fn parse_clock(value: &str) -> Option<i64> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .ok()
        .map(|t| t.num_seconds_from_midnight() as i64)
}

/// Builds the IST session window (epoch seconds) containing `now_ts`.
pub fn session_window_for(now_ts: i64, market_open: &str, market_close: &str) -> SessionWindow {
    let open_secs = parse_clock(market_open).unwrap_or(9 * 3600 + 900);
    let close_secs = parse_clock(market_close).unwrap_or(15 * 3600 + 1800);
    let ist_now = now_ts + IST_OFFSET_SECS;
    let day_start_ist = (ist_now / SECONDS_PER_DAY) * SECONDS_PER_DAY;
    SessionWindow {
        open_ts: day_start_ist + open_secs - IST_OFFSET_SECS,
        close_ts: day_start_ist + close_secs - IST_OFFSET_SECS,
    }
}

/// Whether `now_ts` falls within the day's trading session.
pub fn is_market_open(now_ts: i64, market_open: &str, market_close: &str) -> bool {
    let window = session_window_for(now_ts, market_open, market_close);
    now_ts >= window.open_ts && now_ts < window.close_ts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_clock_reads_hh_mm() {
        assert_eq!(parse_clock("09:15"), Some(9 * 3600 + 900));
        assert_eq!(parse_clock("15:30"), Some(15 * 3600 + 1800));
        assert_eq!(parse_clock("bogus"), None);
    }

    #[test]
    fn market_open_window_respects_bounds() {
        let window = session_window_for(0, "09:15", "15:30");
        assert!(!is_market_open(window.open_ts - 1, "09:15", "15:30"));
        assert!(is_market_open(window.open_ts, "09:15", "15:30"));
        assert!(is_market_open(window.close_ts - 1, "09:15", "15:30"));
        assert!(!is_market_open(window.close_ts, "09:15", "15:30"));
    }
}
