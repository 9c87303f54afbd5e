use serde::{Deserialize, Serialize};

/// One 5-minute OHLCV bar, IST-aligned epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

pub const CANDLE_SECONDS: i64 = 300;

impl Candle {
    pub fn bar_start(ts: i64) -> i64 {
        (ts / CANDLE_SECONDS) * CANDLE_SECONDS
    }

    pub fn is_valid(&self) -> bool {
        self.time % CANDLE_SECONDS == 0
            && self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
    }
}

/// Minimum number of finalized+live candles required to cover five trading
/// days of 5-minute bars.
pub const MIN_BUFFER_CANDLES: usize = 376;

/// Bounded, time-ordered window of recent candles. The last element, if
/// present, is the live candle still being aggregated from ticks; every
/// other element is finalized.
#[derive(Debug, Clone, Default)]
pub struct CandleBuffer {
    candles: Vec<Candle>,
    capacity: usize,
    pub late_ticks_dropped: u64,
}

impl CandleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { candles: Vec::with_capacity(capacity), capacity, late_ticks_dropped: 0 }
    }

    pub fn seed(&mut self, mut historical: Vec<Candle>) {
        historical.sort_by_key(|c| c.time);
        if historical.len() > self.capacity {
            let drop = historical.len() - self.capacity;
            historical.drain(0..drop);
        }
        self.candles = historical;
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// All candles, live one included, oldest first.
    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    /// All but the still-aggregating live candle.
    pub fn finalized(&self) -> &[Candle] {
        match self.candles.len() {
            0 => &[],
            n => &self.candles[..n - 1],
        }
    }

    pub fn live(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Fold a tick into the buffer per the 5-minute aggregation rule.
    /// Returns `true` if the tick advanced/sealed a candle, `false` if it
    /// was dropped as late.
    pub fn ingest_tick(&mut self, ts: i64, ltp: f64) -> bool {
        let bar_start = Candle::bar_start(ts);

        match self.candles.last_mut() {
            Some(live) if bar_start == live.time => {
                live.high = live.high.max(ltp);
                live.low = live.low.min(ltp);
                live.close = ltp;
                live.volume += 1;
                true
            }
            Some(live) if bar_start > live.time => {
                self.candles.push(Candle {
                    time: bar_start,
                    open: ltp,
                    high: ltp,
                    low: ltp,
                    close: ltp,
                    volume: 1,
                });
                if self.candles.len() > self.capacity {
                    self.candles.remove(0);
                }
                true
            }
            Some(_) => {
                self.late_ticks_dropped += 1;
                false
            }
            None => {
                self.candles.push(Candle {
                    time: bar_start,
                    open: ltp,
                    high: ltp,
                    low: ltp,
                    close: ltp,
                    volume: 1,
                });
                true
            }
        }
    }

    /// Last `n` candles including the live one, for feature engineering.
    pub fn tail(&self, n: usize) -> &[Candle] {
        let len = self.candles.len();
        if n >= len {
            &self.candles
        } else {
            &self.candles[len - n..]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(time: i64, close: f64) -> Candle {
        Candle { time, open: close, high: close, low: close, close, volume: 0 }
    }

    #[test]
    fn bar_start_floors_to_5min() {
        assert_eq!(Candle::bar_start(301), 300);
        assert_eq!(Candle::bar_start(300), 300);
        assert_eq!(Candle::bar_start(599), 300);
        assert_eq!(Candle::bar_start(600), 600);
    }

    #[test]
    fn ingest_extends_live_candle_within_same_bar() {
        let mut buf = CandleBuffer::new(10);
        buf.ingest_tick(300, 100.0);
        buf.ingest_tick(310, 102.0);
        buf.ingest_tick(320, 99.0);
        assert_eq!(buf.len(), 1);
        let live = buf.live().unwrap();
        assert_eq!(live.open, 100.0);
        assert_eq!(live.high, 102.0);
        assert_eq!(live.low, 99.0);
        assert_eq!(live.close, 99.0);
    }

    #[test]
    fn ingest_seals_previous_candle_on_new_bar() {
        let mut buf = CandleBuffer::new(10);
        buf.ingest_tick(300, 100.0);
        buf.ingest_tick(610, 105.0);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.finalized().len(), 1);
        assert_eq!(buf.finalized()[0].close, 100.0);
        assert_eq!(buf.live().unwrap().time, 600);
    }

    #[test]
    fn late_tick_is_dropped_and_counted() {
        let mut buf = CandleBuffer::new(10);
        buf.ingest_tick(610, 105.0);
        let advanced = buf.ingest_tick(300, 99.0);
        assert!(!advanced);
        assert_eq!(buf.late_ticks_dropped, 1);
        assert_eq!(buf.live().unwrap().time, 600);
    }

    #[test]
    fn seed_truncates_to_capacity_keeping_most_recent() {
        let mut buf = CandleBuffer::new(3);
        let hist = vec![candle(0, 1.0), candle(300, 2.0), candle(600, 3.0), candle(900, 4.0)];
        buf.seed(hist);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.as_slice()[0].time, 300);
    }

    #[test]
    fn tail_returns_at_most_n_most_recent() {
        let mut buf = CandleBuffer::new(10);
        for i in 0..5 {
            buf.ingest_tick(300 * (i + 1), i as f64);
        }
        assert_eq!(buf.tail(2).len(), 2);
        assert_eq!(buf.tail(100).len(), 5);
    }
}
