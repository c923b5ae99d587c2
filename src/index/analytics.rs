//! Pluggable technical-analysis module (§4.2 ambient addition). Defined as a
//! trait so an external TA crate can stand in without touching the Index
//! Engine; `WilderAnalytics` is the in-tree reference implementation.

use crate::model::{AnalyticsBlock, Ohlc};

pub trait Analytics: Send + Sync {
    fn recompute(&self, history: &[Ohlc]) -> AnalyticsBlock;
}

#[derive(Debug, Clone, Copy)]
pub struct WilderAnalytics {
    pub ema_period: usize,
    pub rsi_period: usize,
    pub rsi_ma_period: usize,
    pub adx_period: usize,
    pub adx_ma_period: usize,
}

impl Default for WilderAnalytics {
    fn default() -> Self {
        Self {
            ema_period: 20,
            rsi_period: 14,
            rsi_ma_period: 14,
            adx_period: 14,
            adx_ma_period: 14,
        }
    }
}

fn to_f64(d: rust_decimal::Decimal) -> f64 {
    d.to_string().parse().unwrap_or(0.0)
}

fn simple_average(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

/// Plain EMA over closes, seeded with a simple average of the first
/// `period` samples. `None` until `closes.len() >= period`.
fn ema(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let mult = 2.0 / (period as f64 + 1.0);
    let mut value = simple_average(&closes[..period]);
    for &c in &closes[period..] {
        value = (c - value) * mult + value;
    }
    Some(value)
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Wilder's RSI series, one value per closed bucket starting at index
/// `period` (chronological order). Shorter than `closes` by `period`
/// entries.
fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }
    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in 1..=period {
        let diff = closes[i] - closes[i - 1];
        if diff > 0.0 {
            gains += diff;
        } else {
            losses -= diff;
        }
    }
    let mut avg_gain = gains / period as f64;
    let mut avg_loss = losses / period as f64;
    let mut out = vec![rsi_from_averages(avg_gain, avg_loss)];

    for i in (period + 1)..closes.len() {
        let diff = closes[i] - closes[i - 1];
        let gain = diff.max(0.0);
        let loss = (-diff).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out.push(rsi_from_averages(avg_gain, avg_loss));
    }
    out
}

/// Wilder's ADX series (chronological), shorter than `closes` by roughly
/// `2*period` entries: one `period`-bar warmup for +DI/-DI, another for the
/// DX→ADX smoothing.
fn adx_series(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    if period == 0 || n <= period * 2 {
        return Vec::new();
    }

    let mut tr = Vec::with_capacity(n - 1);
    let mut plus_dm = Vec::with_capacity(n - 1);
    let mut minus_dm = Vec::with_capacity(n - 1);
    for i in 1..n {
        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];
        plus_dm.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
        let range = (highs[i] - lows[i])
            .max((highs[i] - closes[i - 1]).abs())
            .max((lows[i] - closes[i - 1]).abs());
        tr.push(range);
    }

    let mut atr: f64 = tr[..period].iter().sum();
    let mut plus_sum: f64 = plus_dm[..period].iter().sum();
    let mut minus_sum: f64 = minus_dm[..period].iter().sum();

    let mut dx_series = Vec::with_capacity(tr.len());
    let dx_of = |plus_sum: f64, minus_sum: f64, atr: f64| -> f64 {
        if atr == 0.0 {
            return 0.0;
        }
        let plus_di = 100.0 * plus_sum / atr;
        let minus_di = 100.0 * minus_sum / atr;
        let denom = plus_di + minus_di;
        if denom == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / denom
        }
    };
    dx_series.push(dx_of(plus_sum, minus_sum, atr));

    for i in period..tr.len() {
        atr = atr - atr / period as f64 + tr[i];
        plus_sum = plus_sum - plus_sum / period as f64 + plus_dm[i];
        minus_sum = minus_sum - minus_sum / period as f64 + minus_dm[i];
        dx_series.push(dx_of(plus_sum, minus_sum, atr));
    }

    if dx_series.len() < period {
        return Vec::new();
    }
    let mut adx = vec![simple_average(&dx_series[..period])];
    for &dx in &dx_series[period..] {
        let prev = *adx.last().unwrap();
        adx.push((prev * (period as f64 - 1.0) + dx) / period as f64);
    }
    adx
}

fn trailing_average(series: &[f64], window: usize) -> Option<f64> {
    if window == 0 || series.len() < window {
        return None;
    }
    Some(simple_average(&series[series.len() - window..]))
}

impl Analytics for WilderAnalytics {
    fn recompute(&self, history: &[Ohlc]) -> AnalyticsBlock {
        // `history` is reverse-chronological; analytics read chronologically.
        let closes: Vec<f64> = history.iter().rev().map(|o| to_f64(o.close)).collect();
        let highs: Vec<f64> = history.iter().rev().map(|o| to_f64(o.high)).collect();
        let lows: Vec<f64> = history.iter().rev().map(|o| to_f64(o.low)).collect();

        let ema_value = ema(&closes, self.ema_period);

        let rsi_vals = rsi_series(&closes, self.rsi_period);
        let rsi = rsi_vals.last().copied();
        let rsi_ma = trailing_average(&rsi_vals, self.rsi_ma_period);

        let adx_vals = adx_series(&highs, &lows, &closes, self.adx_period);
        let adx = adx_vals.last().copied();
        let adx_ma = trailing_average(&adx_vals, self.adx_ma_period);

        AnalyticsBlock {
            ema: ema_value,
            rsi,
            rsi_ma,
            adx,
            adx_ma,
            samples: closes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // `Ohlc`'s fields are all pub even though its smoothing constructor is
    // private outside the module; build test candles via a struct literal.
    fn candle(bucket: i64, close: rust_decimal::Decimal) -> Ohlc {
        Ohlc {
            bucket_start_ms: bucket,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
        }
    }

    #[test]
    fn insufficient_history_yields_none() {
        let a = WilderAnalytics::default();
        let history = vec![candle(0, dec!(100))];
        let block = a.recompute(&history);
        assert!(block.ema.is_none());
        assert!(block.rsi.is_none());
        assert!(block.adx.is_none());
    }

    #[test]
    fn ema_available_once_period_satisfied() {
        let a = WilderAnalytics {
            ema_period: 3,
            ..WilderAnalytics::default()
        };
        // Reverse-chronological input: front = most recent.
        let history = vec![
            candle(2, dec!(12)),
            candle(1, dec!(11)),
            candle(0, dec!(10)),
        ];
        let block = a.recompute(&history);
        assert!(block.ema.is_some());
        assert_eq!(block.samples, 3);
    }

    #[test]
    fn rsi_is_bounded() {
        let a = WilderAnalytics {
            rsi_period: 3,
            ..WilderAnalytics::default()
        };
        let mut history = Vec::new();
        let mut price = 100i64;
        for i in 0..10 {
            price += if i % 2 == 0 { 2 } else { -1 };
            history.insert(0, candle(i, rust_decimal::Decimal::from(price)));
        }
        let block = a.recompute(&history);
        let rsi = block.rsi.expect("rsi available");
        assert!((0.0..=100.0).contains(&rsi));
    }
}
