//! Chart configuration around [`RollingSeries`]: a hidden, fixed 0..19 X
//! domain, a Y axis with a unit-aware tick formatter, and one styled dataset
//! per series sharing that domain.

use ratatui::style::Color;

use crate::history::{RollingSeries, SENTINEL, SERIES_LEN};
use crate::ui::util::human_bytes;

pub const ACCENT: Color = Color::Rgb(0x22, 0xd3, 0xee);
pub const ACCENT_ALT: Color = Color::Rgb(0xa7, 0x8b, 0xfa);

/// Number of labels drawn on the Y axis.
pub const Y_TICKS: usize = 4;

// Mantissas a tick step is rounded up to
const NICE: [f64; 11] = [1.0, 1.2, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0];

/// Smallest "round" step (`NICE` times a power of ten) not below `raw`.
pub fn nice_step(raw: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 1.0;
    }
    let exp = 10f64.powf(raw.log10().floor());
    let m = raw / exp;
    let pick = NICE.iter().copied().find(|n| *n >= m - 1e-9).unwrap_or(10.0);
    pick * exp
}

// Byte steps round within their binary unit, so ticks read 1.50 KiB not 1.46 KiB
fn nice_byte_step(raw: f64) -> f64 {
    let mut unit = 1.0;
    while raw / unit >= 1024.0 {
        unit *= 1024.0;
    }
    nice_step(raw / unit) * unit
}

// At most two decimals, trailing zeros dropped
fn short_float(v: f64) -> String {
    let s = format!("{v:.2}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickFormat {
    Plain,
    /// `value` rounded to `round_to` decimals (when set) followed by `unit`.
    Suffix { unit: String, round_to: Option<usize> },
    Bytes,
}

impl TickFormat {
    pub fn format(&self, v: f64) -> String {
        match self {
            Self::Plain => short_float(v),
            Self::Suffix { unit, round_to: Some(p) } => format!("{v:.p$}{unit}", p = *p),
            Self::Suffix { unit, round_to: None } => format!("{}{unit}", short_float(v)),
            Self::Bytes => human_bytes(v.max(0.0) as u64),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub label: String,
    pub color: Color,
    pub series: RollingSeries,
}

#[derive(Debug, Clone)]
pub struct MetricChart {
    label: String,
    suggested_max: Option<f64>,
    ticks: TickFormat,
    datasets: Vec<Dataset>,
}

impl MetricChart {
    /// `style` may rename or recolour each dataset by index.
    pub fn new<F>(label: &str, sets: usize, style: F) -> Self
    where
        F: Fn(Dataset, usize) -> Dataset,
    {
        let datasets = (0..sets.max(1))
            .map(|i| {
                style(
                    Dataset {
                        label: label.to_string(),
                        color: ACCENT,
                        series: RollingSeries::new(),
                    },
                    i,
                )
            })
            .collect();
        Self {
            label: label.to_string(),
            suggested_max: None,
            ticks: TickFormat::Plain,
            datasets,
        }
    }

    /// Single-series chart whose ticks read e.g. `"12.50%"` or `"512MiB"`.
    pub fn with_tick_label(
        label: &str,
        suggested_max: Option<f64>,
        unit: &str,
        round_to: Option<usize>,
    ) -> Self {
        Self::new(label, 1, |d, _| d)
            .suggested_max(suggested_max)
            .ticks(TickFormat::Suffix {
                unit: unit.to_string(),
                round_to,
            })
    }

    /// Chart whose ticks are human byte sizes, e.g. `"1.50 KiB"`.
    pub fn bytes<F>(label: &str, sets: usize, style: F) -> Self
    where
        F: Fn(Dataset, usize) -> Dataset,
    {
        Self::new(label, sets, style).ticks(TickFormat::Bytes)
    }

    pub fn suggested_max(mut self, max: Option<f64>) -> Self {
        self.suggested_max = max.filter(|m| *m > 0.0);
        self
    }

    pub fn ticks(mut self, ticks: TickFormat) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    /// One value per dataset, in dataset order.
    pub fn push(&mut self, values: &[Option<f64>]) {
        for (ds, v) in self.datasets.iter_mut().zip(values) {
            ds.series.push(*v);
        }
    }

    pub fn push_one(&mut self, v: Option<f64>) {
        self.push(&[v]);
    }

    pub fn clear(&mut self) {
        self.datasets.iter_mut().for_each(|d| d.series.clear());
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        [0.0, (SERIES_LEN - 1) as f64]
    }

    /// `[0, top]` where top covers the suggested max and the data, rounded up
    /// so every Y label lands on a round step.
    pub fn y_bounds(&self) -> [f64; 2] {
        [0.0, self.y_step() * (Y_TICKS - 1) as f64]
    }

    fn y_step(&self) -> f64 {
        let data_max = self
            .datasets
            .iter()
            .filter_map(|d| d.series.max_value())
            .fold(0.0_f64, f64::max);
        let top = self.suggested_max.unwrap_or(0.0).max(data_max).max(1.0);
        let raw = top / (Y_TICKS - 1) as f64;
        match self.ticks {
            TickFormat::Bytes => nice_byte_step(raw),
            _ => nice_step(raw),
        }
    }

    pub fn format_tick(&self, v: f64) -> String {
        self.ticks.format(v)
    }

    /// Evenly spaced Y labels from 0 to the top bound.
    pub fn y_labels(&self) -> Vec<String> {
        let step = self.y_step();
        (0..Y_TICKS)
            .map(|i| self.format_tick(step * i as f64))
            .collect()
    }

    /// `(slot, value)` pairs for one dataset. Gaps are skipped; sentinel
    /// points are kept and fall below the visible range.
    pub fn points(&self, dataset: usize) -> Vec<(f64, f64)> {
        self.datasets
            .get(dataset)
            .map(|d| {
                d.series
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn latest(&self, dataset: usize) -> Option<f64> {
        self.datasets
            .get(dataset)
            .and_then(|d| d.series.latest())
            .filter(|v| *v > SENTINEL)
    }

    pub fn is_cleared(&self) -> bool {
        self.datasets.iter().all(|d| d.series.is_cleared())
    }
}
