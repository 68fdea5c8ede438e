use palette::{LinSrgb, Mix, Srgb};
use serde::Serialize;

use crate::data::filter::{AggregatedDataset, AggregatedRow};
use crate::data::model::{Factor, MOVES_COLUMN};

// ---------------------------------------------------------------------------
// Which column drives the map colouring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "column", content = "factor", rename_all = "lowercase")]
pub enum ColorColumn {
    Moves,
    Factor(Factor),
}

impl ColorColumn {
    /// Colour by moves when sorting on moves, or whenever several years are
    /// selected: a last-value factor over a year range would be misleading.
    pub fn select(sort_by_moves: bool, year_count: usize, factor: Factor) -> Self {
        if sort_by_moves || year_count > 1 {
            ColorColumn::Moves
        } else {
            ColorColumn::Factor(factor)
        }
    }

    /// Storage name of the column.
    pub fn column_name(self) -> &'static str {
        match self {
            ColorColumn::Moves => MOVES_COLUMN,
            ColorColumn::Factor(f) => f.column(),
        }
    }

    pub fn value(self, row: &AggregatedRow) -> Option<f64> {
        match self {
            ColorColumn::Moves => row.moves,
            ColorColumn::Factor(_) => row.factor,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-request value range
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorRange {
    pub min: f64,
    pub max: f64,
}

impl ColorRange {
    /// Exact [min, max] of the colour column; `None` when no row has a value.
    pub fn of(data: &AggregatedDataset, column: ColorColumn) -> Option<Self> {
        data.rows
            .iter()
            .filter_map(|r| column.value(r))
            .fold(None, |acc, v| match acc {
                None => Some(ColorRange { min: v, max: v }),
                Some(ColorRange { min, max }) => Some(ColorRange {
                    min: min.min(v),
                    max: max.max(v),
                }),
            })
    }

    /// Position of `value` in the range, clamped to [0, 1]. A zero-width
    /// range puts everything in the middle.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span.abs() < f64::EPSILON {
            0.5
        } else {
            ((value - self.min) / span).clamp(0.0, 1.0)
        }
    }
}

// ---------------------------------------------------------------------------
// Continuous "Reds" scale
// ---------------------------------------------------------------------------

pub const SCALE_NAME: &str = "Reds";

/// ColorBrewer sequential Reds, light to dark.
const REDS: [(u8, u8, u8); 9] = [
    (255, 245, 240),
    (254, 224, 210),
    (252, 187, 161),
    (252, 146, 114),
    (251, 106, 74),
    (239, 59, 44),
    (203, 24, 29),
    (165, 15, 21),
    (103, 0, 13),
];

fn linear((r, g, b): (u8, u8, u8)) -> LinSrgb {
    Srgb::new(f32::from(r) / 255.0, f32::from(g) / 255.0, f32::from(b) / 255.0).into_linear()
}

/// Colour at position `t` in [0, 1], interpolated in linear RGB.
pub fn reds(t: f64) -> Srgb<u8> {
    let t = t.clamp(0.0, 1.0) as f32;
    let scaled = t * (REDS.len() - 1) as f32;
    let lower = (scaled.floor() as usize).min(REDS.len() - 2);
    let frac = scaled - lower as f32;

    let mixed = linear(REDS[lower]).mix(linear(REDS[lower + 1]), frac);
    let srgb: Srgb = Srgb::from_linear(mixed);
    srgb.into_format()
}

pub fn to_hex(color: Srgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

/// Fill colour for a value in `range`.
pub fn fill_for(range: &ColorRange, value: f64) -> String {
    to_hex(reds(range.normalize(value)))
}
