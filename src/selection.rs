use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::data::model::{City, Direction, Factor};
use crate::error::{DashboardError, Result};

// ---------------------------------------------------------------------------
// Raw request, as sent by the dashboard inputs
// ---------------------------------------------------------------------------

/// Values of the five dashboard inputs. Missing fields take the initial
/// dashboard values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SelectionRequest {
    pub city: String,
    pub direction: String,
    pub factor: String,
    pub sort_by_moves: bool,
    pub years: Vec<i64>,
}

impl Default for SelectionRequest {
    fn default() -> Self {
        let s = Selection::default();
        Self {
            city: s.city.to_string(),
            direction: s.direction.to_string(),
            factor: s.factor.to_string(),
            sort_by_moves: s.sort_by_moves,
            years: s.years.iter().map(|&y| i64::from(y)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validated selection
// ---------------------------------------------------------------------------

/// The full input state of one render, independent of any UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub city: City,
    pub direction: Direction,
    pub factor: Factor,
    /// Colour by moves (`true`) or by the chosen factor (`false`).
    pub sort_by_moves: bool,
    pub years: BTreeSet<u16>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            city: City::Amsterdam,
            direction: Direction::From,
            factor: Factor::Prices,
            sort_by_moves: true,
            years: BTreeSet::from([2016]),
        }
    }
}

impl TryFrom<SelectionRequest> for Selection {
    type Error = DashboardError;

    fn try_from(req: SelectionRequest) -> Result<Self> {
        if req.years.is_empty() {
            return Err(DashboardError::InvalidSelection("no years selected".into()));
        }
        let years = req
            .years
            .iter()
            .map(|&y| {
                u16::try_from(y)
                    .map_err(|_| DashboardError::InvalidSelection(format!("year {y} out of range")))
            })
            .collect::<Result<BTreeSet<u16>>>()?;

        Ok(Selection {
            city: req.city.parse()?,
            direction: req.direction.parse()?,
            factor: req.factor.parse()?,
            sort_by_moves: req.sort_by_moves,
            years,
        })
    }
}

impl Selection {
    pub fn year_count(&self) -> usize {
        self.years.len()
    }
}
