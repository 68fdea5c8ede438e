use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use super::filter::aggregate;
use super::model::{City, Factor, MovementDataset, NAME_COLUMN, REFERENCE_YEAR};

/// Header of the summed move count column.
pub const MOVES_LABEL: &str = "Totaal verhuizingen";

/// Ranked municipalities shown next to the subject city.
pub const RANKING_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    pub name: String,
    /// `None` for the subject city itself.
    pub moves: Option<f64>,
    pub factor: Option<f64>,
}

/// Subject city first, then up to [`RANKING_SIZE`] municipalities by moves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingTable {
    pub factor: Factor,
    pub rows: Vec<RankingRow>,
}

impl RankingTable {
    /// Build the table from the full dataset of the current selection.
    ///
    /// The year selection of the map does not apply here: the subject value
    /// comes from [`REFERENCE_YEAR`] and the ranking sums every year.
    pub fn build(dataset: &MovementDataset, city: City, factor: Factor) -> Self {
        let subject_factor = dataset
            .records
            .iter()
            .find(|r| r.year == REFERENCE_YEAR)
            .and_then(|r| r.subject_factor(factor));

        let mut ranked = aggregate(&dataset.records, factor);
        // Stable sort, so ties keep municipality-code order.
        ranked.sort_by(|a, b| {
            b.moves
                .unwrap_or(0.0)
                .total_cmp(&a.moves.unwrap_or(0.0))
        });
        ranked.truncate(RANKING_SIZE);

        let rows = std::iter::once(RankingRow {
            name: city.file_stem().to_string(),
            moves: None,
            factor: subject_factor,
        })
        .chain(ranked.into_iter().map(|r| RankingRow {
            name: r.name,
            moves: r.moves,
            factor: r.factor,
        }))
        .collect();

        RankingTable { factor, rows }
    }

    pub fn factor_label(&self) -> &'static str {
        self.factor.id()
    }

    /// Rows keyed by their user-facing column headers.
    pub fn records(&self) -> Vec<Map<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = Map::new();
                record.insert(NAME_COLUMN.into(), JsonValue::from(row.name.clone()));
                record.insert(MOVES_LABEL.into(), JsonValue::from(row.moves));
                record.insert(self.factor_label().into(), JsonValue::from(row.factor));
                record
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
