use geojson::FeatureCollection;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::boundary::Boundaries;
use crate::color::{fill_for, ColorColumn, ColorRange, SCALE_NAME};
use crate::config::Config;
use crate::data::filter::{filter_years, AggregatedDataset};
use crate::data::loader::load_dataset;
use crate::data::model::{MOVES_COLUMN, NAME_COLUMN, YEAR_COLUMN};
use crate::data::table::{RankingTable, MOVES_LABEL};
use crate::error::Result;
use crate::selection::Selection;

// ---------------------------------------------------------------------------
// Payloads handed to the charting layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Fixed view of the Netherlands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub center: LatLon,
    pub zoom: f64,
    pub opacity: f64,
    pub map_style: &'static str,
    pub color_scale: &'static str,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: LatLon {
                lat: 52.2130,
                lon: 5.2794,
            },
            zoom: 6.0,
            opacity: 0.5,
            map_style: "carto-positron",
            color_scale: SCALE_NAME,
        }
    }
}

/// One coloured municipality with its hover fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLocation {
    pub code: String,
    pub name: String,
    pub year: u16,
    pub moves: Option<f64>,
    pub factor: Option<f64>,
    pub color_value: Option<f64>,
    /// `#rrggbb`; absent when the colour value is missing.
    pub fill: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapPayload {
    pub geometry: FeatureCollection,
    pub feature_id_key: String,
    pub color: ColorColumn,
    pub color_range: Option<ColorRange>,
    pub hover_fields: Vec<&'static str>,
    pub locations: Vec<MapLocation>,
    pub view: MapView,
}

/// Table rows keyed by column header, plus the header order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePayload {
    pub columns: Vec<String>,
    pub records: Vec<Map<String, JsonValue>>,
}

impl From<&RankingTable> for TablePayload {
    fn from(table: &RankingTable) -> Self {
        Self {
            columns: vec![
                NAME_COLUMN.to_string(),
                MOVES_LABEL.to_string(),
                table.factor_label().to_string(),
            ],
            records: table.records(),
        }
    }
}

/// Display names of the selector options, for the control captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectionLabels {
    pub direction: &'static str,
    pub factor: &'static str,
}

impl From<&Selection> for SelectionLabels {
    fn from(selection: &Selection) -> Self {
        Self {
            direction: selection.direction.label(),
            factor: selection.factor.label(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Rendered {
    pub selection: Selection,
    pub labels: SelectionLabels,
    pub map: MapPayload,
    pub table: TablePayload,
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

/// Recompute everything shown for `selection`.
///
/// The dataset is read from disk on every call; only `boundaries` is shared
/// between calls and it is never modified.
pub fn render(config: &Config, boundaries: &Boundaries, selection: &Selection) -> Result<Rendered> {
    let dataset = load_dataset(&config.data_dir, selection.direction, selection.city)?;
    let filtered = filter_years(&dataset, &selection.years, selection.factor)?;

    let color = ColorColumn::select(
        selection.sort_by_moves,
        selection.year_count(),
        selection.factor,
    );
    let map = map_payload(boundaries, &filtered, color);
    let table = RankingTable::build(&dataset, selection.city, selection.factor);

    log::debug!(
        "Rendered {}_{} ({} locations, colour by {}, range {:?})",
        selection.direction,
        selection.city,
        map.locations.len(),
        color.column_name(),
        map.color_range
    );

    Ok(Rendered {
        selection: selection.clone(),
        labels: SelectionLabels::from(selection),
        map,
        table: TablePayload::from(&table),
    })
}

pub fn map_payload(
    boundaries: &Boundaries,
    data: &AggregatedDataset,
    color: ColorColumn,
) -> MapPayload {
    let color_range = ColorRange::of(data, color);

    let locations: Vec<MapLocation> = data
        .rows
        .iter()
        .map(|row| {
            let color_value = color.value(row);
            MapLocation {
                code: row.code.clone(),
                name: row.name.clone(),
                year: row.year,
                moves: row.moves,
                factor: row.factor,
                color_value,
                fill: color_value
                    .zip(color_range)
                    .map(|(v, range)| fill_for(&range, v)),
            }
        })
        .collect();

    let unmatched = locations
        .iter()
        .filter(|l| !boundaries.contains(&l.code))
        .count();
    if unmatched > 0 {
        log::warn!("{unmatched} municipalities have no boundary and will not be drawn");
    }

    MapPayload {
        geometry: boundaries.subset(locations.iter().map(|l| l.code.as_str())),
        feature_id_key: boundaries.feature_id_key(),
        color,
        color_range,
        hover_fields: vec![MOVES_COLUMN, data.factor.column(), YEAR_COLUMN],
        locations,
        view: MapView::default(),
    }
}

#[cfg(test)]
mod tests {
    use geojson::{Feature, Geometry, Value};

    use super::*;
    use crate::data::filter::AggregatedRow;
    use crate::data::model::{City, Direction, Factor};

    fn feature(code: &str) -> Feature {
        let mut properties = Map::new();
        properties.insert("statcode".into(), JsonValue::from(code));
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![5.0, 52.0]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }

    fn boundaries(codes: &[&str]) -> Boundaries {
        Boundaries::from_collection(
            FeatureCollection {
                bbox: None,
                features: codes.iter().map(|c| feature(c)).collect(),
                foreign_members: None,
            },
            "statcode",
        )
    }

    fn row(code: &str, moves: f64, factor: Option<f64>) -> AggregatedRow {
        AggregatedRow {
            code: code.into(),
            name: code.to_lowercase(),
            year: 2019,
            moves: Some(moves),
            factor,
        }
    }

    #[test]
    fn payload_colours_by_selected_column() {
        let data = AggregatedDataset {
            factor: Factor::Population,
            rows: vec![row("GM1", 10.0, Some(3.0)), row("GM2", 30.0, None)],
        };
        let b = boundaries(&["GM1", "GM2", "GM3"]);

        let by_moves = map_payload(&b, &data, ColorColumn::Moves);
        assert_eq!(by_moves.color_range, Some(ColorRange { min: 10.0, max: 30.0 }));
        assert_eq!(by_moves.locations[0].fill.as_deref(), Some("#fff5f0"));
        assert_eq!(by_moves.locations[1].fill.as_deref(), Some("#67000d"));
        assert_eq!(by_moves.geometry.features.len(), 2);
        assert_eq!(by_moves.hover_fields, vec!["moves", "population_other", "year"]);

        let by_factor = map_payload(&b, &data, ColorColumn::Factor(Factor::Population));
        assert_eq!(by_factor.color_range, Some(ColorRange { min: 3.0, max: 3.0 }));
        assert!(by_factor.locations[0].fill.is_some());
        assert_eq!(by_factor.locations[1].fill, None);
    }

    #[test]
    fn unmatched_codes_stay_in_locations() {
        let data = AggregatedDataset {
            factor: Factor::Prices,
            rows: vec![row("GM1", 1.0, None), row("GM9", 2.0, None)],
        };
        let payload = map_payload(&boundaries(&["GM1"]), &data, ColorColumn::Moves);
        assert_eq!(payload.locations.len(), 2);
        assert_eq!(payload.geometry.features.len(), 1);
        assert_eq!(payload.feature_id_key, "properties.statcode");
    }

    #[test]
    fn table_payload_lists_headers() {
        let table = RankingTable {
            factor: Factor::Prices,
            rows: vec![],
        };
        let payload = TablePayload::from(&table);
        assert_eq!(payload.columns, vec!["gemeente_naam", "Totaal verhuizingen", "prices"]);
        assert!(payload.records.is_empty());
    }

    #[test]
    fn labels_follow_the_selected_options() {
        let selection = Selection {
            city: City::Utrecht,
            direction: Direction::To,
            factor: Factor::Prices,
            sort_by_moves: true,
            years: [2016].into_iter().collect(),
        };
        assert_eq!(
            SelectionLabels::from(&selection),
            SelectionLabels {
                direction: "Towards",
                factor: "Average Housing Prices",
            }
        );
    }
}
