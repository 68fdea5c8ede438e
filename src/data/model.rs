use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context};
use serde::Serialize;

use crate::error::DashboardError;

/// Years every stored dataset covers.
pub const YEAR_DOMAIN: [u16; 5] = [2016, 2017, 2018, 2019, 2020];

/// Most recent complete year; the subject city's own factor value is read here.
pub const REFERENCE_YEAR: u16 = 2020;

pub const CODE_COLUMN: &str = "gemeente_code";
pub const NAME_COLUMN: &str = "gemeente_naam";
pub const YEAR_COLUMN: &str = "year";
pub const MOVES_COLUMN: &str = "moves";

// ---------------------------------------------------------------------------
// CellValue – a single cell of a loaded table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell as it comes out of Parquet, JSON or CSV.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) if !v.is_nan() => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_numeric_or_null(&self) -> bool {
        !matches!(self, CellValue::Text(_))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

/// One loaded table row: column name → cell.
pub type RawRow = BTreeMap<String, CellValue>;

// ---------------------------------------------------------------------------
// Fixed selector domains
// ---------------------------------------------------------------------------

/// The ten subject cities a dataset exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum City {
    Almere,
    Amsterdam,
    Breda,
    DenHaag,
    Eindhoven,
    Groningen,
    Nijmegen,
    Rotterdam,
    Tilburg,
    Utrecht,
}

impl City {
    pub const ALL: [City; 10] = [
        City::Almere,
        City::Amsterdam,
        City::Breda,
        City::DenHaag,
        City::Eindhoven,
        City::Groningen,
        City::Nijmegen,
        City::Rotterdam,
        City::Tilburg,
        City::Utrecht,
    ];

    /// Identifier used in dataset file names and as the display name.
    pub fn file_stem(self) -> &'static str {
        match self {
            City::Almere => "Almere",
            City::Amsterdam => "Amsterdam",
            City::Breda => "Breda",
            City::DenHaag => "DenHaag",
            City::Eindhoven => "Eindhoven",
            City::Groningen => "Groningen",
            City::Nijmegen => "Nijmegen",
            City::Rotterdam => "Rotterdam",
            City::Tilburg => "Tilburg",
            City::Utrecht => "Utrecht",
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

impl FromStr for City {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        City::ALL
            .into_iter()
            .find(|c| c.file_stem().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| DashboardError::InvalidSelection(format!("unknown city '{s}'")))
    }
}

/// Whether moves are counted out of the subject city or into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Direction {
    From,
    To,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::From, Direction::To];

    pub fn file_prefix(self) -> &'static str {
        match self {
            Direction::From => "From",
            Direction::To => "To",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::From => "From",
            Direction::To => "Towards",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_prefix())
    }
}

impl FromStr for Direction {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "from" => Ok(Direction::From),
            "to" | "towards" => Ok(Direction::To),
            _ => Err(DashboardError::InvalidSelection(format!(
                "unknown direction '{s}'"
            ))),
        }
    }
}

/// Secondary measure that can drive the map colouring.
///
/// Each factor is stored twice per row: `<id>_other` holds the value for the
/// row's municipality, `<id>_top_10` the value for the subject city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Factor {
    Availability,
    Prices,
    Population,
}

impl Factor {
    pub const ALL: [Factor; 3] = [Factor::Availability, Factor::Prices, Factor::Population];

    pub fn id(self) -> &'static str {
        match self {
            Factor::Availability => "availability",
            Factor::Prices => "prices",
            Factor::Population => "population",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Factor::Availability => "availability_other",
            Factor::Prices => "prices_other",
            Factor::Population => "population_other",
        }
    }

    pub fn subject_column(self) -> &'static str {
        match self {
            Factor::Availability => "availability_top_10",
            Factor::Prices => "prices_top_10",
            Factor::Population => "population_top_10",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Factor::Availability => "Housing Availability",
            Factor::Prices => "Average Housing Prices",
            Factor::Population => "Population Size",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Factor {
    type Err = DashboardError;

    /// Accepts `prices` as well as the storage name `prices_other`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let id = trimmed.strip_suffix("_other").unwrap_or(trimmed);
        Factor::ALL
            .into_iter()
            .find(|f| f.id().eq_ignore_ascii_case(id))
            .ok_or_else(|| DashboardError::UnknownFactor(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// MovementRecord – one (municipality, year) row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MovementRecord {
    /// Municipality code, e.g. `GM0363`; joins rows to boundary features.
    pub code: String,
    pub name: String,
    pub year: u16,
    /// `None` where the count is missing (null or NaN).
    pub moves: Option<f64>,
    /// Numeric measure columns (factor values), `None` where missing.
    pub measures: BTreeMap<String, Option<f64>>,
}

impl MovementRecord {
    pub fn measure(&self, column: &str) -> Option<f64> {
        self.measures.get(column).copied().flatten()
    }

    pub fn factor(&self, factor: Factor) -> Option<f64> {
        self.measure(factor.column())
    }

    pub fn subject_factor(&self, factor: Factor) -> Option<f64> {
        self.measure(factor.subject_column())
    }

    /// Interpret a raw row. Key columns are required; every other numeric
    /// column becomes a measure and text columns are ignored.
    pub fn from_row(row: &RawRow) -> anyhow::Result<Self> {
        let code = match row.get(CODE_COLUMN) {
            Some(CellValue::Text(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(CellValue::Integer(i)) => i.to_string(),
            _ => bail!("missing or empty '{CODE_COLUMN}'"),
        };

        let name = match row.get(NAME_COLUMN) {
            Some(CellValue::Text(s)) => s.clone(),
            Some(CellValue::Null) | None => bail!("missing '{NAME_COLUMN}' for {code}"),
            Some(other) => other.to_string(),
        };

        let year = row
            .get(YEAR_COLUMN)
            .and_then(CellValue::as_f64)
            .filter(|y| y.fract() == 0.0 && *y >= 0.0 && *y <= f64::from(u16::MAX))
            .map(|y| y as u16)
            .with_context(|| format!("missing or invalid '{YEAR_COLUMN}' for {code}"))?;

        let moves = match row.get(MOVES_COLUMN) {
            Some(CellValue::Null) => None,
            Some(CellValue::Float(v)) if v.is_nan() => None,
            Some(v) => Some(
                v.as_f64()
                    .with_context(|| format!("'{MOVES_COLUMN}' is not a number for {code}"))?,
            ),
            None => bail!("missing '{MOVES_COLUMN}' column for {code}"),
        };
        if let Some(m) = moves.filter(|m| *m < 0.0) {
            bail!("negative move count {m} for {code} in {year}");
        }

        let measures = row
            .iter()
            .filter(|(col, _)| {
                !matches!(
                    col.as_str(),
                    CODE_COLUMN | NAME_COLUMN | YEAR_COLUMN | MOVES_COLUMN
                )
            })
            .filter(|(_, val)| val.is_numeric_or_null())
            .map(|(col, val)| (col.clone(), val.as_f64()))
            .collect();

        Ok(MovementRecord {
            code,
            name,
            year,
            moves,
            measures,
        })
    }
}

// ---------------------------------------------------------------------------
// MovementDataset – all rows for one (city, direction) pair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MovementDataset {
    pub records: Vec<MovementRecord>,
    /// Every measure column seen in at least one row.
    pub measure_columns: BTreeSet<String>,
}

impl MovementDataset {
    /// Build from parsed records, rejecting a municipality listed twice in
    /// the same year.
    pub fn from_records(records: Vec<MovementRecord>) -> anyhow::Result<Self> {
        let mut seen: HashSet<(&str, u16)> = HashSet::with_capacity(records.len());
        for rec in &records {
            if !seen.insert((rec.code.as_str(), rec.year)) {
                bail!("municipality {} appears twice in {}", rec.code, rec.year);
            }
        }

        let measure_columns = records
            .iter()
            .flat_map(|r| r.measures.keys().cloned())
            .collect();

        Ok(MovementDataset {
            records,
            measure_columns,
        })
    }

    pub fn from_rows(rows: &[RawRow]) -> anyhow::Result<Self> {
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, row)| MovementRecord::from_row(row).with_context(|| format!("row {i}")))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Self::from_records(records)
    }

    /// Years actually present in the rows.
    pub fn years(&self) -> BTreeSet<u16> {
        self.records.iter().map(|r| r.year).collect()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.measure_columns.contains(column)
    }

    /// Fail with [`DashboardError::UnknownFactor`] when the factor's column
    /// is absent.
    pub fn require_factor(&self, factor: Factor) -> crate::error::Result<()> {
        if self.is_empty() || self.has_column(factor.column()) {
            Ok(())
        } else {
            Err(DashboardError::UnknownFactor(format!(
                "dataset has no '{}' column",
                factor.column()
            )))
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, CellValue)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn base_row(code: &str, year: i64) -> RawRow {
        row(&[
            (CODE_COLUMN, CellValue::Text(code.into())),
            (NAME_COLUMN, CellValue::Text(format!("Gemeente {code}"))),
            (YEAR_COLUMN, CellValue::Integer(year)),
            (MOVES_COLUMN, CellValue::Float(12.0)),
            ("prices_other", CellValue::Float(310_000.0)),
            ("prices_top_10", CellValue::Null),
            ("source", CellValue::Text("cbs".into())),
        ])
    }

    #[test]
    fn record_from_row_splits_keys_and_measures() {
        let rec = MovementRecord::from_row(&base_row("GM0363", 2017)).unwrap();
        assert_eq!(rec.code, "GM0363");
        assert_eq!(rec.year, 2017);
        assert_eq!(rec.moves, Some(12.0));
        assert_eq!(rec.factor(Factor::Prices), Some(310_000.0));
        assert_eq!(rec.subject_factor(Factor::Prices), None);
        assert!(rec.measures.contains_key("prices_top_10"));
        assert!(!rec.measures.contains_key("source"));
    }

    #[test]
    fn float_year_is_accepted_but_fractional_is_not() {
        let mut r = base_row("GM0014", 2016);
        r.insert(YEAR_COLUMN.into(), CellValue::Float(2018.0));
        assert_eq!(MovementRecord::from_row(&r).unwrap().year, 2018);

        r.insert(YEAR_COLUMN.into(), CellValue::Float(2018.5));
        assert!(MovementRecord::from_row(&r).is_err());
    }

    #[test]
    fn null_and_nan_moves_are_missing() {
        let mut r = base_row("GM0014", 2016);
        r.insert(MOVES_COLUMN.into(), CellValue::Null);
        assert_eq!(MovementRecord::from_row(&r).unwrap().moves, None);

        r.insert(MOVES_COLUMN.into(), CellValue::Float(f64::NAN));
        assert_eq!(MovementRecord::from_row(&r).unwrap().moves, None);

        r.insert(MOVES_COLUMN.into(), CellValue::Text("veel".into()));
        assert!(MovementRecord::from_row(&r).is_err());
    }

    #[test]
    fn negative_moves_are_rejected() {
        let mut r = base_row("GM0014", 2016);
        r.insert(MOVES_COLUMN.into(), CellValue::Integer(-3));
        assert!(MovementRecord::from_row(&r).is_err());
    }

    #[test]
    fn duplicate_code_within_year_is_malformed() {
        let rows = vec![base_row("GM0014", 2016), base_row("GM0014", 2016)];
        assert!(MovementDataset::from_rows(&rows).is_err());

        let rows = vec![base_row("GM0014", 2016), base_row("GM0014", 2017)];
        let ds = MovementDataset::from_rows(&rows).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.years().into_iter().collect::<Vec<_>>(), vec![2016, 2017]);
    }

    #[test]
    fn require_factor_checks_column() {
        let ds = MovementDataset::from_rows(&[base_row("GM0014", 2016)]).unwrap();
        assert!(ds.require_factor(Factor::Prices).is_ok());
        assert!(matches!(
            ds.require_factor(Factor::Population),
            Err(DashboardError::UnknownFactor(_))
        ));
    }

    #[test]
    fn selector_domains_parse() {
        assert_eq!("DenHaag".parse::<City>().unwrap(), City::DenHaag);
        assert_eq!("den haag".parse::<City>().unwrap(), City::DenHaag);
        assert!("Leiden".parse::<City>().is_err());

        assert_eq!("Towards".parse::<Direction>().unwrap(), Direction::To);
        assert_eq!("From".parse::<Direction>().unwrap(), Direction::From);

        assert_eq!("prices_other".parse::<Factor>().unwrap(), Factor::Prices);
        assert_eq!("population".parse::<Factor>().unwrap(), Factor::Population);
        assert!(matches!(
            "crime_other".parse::<Factor>(),
            Err(DashboardError::UnknownFactor(_))
        ));
    }
}
