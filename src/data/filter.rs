use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::model::{Factor, MovementDataset, MovementRecord};
use crate::error::{DashboardError, Result};

// ---------------------------------------------------------------------------
// Aggregated rows: one per municipality
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRow {
    pub code: String,
    pub name: String,
    /// Most recent year included in this row.
    pub year: u16,
    /// Missing only for a single-year row whose count is missing.
    pub moves: Option<f64>,
    pub factor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedDataset {
    pub factor: Factor,
    pub rows: Vec<AggregatedRow>,
}

impl AggregatedDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Restrict `dataset` to `years`.
///
/// * one year → the rows of that year, unchanged apart from column selection
/// * several years → one row per municipality, moves summed, factor taken
///   from the latest year (see [`aggregate`])
///
/// An empty selection, or one sharing no year with the dataset, is an
/// [`DashboardError::InvalidSelection`].
pub fn filter_years(
    dataset: &MovementDataset,
    years: &BTreeSet<u16>,
    factor: Factor,
) -> Result<AggregatedDataset> {
    if years.is_empty() {
        return Err(DashboardError::InvalidSelection("no years selected".into()));
    }
    dataset.require_factor(factor)?;

    let present = dataset.years();
    if years.is_disjoint(&present) {
        return Err(DashboardError::InvalidSelection(format!(
            "none of the years {years:?} are in the dataset (has {present:?})"
        )));
    }

    let selected = dataset.records.iter().filter(|r| years.contains(&r.year));

    let rows = if years.len() == 1 {
        selected
            .map(|r| AggregatedRow {
                code: r.code.clone(),
                name: r.name.clone(),
                year: r.year,
                moves: r.moves,
                factor: r.factor(factor),
            })
            .collect()
    } else {
        aggregate(selected, factor)
    };

    log::debug!(
        "Filtered {} rows to {} for years {years:?}",
        dataset.len(),
        rows.len()
    );

    Ok(AggregatedDataset { factor, rows })
}

/// Collapse records to one row per municipality code.
///
/// Moves are summed over the counts present, so a group with no count at
/// all sums to zero. The factor is the last value present when the group is
/// ordered by year ascending; missing values do not overwrite earlier ones.
/// Output is ordered by municipality code.
pub fn aggregate<'a>(
    records: impl IntoIterator<Item = &'a MovementRecord>,
    factor: Factor,
) -> Vec<AggregatedRow> {
    let mut groups: BTreeMap<&str, Vec<&MovementRecord>> = BTreeMap::new();
    for rec in records {
        groups.entry(rec.code.as_str()).or_default().push(rec);
    }

    groups
        .into_iter()
        .filter_map(|(code, mut group)| {
            group.sort_by_key(|r| r.year);
            let latest = group.last()?;
            Some(AggregatedRow {
                code: code.to_string(),
                name: latest.name.clone(),
                year: latest.year,
                moves: Some(group.iter().filter_map(|r| r.moves).sum()),
                factor: group.iter().rev().find_map(|r| r.factor(factor)),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(code: &str, year: u16, moves: f64, price: Option<f64>) -> MovementRecord {
        MovementRecord {
            code: code.into(),
            name: format!("name-{code}"),
            year,
            moves: Some(moves),
            measures: [("prices_other".to_string(), price)].into_iter().collect(),
        }
    }

    fn dataset() -> MovementDataset {
        MovementDataset::from_records(vec![
            rec("A", 2016, 10.0, Some(100.0)),
            rec("A", 2017, 20.0, Some(120.0)),
            rec("B", 2016, 5.0, Some(80.0)),
            rec("B", 2017, 5.0, None),
            rec("C", 2018, 7.0, Some(60.0)),
        ])
        .unwrap()
    }

    fn years(ys: &[u16]) -> BTreeSet<u16> {
        ys.iter().copied().collect()
    }

    #[test]
    fn single_year_is_plain_subset() {
        let ds = dataset();
        let out = filter_years(&ds, &years(&[2016]), Factor::Prices).unwrap();
        let expected: Vec<_> = ds.records.iter().filter(|r| r.year == 2016).collect();
        assert_eq!(out.len(), expected.len());
        for (row, r) in out.rows.iter().zip(expected) {
            assert_eq!(row.code, r.code);
            assert_eq!(row.year, 2016);
            assert_eq!(row.moves, r.moves);
            assert_eq!(row.factor, r.factor(Factor::Prices));
        }
    }

    #[test]
    fn multi_year_sums_moves_and_keeps_latest_factor() {
        let out = filter_years(&dataset(), &years(&[2016, 2017]), Factor::Prices).unwrap();
        assert_eq!(out.len(), 2);

        let a = &out.rows[0];
        assert_eq!((a.code.as_str(), a.moves, a.factor, a.year), ("A", Some(30.0), Some(120.0), 2017));

        // 2017 has no price for B, so the 2016 value is the last one present.
        let b = &out.rows[1];
        assert_eq!((b.code.as_str(), b.moves, b.factor), ("B", Some(10.0), Some(80.0)));
    }

    #[test]
    fn missing_counts_stay_missing_for_one_year_and_are_skipped_in_sums() {
        let mut gap = rec("D", 2017, 0.0, Some(50.0));
        gap.moves = None;
        let ds = MovementDataset::from_records(vec![
            rec("A", 2016, 10.0, Some(1.0)),
            rec("D", 2016, 4.0, Some(40.0)),
            gap,
        ])
        .unwrap();

        let single = filter_years(&ds, &years(&[2017]), Factor::Prices).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.rows[0].moves, None);

        let multi = filter_years(&ds, &years(&[2016, 2017]), Factor::Prices).unwrap();
        let d = multi.rows.iter().find(|r| r.code == "D").unwrap();
        assert_eq!((d.moves, d.factor), (Some(4.0), Some(50.0)));
    }

    #[test]
    fn municipality_absent_from_range_is_omitted() {
        let out = filter_years(&dataset(), &years(&[2016, 2017]), Factor::Prices).unwrap();
        assert!(out.rows.iter().all(|r| r.code != "C"));
    }

    #[test]
    fn partially_covered_selection_still_aggregates() {
        let out = filter_years(&dataset(), &years(&[2018, 2024]), Factor::Prices).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.rows[0].code, "C");
    }

    #[test]
    fn empty_selection_is_invalid() {
        let err = filter_years(&dataset(), &BTreeSet::new(), Factor::Prices).unwrap_err();
        assert!(matches!(err, DashboardError::InvalidSelection(_)));
    }

    #[test]
    fn out_of_domain_year_is_invalid() {
        let err = filter_years(&dataset(), &years(&[2025]), Factor::Prices).unwrap_err();
        assert!(matches!(err, DashboardError::InvalidSelection(_)));
    }

    #[test]
    fn missing_factor_column_is_unknown_factor() {
        let err = filter_years(&dataset(), &years(&[2016]), Factor::Population).unwrap_err();
        assert!(matches!(err, DashboardError::UnknownFactor(_)));
    }

    #[test]
    fn filtering_is_pure_and_repeatable() {
        let ds = dataset();
        let before = ds.clone();
        let first = filter_years(&ds, &years(&[2016, 2017]), Factor::Prices).unwrap();
        let second = filter_years(&ds, &years(&[2016, 2017]), Factor::Prices).unwrap();
        assert_eq!(first, second);
        assert_eq!(ds, before);
    }
}
