//! Municipality boundaries.
//!
//! The boundary file is a `GeoJSON` `FeatureCollection`; each feature carries
//! the municipality code in a property (`statcode` by default), which is the
//! same code the movement datasets use.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context};
use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::Value as JsonValue;

use crate::error::{DashboardError, Result};

pub struct Boundaries {
    id_property: String,
    features: Vec<Feature>,
    /// municipality code -> index into `features`
    index: BTreeMap<String, usize>,
}

impl Boundaries {
    /// Loads and indexes the boundary file.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::BoundariesUnavailable`] if the file cannot be
    /// read or is not a `GeoJSON` feature collection.
    pub fn load(path: &Path, id_property: &str) -> Result<Self> {
        let parse = || -> anyhow::Result<Self> {
            let text = std::fs::read_to_string(path).context("reading boundary file")?;
            let geojson: GeoJson = text.parse().context("parsing GeoJSON")?;
            let GeoJson::FeatureCollection(collection) = geojson else {
                bail!("expected a FeatureCollection");
            };
            Ok(Self::from_collection(collection, id_property))
        };

        let boundaries = parse().map_err(|e| DashboardError::BoundariesUnavailable {
            path: path.to_path_buf(),
            reason: format!("{e:#}"),
        })?;

        log::info!(
            "Loaded {} municipality boundaries from {}",
            boundaries.len(),
            path.display()
        );
        Ok(boundaries)
    }

    /// Index a collection by `id_property`. Features without it are skipped.
    pub fn from_collection(collection: FeatureCollection, id_property: &str) -> Self {
        let mut features = Vec::with_capacity(collection.features.len());
        let mut index = BTreeMap::new();

        for feature in collection.features {
            let Some(code) = feature.property(id_property).and_then(property_code) else {
                log::warn!("Skipping boundary feature without '{id_property}'");
                continue;
            };
            if index.contains_key(&code) {
                log::warn!("Duplicate boundary for {code}, keeping the first");
                continue;
            }
            index.insert(code, features.len());
            features.push(feature);
        }

        Self {
            id_property: id_property.to_string(),
            features,
            index,
        }
    }

    pub fn get(&self, code: &str) -> Option<&Feature> {
        self.index.get(code).map(|&i| &self.features[i])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    /// Key the charting layer matches locations on, e.g. `properties.statcode`.
    pub fn feature_id_key(&self) -> String {
        format!("properties.{}", self.id_property)
    }

    /// Collection with only the features for `codes`, in the order given.
    pub fn subset<'a>(&self, codes: impl IntoIterator<Item = &'a str>) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: codes
                .into_iter()
                .filter_map(|code| self.get(code).cloned())
                .collect(),
            foreign_members: None,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn property_code(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
