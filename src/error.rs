use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Library error type
// ---------------------------------------------------------------------------

/// Errors surfaced to whoever dispatches render requests.
///
/// All of them are structural (bad input or bad files); none are transient,
/// so nothing in the crate retries.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The dataset for a (direction, city) pair is missing or malformed.
    #[error("dataset not available at {}: {reason}", path.display())]
    DatasetNotFound { path: PathBuf, reason: String },

    /// Empty or out-of-domain year selection, unknown city or direction.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// Factor identifier is not known, or the dataset lacks its column.
    #[error("unknown factor: {0}")]
    UnknownFactor(String),

    /// The municipality boundary file could not be used.
    #[error("boundaries not available at {}: {reason}", path.display())]
    BoundariesUnavailable { path: PathBuf, reason: String },
}

impl DashboardError {
    /// Stable machine-readable name used in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardError::DatasetNotFound { .. } => "dataset_not_found",
            DashboardError::InvalidSelection(_) => "invalid_selection",
            DashboardError::UnknownFactor(_) => "unknown_factor",
            DashboardError::BoundariesUnavailable { .. } => "boundaries_unavailable",
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_path_and_reason() {
        let err = DashboardError::DatasetNotFound {
            path: PathBuf::from("QueryDFs/From_Breda.parquet"),
            reason: "no such file".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("From_Breda.parquet"));
        assert!(msg.contains("no such file"));
        assert_eq!(err.kind(), "dataset_not_found");
    }

    #[test]
    fn kinds_are_distinct() {
        let kinds = [
            DashboardError::InvalidSelection("x".into()).kind(),
            DashboardError::UnknownFactor("x".into()).kind(),
            DashboardError::BoundariesUnavailable {
                path: PathBuf::new(),
                reason: String::new(),
            }
            .kind(),
        ];
        assert_eq!(kinds, ["invalid_selection", "unknown_factor", "boundaries_unavailable"]);
    }
}
