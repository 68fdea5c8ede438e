use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use moves_dashboard::boundary::Boundaries;
use moves_dashboard::config::Config;
use moves_dashboard::render::render;
use moves_dashboard::selection::{Selection, SelectionRequest};
use moves_dashboard::DashboardError;
use serde_json::json;

/// Request loop: one JSON selection per stdin line, one JSON response per
/// stdout line. The dashboard front end drives it on every input change.
fn main() -> Result<()> {
    env_logger::init();

    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::resolve(explicit.as_deref())?;
    let boundaries = Boundaries::load(&config.boundaries_path, &config.feature_id_property)?;

    let mut input = io::stdin().lock();
    let mut out = io::stdout().lock();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).context("reading request")? == 0 {
            break;
        }
        if let Some(response) = respond_bytes(&config, &boundaries, &buf)? {
            writeln!(out, "{response}")?;
            out.flush()?;
        }
    }

    Ok(())
}

/// Response for one raw input line, `None` for a blank line. Bytes that are
/// not UTF-8 get an error payload like any other bad request.
fn respond_bytes(config: &Config, boundaries: &Boundaries, line: &[u8]) -> Result<Option<String>> {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line,
        Err(e) => {
            let err = DashboardError::InvalidSelection(format!("request is not UTF-8: {e}"));
            return error_payload(&err).map(Some);
        }
    };
    if line.trim().is_empty() {
        return Ok(None);
    }
    respond(config, boundaries, line).map(Some)
}

fn respond(config: &Config, boundaries: &Boundaries, line: &str) -> Result<String> {
    let rendered = serde_json::from_str::<SelectionRequest>(line)
        .map_err(|e| DashboardError::InvalidSelection(format!("malformed request: {e}")))
        .and_then(Selection::try_from)
        .and_then(|selection| render(config, boundaries, &selection));

    match rendered {
        Ok(rendered) => Ok(serde_json::to_string(&rendered)?),
        Err(e) => error_payload(&e),
    }
}

fn error_payload(err: &DashboardError) -> Result<String> {
    log::error!("Request failed: {err}");
    Ok(serde_json::to_string(&json!({
        "error": { "kind": err.kind(), "message": err.to_string() }
    }))?)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tempfile::TempDir;

    use super::*;

    const BOUNDARIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"statcode": "GM0001"},
             "geometry": {"type": "Point", "coordinates": [5.0, 52.0]}}
        ]
    }"#;

    const DATASET: &str = r#"[
        {"gemeente_code": "GM0001", "gemeente_naam": "A", "year": 2016, "moves": 10,
         "prices_other": 100.0, "prices_top_10": 500.0}
    ]"#;

    fn fixture() -> (TempDir, Config, Boundaries) {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("QueryDFs");
        std::fs::create_dir(&data_dir).unwrap();
        std::fs::write(data_dir.join("From_Amsterdam.json"), DATASET).unwrap();
        let boundaries_path = dir.path().join("new.geojson");
        std::fs::write(&boundaries_path, BOUNDARIES).unwrap();

        let config = Config {
            data_dir,
            boundaries_path,
            ..Config::default()
        };
        let boundaries =
            Boundaries::load(&config.boundaries_path, &config.feature_id_property).unwrap();
        (dir, config, boundaries)
    }

    fn answer(line: &[u8]) -> Value {
        let (_dir, config, boundaries) = fixture();
        let response = respond_bytes(&config, &boundaries, line).unwrap().unwrap();
        serde_json::from_str(&response).unwrap()
    }

    fn error_kind(response: &Value) -> &str {
        response["error"]["kind"].as_str().unwrap()
    }

    #[test]
    fn valid_request_renders_map_and_table() {
        let out = answer(br#"{"city": "Amsterdam", "direction": "From", "years": [2016]}"#);
        assert!(out.get("error").is_none());
        assert_eq!(out["map"]["locations"][0]["code"], "GM0001");
        assert_eq!(out["table"]["records"][0]["gemeente_naam"], "Amsterdam");
        assert_eq!(out["labels"]["factor"], "Average Housing Prices");
    }

    #[test]
    fn bad_requests_become_error_lines() {
        let out = answer(b"{not json");
        assert_eq!(error_kind(&out), "invalid_selection");
        assert!(out["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("malformed request"));

        assert_eq!(error_kind(&answer(br#"{"city": "Leiden"}"#)), "invalid_selection");
        assert_eq!(error_kind(&answer(br#"{"years": []}"#)), "invalid_selection");
        assert_eq!(error_kind(&answer(br#"{"years": [2025]}"#)), "invalid_selection");
        assert_eq!(
            error_kind(&answer(br#"{"city": "Breda", "years": [2016]}"#)),
            "dataset_not_found"
        );
    }

    #[test]
    fn non_utf8_line_is_an_error_line() {
        let out = answer(b"{\"city\": \"\xff\xfe\"}\n");
        assert_eq!(error_kind(&out), "invalid_selection");
    }

    #[test]
    fn blank_lines_get_no_response() {
        let (_dir, config, boundaries) = fixture();
        assert!(respond_bytes(&config, &boundaries, b"  \n").unwrap().is_none());
    }
}
