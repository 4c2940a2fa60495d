// THEORY:
// The `metadata` module owns the provenance records a run produces and the
// two summary artifacts persisted at run end. The JSON artifact mirrors the
// record structure; the CSV artifact is the same data flattened to one row
// per fault application for spreadsheet-style consumers.
//
// Record keys are a compatibility surface: downstream dataset tooling
// expects `base_name`, `level`, `timestamp`, and a `faults` array of
// `{filename, type, category}` objects. Entries that are stubs or failures
// additionally carry a `status` (and `reason`) so consumers can filter
// them out of a training set.

use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::core_modules::intensity::IntensityLevel;
use crate::core_modules::registry::FaultKind;
use crate::error::GenerationError;

pub const JSON_SUMMARY_FILE: &str = "global_metadata_summary.json";
pub const CSV_SUMMARY_FILE: &str = "global_metadata_summary.csv";

const CSV_HEADER: &str = "base_name,level,timestamp,filename,fault_name,category";

/// How one fault application ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// The transform produced degraded pixel data.
    Applied,
    /// The fault is registered but unimplemented; the output is a tagged
    /// placeholder.
    Stub,
    /// The transform refused the image or missed its deadline.
    Failed,
    /// Cancellation arrived before the unit started.
    Skipped,
}

impl UnitStatus {
    fn is_applied(&self) -> bool {
        matches!(self, UnitStatus::Applied)
    }
}

/// Provenance of one (image, level, fault) application.
#[derive(Debug, Clone, Serialize)]
pub struct FaultResult {
    /// The generated output filename, `{base}_{fault}_{category}_{level}.jpg`.
    pub filename: String,
    /// The fault identifier.
    #[serde(rename = "type")]
    pub fault: String,
    /// The category label.
    pub category: String,
    /// Omitted from the artifact for ordinary applied units.
    #[serde(skip_serializing_if = "UnitStatus::is_applied")]
    pub status: UnitStatus,
    /// The failure reason, present only for failed units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FaultResult {
    pub fn new(fault: FaultKind, filename: String, status: UnitStatus, reason: Option<String>) -> Self {
        FaultResult {
            filename,
            fault: fault.identifier().to_string(),
            category: fault.category().label().to_string(),
            status,
            reason,
        }
    }
}

/// Provenance of one fully completed (image, level) group.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRecord {
    pub base_name: String,
    pub level: IntensityLevel,
    /// ISO-8601 local timestamp taken when the group completed.
    pub timestamp: String,
    /// Fault results in selection order, regardless of completion order.
    pub faults: Vec<FaultResult>,
}

/// The full provenance of one run, append-only, possibly truncated by
/// cancellation.
pub type GenerationSummary = Vec<GenerationRecord>;

/// Writes `global_metadata_summary.json` into `dir`.
pub fn write_summary_json(dir: &Path, summary: &GenerationSummary) -> Result<(), GenerationError> {
    let path = dir.join(JSON_SUMMARY_FILE);
    let payload = serde_json::to_string_pretty(summary)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
        .and_then(|payload| fs::write(&path, payload));
    payload.map_err(|source| GenerationError::OutputWrite { path, source })
}

/// Writes `global_metadata_summary.csv` into `dir`: the header plus one
/// row per fault result.
pub fn write_summary_csv(dir: &Path, summary: &GenerationSummary) -> Result<(), GenerationError> {
    let path = dir.join(CSV_SUMMARY_FILE);
    let mut rows = String::from(CSV_HEADER);
    rows.push('\n');
    for record in summary {
        for fault in &record.faults {
            let row = [
                record.base_name.as_str(),
                record.level.label(),
                record.timestamp.as_str(),
                fault.filename.as_str(),
                fault.fault.as_str(),
                fault.category.as_str(),
            ]
            .map(csv_field)
            .join(",");
            rows.push_str(&row);
            rows.push('\n');
        }
    }
    fs::write(&path, rows).map_err(|source| GenerationError::OutputWrite { path, source })
}

/// Quotes a field when it contains a delimiter, quote, or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> GenerationSummary {
        vec![GenerationRecord {
            base_name: "cam01, front".to_string(),
            level: IntensityLevel::Low,
            timestamp: "2025-06-01T12:00:00+00:00".to_string(),
            faults: vec![
                FaultResult::new(
                    FaultKind::Blur,
                    "cam01_blur_Environmental_low.jpg".to_string(),
                    UnitStatus::Applied,
                    None,
                ),
                FaultResult::new(
                    FaultKind::Raindrop,
                    "cam01_raindrop_Environmental_low.jpg".to_string(),
                    UnitStatus::Stub,
                    None,
                ),
            ],
        }]
    }

    #[test]
    fn json_artifact_uses_the_compatibility_keys() {
        let encoded = serde_json::to_value(sample_summary()).unwrap();
        let record = &encoded[0];
        assert_eq!(record["level"], "low");
        let applied = &record["faults"][0];
        assert_eq!(applied["type"], "blur");
        assert_eq!(applied["category"], "Environmental");
        assert!(applied.get("status").is_none());
        let stub = &record["faults"][1];
        assert_eq!(stub["status"], "stub");
    }

    #[test]
    fn csv_artifact_flattens_one_row_per_fault() {
        let dir = std::env::temp_dir().join(format!("fault_forge_csv_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        write_summary_csv(&dir, &sample_summary()).unwrap();
        let body = fs::read_to_string(dir.join(CSV_SUMMARY_FILE)).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        // The comma in the base name forces quoting.
        assert!(lines[1].starts_with("\"cam01, front\",low,"));
        fs::remove_dir_all(&dir).ok();
    }
}
