//! One-shot JSON export of the monitor state.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use upwatch_engine::{FleetSnapshot, LatencyPoint, Monitor, Status};

/// Trailing window of latency history included in exports.
pub const EXPORT_HISTORY_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Build the export document: a summary, the full snapshot and the
/// recent latency history.
pub fn build_export(snapshot: &FleetSnapshot, history: &[LatencyPoint]) -> Result<serde_json::Value> {
    let mut export = serde_json::Map::new();

    let mut summary = serde_json::Map::new();
    summary.insert(
        "overall".to_string(),
        serde_json::json!(snapshot.overall.label()),
    );
    summary.insert(
        "weighted_latency_ms".to_string(),
        serde_json::json!(snapshot.weighted_latency),
    );
    summary.insert(
        "total_entities".to_string(),
        serde_json::json!(snapshot.entity_count()),
    );
    for status in Status::ALL {
        summary.insert(
            status.label().to_lowercase(),
            serde_json::json!(snapshot.count_by_status(status)),
        );
    }
    export.insert("summary".to_string(), serde_json::Value::Object(summary));

    export.insert(
        "snapshot".to_string(),
        serde_json::to_value(snapshot).context("Failed to serialize snapshot")?,
    );
    export.insert(
        "latency_history".to_string(),
        serde_json::to_value(history).context("Failed to serialize latency history")?,
    );

    Ok(serde_json::Value::Object(export))
}

/// Write the current monitor state to `path` as pretty JSON.
pub fn export_to_file(monitor: &Monitor, path: &Path) -> Result<()> {
    let snapshot = monitor.snapshot();
    let history = monitor.latency_history(EXPORT_HISTORY_WINDOW);
    let export = build_export(&snapshot, &history)?;

    let json = serde_json::to_string_pretty(&export)?;
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(json.as_bytes())?;

    println!("Exported monitor state to: {}", path.display());
    Ok(())
}
