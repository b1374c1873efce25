//! CSV and JSON exporters for offline analysis.
//!
//! Two CSV tables per run (metrics history and measurements) plus one JSON
//! document with the configuration, history and final engine snapshot.

use crate::scenarios::ScenarioId;
use chrono::Local;
use serde::{Deserialize, Serialize};
use skywatch_core::{Engine, EngineSnapshot, Measurement, MetricsSnapshot, SimConfig};
use skywatch_env::EntropySource;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const METRICS_HEADER: &str = "time_s,field_area_pct,anomalies,roaming_agents,charging_agents";
pub const MEASUREMENTS_HEADER: &str = "agent_id,time_s,intensity,x,y";

/// Export failures.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Builds `<dir>/<stem>_<YYYYmmdd_HHMMSS>.<ext>` from the local time.
pub fn timestamped_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{}_{}.{}", stem, timestamp, ext))
}

/// Writes the metrics history table.
pub fn write_metrics_csv<W: Write>(mut out: W, history: &[MetricsSnapshot]) -> Result<(), ExportError> {
    writeln!(out, "{}", METRICS_HEADER)?;
    for m in history {
        writeln!(
            out,
            "{:.1},{:.2},{},{},{}",
            m.time_secs(),
            m.field_area_above_threshold * 100.0,
            m.live_anomalies,
            m.roaming_agents,
            m.charging_agents
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Writes `(agent_id, measurement)` rows.
pub fn write_measurements_csv<'a, W, I>(mut out: W, rows: I) -> Result<(), ExportError>
where
    W: Write,
    I: IntoIterator<Item = (usize, &'a Measurement)>,
{
    writeln!(out, "{}", MEASUREMENTS_HEADER)?;
    for (agent_id, m) in rows {
        writeln!(
            out,
            "{},{:.1},{:.3},{:.1},{:.1}",
            agent_id,
            m.timestamp_ms as f64 / 1000.0,
            m.intensity,
            m.x,
            m.y
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Every measurement the engine knows about: uploaded ones first, then those
/// still held by drones, in drone order.
pub fn measurement_rows<E: EntropySource>(engine: &Engine<E>) -> Vec<(usize, &Measurement)> {
    let uploaded = engine
        .uploads()
        .iter()
        .map(|u| (u.agent_id, &u.measurement));
    let in_flight = engine
        .agents()
        .iter()
        .flat_map(|a| a.measurements().iter().map(move |m| (a.id(), m)));
    uploaded.chain(in_flight).collect()
}

/// Complete run export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunExport {
    /// Unique id of this export
    pub run_id: Uuid,

    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Local time the export was made (RFC 3339)
    pub exported_at: String,

    pub config: SimConfig,

    /// Metrics sampled at the snapshot interval
    pub history: Vec<MetricsSnapshot>,

    /// Engine state at the end of the run
    pub snapshot: EngineSnapshot,
}

impl RunExport {
    /// Captures a finished engine.
    pub fn from_engine<E: EntropySource>(scenario: ScenarioId, engine: &Engine<E>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scenario: scenario.name().to_string(),
            seed: engine.config().seed,
            exported_at: Local::now().to_rfc3339(),
            config: engine.config().clone(),
            history: engine.metrics().history().to_vec(),
            snapshot: engine.snapshot(),
        }
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &Path) -> Result<(), ExportError> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, self)?;
        out.flush()?;
        Ok(())
    }
}

/// Files written by [`export_run`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPaths {
    pub metrics_csv: PathBuf,
    pub measurements_csv: PathBuf,
    pub run_json: PathBuf,
}

/// Writes both CSV tables and the JSON export into `dir`, creating it if
/// needed.
pub fn export_run<E: EntropySource>(
    dir: &Path,
    scenario: ScenarioId,
    engine: &Engine<E>,
) -> Result<ExportPaths, ExportError> {
    fs::create_dir_all(dir)?;

    let paths = ExportPaths {
        metrics_csv: timestamped_path(dir, &format!("{}_metrics", scenario.name()), "csv"),
        measurements_csv: timestamped_path(dir, &format!("{}_measurements", scenario.name()), "csv"),
        run_json: timestamped_path(dir, &format!("{}_run", scenario.name()), "json"),
    };

    write_metrics_csv(
        BufWriter::new(File::create(&paths.metrics_csv)?),
        engine.metrics().history(),
    )?;
    write_measurements_csv(
        BufWriter::new(File::create(&paths.measurements_csv)?),
        measurement_rows(engine),
    )?;
    RunExport::from_engine(scenario, engine).write_to_file(&paths.run_json)?;

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScenarioRunner;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("skywatch-export-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_metrics_csv_format() {
        let history = vec![
            MetricsSnapshot {
                time_ms: 0,
                ..Default::default()
            },
            MetricsSnapshot {
                time_ms: 5_000,
                field_area_above_threshold: 0.0123,
                live_anomalies: 3,
                roaming_agents: 6,
                charging_agents: 1,
                ..Default::default()
            },
        ];
        let mut buf = Vec::new();
        write_metrics_csv(&mut buf, &history).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], METRICS_HEADER);
        assert_eq!(lines[1], "0.0,0.00,0,0,0");
        assert_eq!(lines[2], "5.0,1.23,3,6,1");
    }

    #[test]
    fn test_measurements_csv_format() {
        let reading = Measurement {
            intensity: 0.87654,
            timestamp_ms: 12_400,
            x: 3.26,
            y: 10.0,
        };
        let mut buf = Vec::new();
        write_measurements_csv(&mut buf, [(4, &reading)]).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, format!("{}\n4,12.4,0.877,3.3,10.0\n", MEASUREMENTS_HEADER));
    }

    #[test]
    fn test_timestamped_path_shape() {
        let path = timestamped_path(Path::new("out"), "normal_metrics", "csv");
        let name = path.file_name().unwrap().to_str().unwrap();

        assert!(path.starts_with("out"));
        assert!(name.starts_with("normal_metrics_"));
        assert!(name.ends_with(".csv"));
        // stem + '_' + YYYYmmdd_HHMMSS + ".csv"
        assert_eq!(name.len(), "normal_metrics_".len() + 15 + 4);
    }

    #[test]
    fn test_export_run_writes_files() {
        let dir = scratch_dir();
        let (_, engine) = ScenarioRunner::new(42, 3)
            .with_duration(20.0)
            .execute(ScenarioId::HeavyPollution)
            .unwrap();

        let paths = export_run(&dir, ScenarioId::HeavyPollution, &engine).unwrap();

        let metrics = fs::read_to_string(&paths.metrics_csv).unwrap();
        assert_eq!(metrics.lines().count(), 1 + engine.metrics().history().len());

        let measurements = fs::read_to_string(&paths.measurements_csv).unwrap();
        assert_eq!(measurements.lines().count(), 1 + measurement_rows(&engine).len());

        let json = fs::read_to_string(&paths.run_json).unwrap();
        let parsed: RunExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.scenario, "heavy_pollution");
        assert_eq!(parsed.seed, 42);
        assert_eq!(parsed.snapshot.tick_count, engine.tick_count());
        assert_eq!(parsed.snapshot.agents.len(), 3);
        assert_eq!(parsed.history.len(), engine.metrics().history().len());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_export_into_file_path_fails() {
        let dir = scratch_dir();
        fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();

        let (_, engine) = ScenarioRunner::new(1, 1)
            .with_duration(1.0)
            .execute(ScenarioId::NoAnomalies)
            .unwrap();

        let err = export_run(&blocker, ScenarioId::NoAnomalies, &engine).unwrap_err();
        assert!(matches!(err, ExportError::Io(_)));

        fs::remove_dir_all(&dir).unwrap();
    }
}
