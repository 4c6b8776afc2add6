use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;
use uuid::Uuid;

use super::error::{EvalError, EvalResult};
use super::metrics::{EvaluationRecord, Metrics};
use crate::config::PipelineConfig;

/// Serialized outcome of one evaluation run.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub run_id: String,
    /// RFC 3339, UTC.
    pub started_at: String,
    pub finished_at: String,
    pub selector: String,
    pub config: PipelineConfig,
    pub metrics: Metrics,
    /// In dataset order.
    pub records: Vec<EvaluationRecord>,
}

impl EvaluationReport {
    pub fn new(
        started_at: DateTime<Utc>,
        selector: String,
        config: PipelineConfig,
        mut records: Vec<EvaluationRecord>,
    ) -> Self {
        records.sort_by_key(|r| r.index);
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            selector,
            config,
            metrics: Metrics::compute(&records),
            records,
        }
    }

    pub fn to_json(&self) -> EvalResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the report as pretty JSON, replacing `path` atomically.
    pub fn write(&self, path: &Path) -> EvalResult<()> {
        let io_err = |source| EvalError::WriteReport {
            path: path.to_path_buf(),
            source,
        };
        let json = self.to_json()?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}
