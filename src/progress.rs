use crate::detect::FineVerdict;
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Idle,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FineStatus {
    Yes,
    No,
    Error,
}

impl FineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FineStatus::Yes => "Yes",
            FineStatus::No => "No",
            FineStatus::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "Success",
            Outcome::Error => "Error",
        }
    }
}

/// Screenshot evidence for one plate; serializes as the path or `"none"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    Captured(PathBuf),
    None,
}

impl Evidence {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Evidence::Captured(p) => Some(p),
            Evidence::None => None,
        }
    }
}

impl Serialize for Evidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Evidence::Captured(p) => serializer.serialize_str(&p.display().to_string()),
            Evidence::None => serializer.serialize_str("none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlateResult {
    pub plate: String,
    pub fine_status: FineStatus,
    pub outcome: Outcome,
    pub screenshot_path: Evidence,
    pub details: String,
}

impl PlateResult {
    pub fn checked(plate: &str, verdict: FineVerdict, evidence: Evidence, details: String) -> Self {
        Self {
            plate: plate.to_string(),
            fine_status: if verdict.has_fine {
                FineStatus::Yes
            } else {
                FineStatus::No
            },
            outcome: Outcome::Success,
            screenshot_path: evidence,
            details,
        }
    }

    pub fn failed(plate: &str, error: impl Into<String>) -> Self {
        Self {
            plate: plate.to_string(),
            fine_status: FineStatus::Error,
            outcome: Outcome::Error,
            screenshot_path: Evidence::None,
            details: error.into(),
        }
    }

    pub fn has_fine(&self) -> bool {
        self.fine_status == FineStatus::Yes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgress {
    pub state: JobState,
    pub message: String,
    pub current_plate: String,
    pub total: usize,
    pub processed: usize,
    pub percent: f64,
    pub results: Vec<PlateResult>,
    #[serde(serialize_with = "path_or_empty")]
    pub report_path: Option<PathBuf>,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self {
            state: JobState::Idle,
            message: "Ready to start".into(),
            current_plate: String::new(),
            total: 0,
            processed: 0,
            percent: 0.0,
            results: Vec::new(),
            report_path: None,
        }
    }
}

fn path_or_empty<S: Serializer>(path: &Option<PathBuf>, serializer: S) -> Result<S::Ok, S::Error> {
    match path {
        Some(p) => serializer.serialize_str(&p.display().to_string()),
        None => serializer.serialize_str(""),
    }
}

/// `round(processed / total * 100, 1)` clamped to `[0, 100]`; zero for an empty batch.
pub fn percent(processed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = processed as f64 / total as f64 * 100.0;
    ((raw * 10.0).round() / 10.0).clamp(0.0, 100.0)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("a job is already running")]
    AlreadyRunning,
}

/// Shared status of the current (or last) batch job.
///
/// Handlers read snapshots; the batch worker is the only writer once a job
/// has been started through [`ProgressStore::try_begin`].
#[derive(Debug, Clone, Default)]
pub struct ProgressStore {
    inner: Arc<Mutex<JobProgress>>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JobProgress> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> JobProgress {
        self.lock().clone()
    }

    /// Resets the store for a new job of `total` plates, unless one is running.
    pub fn try_begin(&self, total: usize) -> Result<(), StartError> {
        let mut p = self.lock();
        if p.state == JobState::Processing {
            return Err(StartError::AlreadyRunning);
        }
        *p = JobProgress {
            state: JobState::Processing,
            message: "Starting...".into(),
            total,
            ..JobProgress::default()
        };
        Ok(())
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.lock().message = message.into();
    }

    pub fn set_step(&self, message: impl Into<String>, current_plate: &str, processed: usize) {
        let mut p = self.lock();
        p.message = message.into();
        p.current_plate = current_plate.to_string();
        p.processed = processed.min(p.total);
        p.percent = percent(p.processed, p.total);
    }

    /// Appends a finished plate and advances `processed` by one.
    pub fn record(&self, result: PlateResult, message: impl Into<String>) {
        let mut p = self.lock();
        p.current_plate = result.plate.clone();
        p.results.push(result);
        p.processed = (p.processed + 1).min(p.total);
        p.percent = percent(p.processed, p.total);
        p.message = message.into();
    }

    pub fn results(&self) -> Vec<PlateResult> {
        self.lock().results.clone()
    }

    pub fn complete(&self, report_path: PathBuf) {
        let mut p = self.lock();
        p.state = JobState::Completed;
        p.processed = p.total;
        p.percent = 100.0;
        p.report_path = Some(report_path);
        p.message = "Process completed. Report ready for download.".into();
    }

    pub fn fail(&self, message: impl Into<String>) {
        let mut p = self.lock();
        p.state = JobState::Error;
        p.percent = 0.0;
        p.message = message.into();
    }

    pub fn report_path(&self) -> Option<PathBuf> {
        self.lock().report_path.clone()
    }
}
