// Motion trace log
// Append-only JSONL record of one joint's movement during a guided session

use chrono::{Local, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::hand::{Handedness, JointId, SerializableVec3};

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type TraceResult<T> = Result<T, TraceError>;

/// Motion trace settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// MOVE samples per second
    pub sample_hz: f32,

    /// Movements shorter than this do not add to the total distance
    pub deadzone_meters: f32,

    /// Buffered lines before a write
    pub flush_every_lines: usize,

    /// Joint whose position is traced
    pub joint: JointId,
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            sample_hz: 10.0,
            deadzone_meters: 0.005,
            flush_every_lines: 60,
            joint: JointId::Palm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceEvent {
    Start,
    Pause,
    Resume,
    Stop,
    Move,
}

/// One line of the trace file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSample {
    pub session_id: String,

    /// Unix time in milliseconds
    pub timestamp_ms: i64,

    pub event: TraceEvent,

    /// "R" or "L"
    pub hand: String,

    /// World position; zero for lifecycle events and lost reads
    pub position: SerializableVec3,

    pub delta_dist: f32,
    pub total_dist: f32,
}

impl TraceSample {
    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Appends batches of samples to a JSONL file
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Create (or truncate) the file
    pub fn create(&self) -> TraceResult<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::File::create(&self.file_path)?;
        Ok(())
    }

    pub fn write_batch(&self, samples: &[TraceSample]) -> TraceResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        for sample in samples {
            let json_line = sample.to_json_line()?;
            file.write_all(json_line.as_bytes())?;
        }

        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

struct TraceSession {
    id: String,
    hand: String,
    writer: TraceWriter,
    buffer: Vec<TraceSample>,

    /// False while paused
    recording: bool,

    since_sample: Duration,
    previous: Option<Vector3<f32>>,
    total_dist: f32,
}

impl TraceSession {
    fn push(&mut self, event: TraceEvent, position: Vector3<f32>, delta_dist: f32) {
        self.buffer.push(TraceSample {
            session_id: self.id.clone(),
            timestamp_ms: Utc::now().timestamp_millis(),
            event,
            hand: self.hand.clone(),
            position: SerializableVec3::from_vector(&position),
            delta_dist,
            total_dist: self.total_dist,
        });
    }

    fn flush(&mut self) -> TraceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.writer.write_batch(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }
}

/// One trace file per session under `<log_dir>/handlog_{session_id}.jsonl`
pub struct MotionTrace {
    config: TraceConfig,
    log_dir: PathBuf,
    session: Option<TraceSession>,
}

impl MotionTrace {
    pub fn new(config: TraceConfig, log_dir: impl Into<PathBuf>) -> Self {
        MotionTrace {
            config,
            log_dir: log_dir.into(),
            session: None,
        }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_recording(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.recording)
    }

    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.writer.path())
    }

    pub fn total_distance(&self) -> f32 {
        self.session.as_ref().map(|s| s.total_dist).unwrap_or(0.0)
    }

    /// Open a new trace file. A session already open is kept as is.
    pub fn start(&mut self, handedness: Handedness) -> TraceResult<PathBuf> {
        if let Some(session) = &self.session {
            return Ok(session.writer.path().to_path_buf());
        }

        let id = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let writer = TraceWriter::new(self.log_dir.join(format!("handlog_{}.jsonl", id)));
        writer.create()?;

        let mut session = TraceSession {
            id,
            hand: handedness.suffix().to_string(),
            writer,
            buffer: Vec::with_capacity(self.config.flush_every_lines),
            recording: true,
            since_sample: Duration::ZERO,
            previous: None,
            total_dist: 0.0,
        };
        session.push(TraceEvent::Start, Vector3::zeros(), 0.0);

        let path = session.writer.path().to_path_buf();
        log::info!("Motion trace started: {:?}", path);
        self.session = Some(session);
        Ok(path)
    }

    /// Feed one frame. Writes at most one MOVE line per sample period.
    ///
    /// `position` is None when the joint could not be read; that writes a
    /// zero sample and the next valid read starts a new distance chain.
    pub fn sample(&mut self, dt: Duration, position: Option<Vector3<f32>>) -> TraceResult<()> {
        let deadzone = self.config.deadzone_meters;
        let flush_every = self.config.flush_every_lines;
        let period = if self.config.sample_hz > 0.0 {
            // A rate too small to represent never samples
            Duration::try_from_secs_f64(1.0 / self.config.sample_hz as f64)
                .unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };

        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if !session.recording {
            return Ok(());
        }

        session.since_sample = session.since_sample.saturating_add(dt);
        if session.since_sample < period {
            return Ok(());
        }
        session.since_sample -= period;
        if session.since_sample >= period {
            // Long frame: no catch-up burst
            session.since_sample = Duration::ZERO;
        }

        match position {
            Some(pos) => {
                let mut delta = 0.0;
                if let Some(prev) = session.previous {
                    let d = (pos - prev).norm();
                    if d >= deadzone {
                        delta = d;
                        session.total_dist += d;
                    }
                }
                session.previous = Some(pos);
                session.push(TraceEvent::Move, pos, delta);
            }
            None => {
                session.previous = None;
                session.push(TraceEvent::Move, Vector3::zeros(), 0.0);
            }
        }

        if session.buffer.len() >= flush_every {
            session.flush()?;
        }
        Ok(())
    }

    pub fn pause(&mut self) -> TraceResult<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if !session.recording {
            return Ok(());
        }

        session.recording = false;
        session.previous = None;
        session.push(TraceEvent::Pause, Vector3::zeros(), 0.0);
        session.flush()?;
        log::info!("Motion trace paused");
        Ok(())
    }

    pub fn resume(&mut self) -> TraceResult<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if session.recording {
            return Ok(());
        }

        session.recording = true;
        session.since_sample = Duration::ZERO;
        session.push(TraceEvent::Resume, Vector3::zeros(), 0.0);
        log::info!("Motion trace resumed");
        Ok(())
    }

    /// Write STOP, flush and close. Returns the finished file, if a session was open.
    pub fn stop(&mut self) -> TraceResult<Option<PathBuf>> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };

        session.push(TraceEvent::Stop, Vector3::zeros(), 0.0);
        session.flush()?;

        let path = session.writer.path().to_path_buf();
        log::info!(
            "Motion trace stopped: {:?} ({:.3} m travelled)",
            path,
            session.total_dist
        );
        Ok(Some(path))
    }
}

impl Drop for MotionTrace {
    fn drop(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.flush() {
                log::error!("Failed to flush motion trace on drop: {}", e);
            }
        }
    }
}

/// Read trace samples from a JSONL file
pub fn read_trace_file(path: &Path) -> TraceResult<Vec<TraceSample>> {
    let contents = fs::read_to_string(path)?;
    let mut samples = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let sample: TraceSample = serde_json::from_str(line)?;
        samples.push(sample);
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FRAME: Duration = Duration::from_millis(100);

    fn events(samples: &[TraceSample]) -> Vec<TraceEvent> {
        samples.iter().map(|s| s.event).collect()
    }

    #[test]
    fn test_session_lifecycle_lines() {
        let temp_dir = TempDir::new().unwrap();
        let mut trace = MotionTrace::new(TraceConfig::default(), temp_dir.path().join("logs"));

        let path = trace.start(Handedness::Right).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("handlog_"));

        trace.sample(FRAME, Some(Vector3::new(0.0, 1.0, 0.0))).unwrap();
        trace.pause().unwrap();
        trace.sample(FRAME, Some(Vector3::new(0.5, 1.0, 0.0))).unwrap();
        trace.resume().unwrap();
        trace.sample(FRAME, Some(Vector3::new(0.0, 1.0, 0.1))).unwrap();
        let stopped = trace.stop().unwrap().unwrap();
        assert_eq!(stopped, path);
        assert!(!trace.is_active());

        let samples = read_trace_file(&path).unwrap();
        assert_eq!(
            events(&samples),
            vec![
                TraceEvent::Start,
                TraceEvent::Move,
                TraceEvent::Pause,
                TraceEvent::Resume,
                TraceEvent::Move,
                TraceEvent::Stop,
            ]
        );
        assert!(samples.iter().all(|s| s.hand == "R"));
        // Pause breaks the distance chain
        assert_eq!(samples[4].delta_dist, 0.0);
    }

    #[test]
    fn test_distance_and_deadzone() {
        let temp_dir = TempDir::new().unwrap();
        let mut trace = MotionTrace::new(TraceConfig::default(), temp_dir.path());
        trace.start(Handedness::Left).unwrap();

        trace.sample(FRAME, Some(Vector3::new(0.0, 0.0, 0.0))).unwrap();
        trace.sample(FRAME, Some(Vector3::new(0.002, 0.0, 0.0))).unwrap();
        trace.sample(FRAME, Some(Vector3::new(0.102, 0.0, 0.0))).unwrap();

        assert!((trace.total_distance() - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_lost_read_writes_zero_and_breaks_chain() {
        let temp_dir = TempDir::new().unwrap();
        let mut trace = MotionTrace::new(TraceConfig::default(), temp_dir.path());
        let path = trace.start(Handedness::Right).unwrap();

        trace.sample(FRAME, Some(Vector3::new(0.0, 0.0, 0.0))).unwrap();
        trace.sample(FRAME, None).unwrap();
        trace.sample(FRAME, Some(Vector3::new(0.3, 0.0, 0.0))).unwrap();
        trace.stop().unwrap();

        let samples = read_trace_file(&path).unwrap();
        assert_eq!(samples[2].position, SerializableVec3::default());
        assert_eq!(samples[3].delta_dist, 0.0);
        assert_eq!(samples[3].total_dist, 0.0);
    }

    #[test]
    fn test_sampling_rate() {
        let temp_dir = TempDir::new().unwrap();
        let mut trace = MotionTrace::new(TraceConfig::default(), temp_dir.path());
        let path = trace.start(Handedness::Right).unwrap();

        // 1 second of 20ms frames at 10 Hz
        for _ in 0..50 {
            trace
                .sample(Duration::from_millis(20), Some(Vector3::zeros()))
                .unwrap();
        }
        trace.stop().unwrap();

        let moves = read_trace_file(&path)
            .unwrap()
            .iter()
            .filter(|s| s.event == TraceEvent::Move)
            .count();
        assert_eq!(moves, 10);
    }

    #[test]
    fn test_tiny_sample_rate_writes_no_moves() {
        let temp_dir = TempDir::new().unwrap();
        let config = TraceConfig {
            sample_hz: f32::MIN_POSITIVE / 2.0,
            ..TraceConfig::default()
        };
        let mut trace = MotionTrace::new(config, temp_dir.path());
        let path = trace.start(Handedness::Right).unwrap();

        for _ in 0..20 {
            trace.sample(FRAME, Some(Vector3::zeros())).unwrap();
        }
        trace.stop().unwrap();

        let moves = read_trace_file(&path)
            .unwrap()
            .iter()
            .filter(|s| s.event == TraceEvent::Move)
            .count();
        assert_eq!(moves, 0);
    }

    #[test]
    fn test_buffer_flushes_every_n_lines() {
        let temp_dir = TempDir::new().unwrap();
        let config = TraceConfig {
            flush_every_lines: 5,
            ..TraceConfig::default()
        };
        let mut trace = MotionTrace::new(config, temp_dir.path());
        let path = trace.start(Handedness::Right).unwrap();

        for _ in 0..3 {
            trace.sample(FRAME, Some(Vector3::zeros())).unwrap();
        }
        assert!(read_trace_file(&path).unwrap().is_empty());

        trace.sample(FRAME, Some(Vector3::zeros())).unwrap();
        assert_eq!(read_trace_file(&path).unwrap().len(), 5);
    }

    #[test]
    fn test_sample_without_session_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let mut trace = MotionTrace::new(TraceConfig::default(), temp_dir.path());

        trace.sample(FRAME, Some(Vector3::zeros())).unwrap();
        trace.pause().unwrap();
        assert!(trace.stop().unwrap().is_none());
    }

    #[test]
    fn test_json_line_format() {
        let sample = TraceSample {
            session_id: "20260101_120000".to_string(),
            timestamp_ms: 1,
            event: TraceEvent::Move,
            hand: "L".to_string(),
            position: SerializableVec3::default(),
            delta_dist: 0.0,
            total_dist: 0.0,
        };
        let json_line = sample.to_json_line().unwrap();

        assert!(json_line.ends_with('\n'));
        assert!(json_line.contains("\"event\":\"MOVE\""));
        let parsed: TraceSample = serde_json::from_str(json_line.trim()).unwrap();
        assert_eq!(parsed, sample);
    }
}
