// Session controller
// Wires lifecycle signals, the anchor lock, the recorder or guided playback,
// the motion trace and the result history into one per-frame entry point

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::notify::{Notification, NotificationQueue, SessionState};
use super::timing::{serde_secs, Cooldown};
use super::trace::{MotionTrace, TraceConfig};
use crate::anchor::{AnchorConfig, AnchorLock, AnchorState};
use crate::capture::PoseRecorder;
use crate::error::{GuidanceError, GuidanceResult};
use crate::hand::{
    read_world_pose, AnchorFrame, GateStatus, Handedness, JointSource, TrackingConfig,
    TrackingGate,
};
use crate::playback::{GuidedPlayback, PlaybackConfig, PlaybackState, ScoreResult};
use crate::state::{get_app_data_dir, record_result, DbConnection, SavedSequence, SequenceStore};

/// What the session is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Therapist records a sequence
    Authoring,
    /// Patient follows a recorded sequence
    Exercise,
}

/// Full session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: SessionMode,
    pub exercise_id: u32,
    pub handedness: Handedness,

    /// Shared by start, pause and resume
    #[serde(with = "serde_secs")]
    pub signal_cooldown: Duration,

    /// Shared by capture and clear
    #[serde(with = "serde_secs")]
    pub capture_cooldown: Duration,

    /// Root for `poses/` and `logs/`; the app data directory when unset
    pub data_dir: Option<PathBuf>,

    pub tracking: TrackingConfig,
    pub anchor: AnchorConfig,
    pub playback: PlaybackConfig,
    pub trace: TraceConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            mode: SessionMode::Exercise,
            exercise_id: 0,
            handedness: Handedness::Right,
            signal_cooldown: Duration::from_millis(500),
            capture_cooldown: Duration::from_millis(250),
            data_dir: None,
            tracking: TrackingConfig::default(),
            anchor: AnchorConfig::default(),
            playback: PlaybackConfig::default(),
            trace: TraceConfig::default(),
        }
    }
}

pub struct SessionController {
    config: SessionConfig,
    store: SequenceStore,
    gate: TrackingGate,
    anchor: AnchorLock,

    /// Authoring mode only
    recorder: Option<PoseRecorder>,

    playback: GuidedPlayback,
    trace: MotionTrace,
    history: Option<DbConnection>,
    notify: NotificationQueue,

    /// Sum of every tick delta, drives the cooldowns
    now: Duration,
    signal_cooldown: Cooldown,
    capture_cooldown: Cooldown,
}

impl SessionController {
    /// Build every component for one session.
    ///
    /// The session-level exercise id and hand override the ones in the
    /// nested anchor and playback configs. In authoring mode the existing
    /// sequence is loaded here, so a corrupt file fails initialization.
    pub fn initialize(mut config: SessionConfig) -> GuidanceResult<Self> {
        config.anchor.handedness = config.handedness;
        config.playback.handedness = config.handedness;
        config.playback.exercise_id = config.exercise_id;

        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => get_app_data_dir()?,
        };
        let store = SequenceStore::new(&data_dir);
        let origin = config.tracking.origin;

        let recorder = match config.mode {
            SessionMode::Authoring => Some(PoseRecorder::initialize(
                store.clone(),
                config.exercise_id,
                config.handedness,
                origin,
            )?),
            SessionMode::Exercise => None,
        };

        let mut notify = NotificationQueue::new();
        notify.push(Notification::SessionState {
            state: SessionState::Idle,
        });

        log::info!(
            "Session initialized: {:?} exercise {} ({} hand) at {:?}",
            config.mode,
            config.exercise_id,
            config.handedness.to_string(),
            data_dir
        );

        Ok(SessionController {
            gate: TrackingGate::new(config.tracking.ready_timeout),
            anchor: AnchorLock::new(config.anchor.clone(), origin),
            recorder,
            playback: GuidedPlayback::new(config.playback.clone(), origin),
            trace: MotionTrace::new(config.trace.clone(), data_dir.join("logs")),
            history: None,
            notify,
            now: Duration::ZERO,
            signal_cooldown: Cooldown::new(config.signal_cooldown),
            capture_cooldown: Cooldown::new(config.capture_cooldown),
            store,
            config,
        })
    }

    /// Record finished sessions in this database
    pub fn with_history(mut self, db: DbConnection) -> Self {
        self.history = Some(db);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mode(&self) -> SessionMode {
        self.config.mode
    }

    pub fn store(&self) -> &SequenceStore {
        &self.store
    }

    pub fn anchor(&self) -> &AnchorLock {
        &self.anchor
    }

    pub fn recorder(&self) -> Option<&PoseRecorder> {
        self.recorder.as_ref()
    }

    pub fn playback(&self) -> &GuidedPlayback {
        &self.playback
    }

    pub fn trace(&self) -> &MotionTrace {
        &self.trace
    }

    pub fn tracking_status(&self) -> GateStatus {
        self.gate.status()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notify.drain()
    }

    /// Advance every component by one frame. Returns the score on the
    /// frame guided playback finishes.
    pub fn tick(&mut self, dt: Duration, source: &dyn JointSource) -> Option<ScoreResult> {
        self.now += dt;

        let was_waiting = self.gate.status() == GateStatus::Waiting;
        if self.gate.poll(dt, source) == GateStatus::TimedOut && was_waiting {
            self.notify.push(Notification::TrackingUnavailable);
        }

        let mut finished = None;
        if self.playback.is_active() {
            if let Some(result) = self.playback.tick(dt, source, &mut self.notify) {
                self.on_finished(&result);
                finished = Some(result);
            } else {
                self.sample_trace(dt, source);
            }
        }

        if let Some(frame) = self.anchor.tick(dt, source, &mut self.notify) {
            self.on_anchor_locked(&frame);
        }

        finished
    }

    /// Start signal: begin the anchor countdown
    pub fn start(&mut self, source: &dyn JointSource) -> GuidanceResult<bool> {
        if !self.signal_cooldown.try_acquire(self.now) {
            log::debug!("Start signal dropped by cooldown");
            return Ok(false);
        }
        if self.anchor.state() != AnchorState::Idle {
            log::debug!("Start ignored: anchor is {:?}", self.anchor.state());
            return Ok(false);
        }

        // A finished run must be cleared before a new one
        if self.playback.state() == PlaybackState::Finished {
            self.playback.stop(&mut self.notify);
        }

        match self.anchor.start(source, &mut self.notify) {
            Ok(()) => Ok(true),
            Err(e) => {
                self.notify.push(Notification::failed("start", &e));
                Err(e)
            }
        }
    }

    pub fn pause(&mut self) -> bool {
        if !self.signal_cooldown.try_acquire(self.now) {
            log::debug!("Pause signal dropped by cooldown");
            return false;
        }
        if !self.playback.pause(&mut self.notify) {
            return false;
        }
        if let Err(e) = self.trace.pause() {
            log::error!("Failed to pause motion trace: {}", e);
        }
        true
    }

    pub fn resume(&mut self) -> bool {
        if !self.signal_cooldown.try_acquire(self.now) {
            log::debug!("Resume signal dropped by cooldown");
            return false;
        }
        if !self.playback.resume(&mut self.notify) {
            return false;
        }
        if let Err(e) = self.trace.resume() {
            log::error!("Failed to resume motion trace: {}", e);
        }
        true
    }

    /// End the session without a score. Never rate-limited.
    pub fn stop(&mut self) -> bool {
        let anchor_was_idle = self.anchor.state() == AnchorState::Idle;
        let playback_was_active = self.playback.is_active();

        let stopped_playback = self.playback.stop(&mut self.notify);
        self.anchor.reset();
        self.stop_trace();

        if !anchor_was_idle && !playback_was_active {
            self.notify.push(Notification::HideText);
            self.notify.push(Notification::SessionState {
                state: SessionState::Idle,
            });
        }

        let stopped = stopped_playback || !anchor_was_idle;
        if stopped {
            log::info!("Session stopped");
        }
        stopped
    }

    /// Capture the live hand as the next step (authoring mode)
    pub fn capture_step(
        &mut self,
        source: &dyn JointSource,
    ) -> GuidanceResult<Option<SavedSequence>> {
        if !self.capture_cooldown.try_acquire(self.now) {
            log::debug!("Capture signal dropped by cooldown");
            return Ok(None);
        }

        let frame = self.anchor.frame().copied();
        let Some(recorder) = self.recorder.as_mut() else {
            return Err(refuse_outside_authoring(&mut self.notify, "capture_step"));
        };
        let saved = recorder.capture_step(frame.as_ref(), source, &mut self.notify)?;
        Ok(Some(saved))
    }

    /// Erase the recorded sequence (authoring mode)
    pub fn clear_sequence(&mut self) -> GuidanceResult<Option<SavedSequence>> {
        if !self.capture_cooldown.try_acquire(self.now) {
            log::debug!("Clear signal dropped by cooldown");
            return Ok(None);
        }

        let Some(recorder) = self.recorder.as_mut() else {
            return Err(refuse_outside_authoring(&mut self.notify, "clear_sequence"));
        };
        let saved = recorder.clear_sequence(&mut self.notify)?;
        Ok(Some(saved))
    }

    /// Halt every countdown, wait and log. The controller can be
    /// started again afterwards.
    pub fn teardown(&mut self) {
        self.playback.stop(&mut self.notify);
        self.anchor.reset();
        self.stop_trace();
        self.gate.reset();
        self.signal_cooldown.reset();
        self.capture_cooldown.reset();
        log::info!("Session torn down");
    }

    fn on_anchor_locked(&mut self, frame: &AnchorFrame) {
        if self.config.mode != SessionMode::Exercise {
            self.notify.push(Notification::SessionState {
                state: SessionState::Recording,
            });
            return;
        }

        match self.playback.start(&self.store, frame, &mut self.notify) {
            Ok(true) => {
                self.notify.push(Notification::SessionState {
                    state: SessionState::Recording,
                });
                if let Err(e) = self.trace.start(self.config.handedness) {
                    log::error!("Failed to start motion trace: {}", e);
                }
            }
            Ok(false) => {
                log::warn!("Nothing to play for exercise {}", self.config.exercise_id);
                self.abandon_lock();
            }
            Err(e) => {
                log::error!("Guided playback failed to start: {}", e);
                self.notify.push(Notification::failed("start_playback", &e));
                self.abandon_lock();
            }
        }
    }

    /// Release an anchor that has nothing to drive, so a later start can retry
    fn abandon_lock(&mut self) {
        self.anchor.reset();
        self.notify.push(Notification::HideText);
        self.notify.push(Notification::SessionState {
            state: SessionState::Idle,
        });
    }

    fn on_finished(&mut self, result: &ScoreResult) {
        self.stop_trace();
        self.anchor.reset();

        let Some(db) = &self.history else {
            return;
        };
        let sha256 = match self
            .store
            .sequence_sha256(self.config.exercise_id, self.config.handedness)
        {
            Ok(sha) => sha,
            Err(e) => {
                log::warn!("Could not hash played sequence: {}", e);
                None
            }
        };
        let steps = self.playback.sequence().len() as u32;

        if let Err(e) = record_result(
            db,
            self.config.exercise_id,
            self.config.handedness,
            sha256,
            steps,
            result,
        ) {
            log::error!("Failed to record exercise result: {}", e);
            self.notify.push(Notification::failed("record_result", &e));
        }
    }

    fn sample_trace(&mut self, dt: Duration, source: &dyn JointSource) {
        if !self.trace.is_recording() {
            return;
        }
        let position = read_world_pose(
            source,
            &self.config.tracking.origin,
            self.config.handedness,
            self.trace.config().joint,
        )
        .map(|pose| pose.position);

        if let Err(e) = self.trace.sample(dt, position) {
            log::error!("Motion trace write failed: {}", e);
        }
    }

    fn stop_trace(&mut self) {
        if let Err(e) = self.trace.stop() {
            log::error!("Failed to stop motion trace: {}", e);
        }
    }
}

fn refuse_outside_authoring(notify: &mut NotificationQueue, operation: &str) -> GuidanceError {
    let e = GuidanceError::ConfigurationMissing(format!(
        "{} requires an authoring session",
        operation
    ));
    log::warn!("{}", e);
    notify.push(Notification::failed(operation, &e));
    e
}
