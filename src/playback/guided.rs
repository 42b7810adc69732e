// Guided playback
// Shows each recorded step as targets, evaluates the live hand every frame,
// counts down between steps and scores the run when the last step is held

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::scoring::{FrameTally, ScoreResult, ScoringConfig, ScoringEngine};
use super::targets::{advance_ready, Classification, EvaluationTarget, RenderHandle, TargetBinding};
use crate::capture::{PoseSequence, PoseSnapshot};
use crate::error::{GuidanceError, GuidanceResult};
use crate::hand::{
    compose_world_rotations, from_anchor_local, read_world_pose, AnchorFrame, Handedness,
    JointId, JointSource, Pose, RigidTransform, ALL_JOINTS,
};
use crate::session::notify::{Notification, NotificationQueue, SessionState};
use crate::session::timing::{serde_secs, Countdown, SessionClock};
use crate::state::SequenceStore;

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub exercise_id: u32,
    pub handedness: Handedness,

    /// Consecutive Near frames before a target counts as held
    pub required_frames: u32,

    /// Every valid target must be held to advance (otherwise one may lag)
    pub required_all_targets: bool,

    /// Marginal band as a multiple of each target's radius
    pub marginal_factor: f32,

    /// Countdown shown between steps
    pub step_countdown_counts: u32,
    #[serde(with = "serde_secs")]
    pub step_countdown_interval: Duration,

    /// Duration of PAUSED/RESUME/FINISH! messages
    #[serde(with = "serde_secs")]
    pub flash: Duration,

    pub targets: Vec<TargetBinding>,

    /// Hologram joints the host can pose, keyed by joint
    pub hologram: BTreeMap<JointId, RenderHandle>,

    pub scoring: ScoringConfig,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            exercise_id: 0,
            handedness: Handedness::Right,
            required_frames: 15,
            required_all_targets: true,
            marginal_factor: 1.5,
            step_countdown_counts: 3,
            step_countdown_interval: Duration::from_secs(1),
            flash: Duration::from_millis(700),
            targets: Vec::new(),
            hologram: BTreeMap::new(),
            scoring: ScoringConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    ShowingStep { index: usize },
    Evaluating { index: usize },
    Advancing { next_index: usize },
    Finished,
}

/// Where one target sphere goes for the shown step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetView {
    pub joint: JointId,
    pub handle: RenderHandle,
    pub position: Vector3<f32>,
}

/// Everything the host needs to pose the hologram for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepView {
    pub index: usize,
    pub steps: usize,

    /// Wrist pose in world space
    pub wrist: Pose,

    /// Recorded parent-relative rotations, parents first, hologram joints only
    pub local_rotations: Vec<(JointId, UnitQuaternion<f32>)>,

    /// The same joints composed down the hierarchy into world rotations
    pub world_rotations: Vec<(JointId, UnitQuaternion<f32>)>,

    pub targets: Vec<TargetView>,
}

impl StepView {
    pub fn build(
        index: usize,
        steps: usize,
        step: &PoseSnapshot,
        anchor: &AnchorFrame,
        hologram: &BTreeMap<JointId, RenderHandle>,
        targets: &[EvaluationTarget],
    ) -> Self {
        let local = step.local_rotations();
        let composed = compose_world_rotations(&local);

        let local_rotations = ALL_JOINTS
            .iter()
            .filter(|joint| hologram.contains_key(*joint))
            .filter_map(|joint| local.get(joint).map(|q| (*joint, *q)))
            .collect();
        let world_rotations = ALL_JOINTS
            .iter()
            .filter(|joint| hologram.contains_key(*joint))
            .filter_map(|joint| composed.get(joint).map(|q| (*joint, anchor.rotation * q)))
            .collect();

        let targets = targets
            .iter()
            .filter_map(|t| match (t.handle, t.position) {
                (Some(handle), Some(position)) => Some(TargetView {
                    joint: t.joint,
                    handle,
                    position,
                }),
                _ => None,
            })
            .collect();

        StepView {
            index,
            steps,
            wrist: from_anchor_local(&step.wrist_pose.to_pose(), anchor),
            local_rotations,
            world_rotations,
            targets,
        }
    }
}

pub struct GuidedPlayback {
    config: PlaybackConfig,

    /// Tracking space -> world space
    origin: RigidTransform,

    scoring: ScoringEngine,
    state: PlaybackState,
    paused: bool,

    sequence: PoseSequence,
    anchor: Option<AnchorFrame>,
    targets: Vec<EvaluationTarget>,
    tally: FrameTally,
    clock: SessionClock,
    countdown: Option<Countdown>,
    result: Option<ScoreResult>,
}

impl GuidedPlayback {
    pub fn new(config: PlaybackConfig, origin: RigidTransform) -> Self {
        let scoring = ScoringEngine::with_config(config.scoring.clone());
        let sequence = PoseSequence::empty(config.handedness);

        GuidedPlayback {
            config,
            origin,
            scoring,
            state: PlaybackState::Idle,
            paused: false,
            sequence,
            anchor: None,
            targets: Vec::new(),
            tally: FrameTally::default(),
            clock: SessionClock::new(),
            countdown: None,
            result: None,
        }
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// ShowingStep, Evaluating or Advancing
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::ShowingStep { .. }
                | PlaybackState::Evaluating { .. }
                | PlaybackState::Advancing { .. }
        )
    }

    /// Set once when the last step completes
    pub fn result(&self) -> Option<&ScoreResult> {
        self.result.as_ref()
    }

    pub fn sequence(&self) -> &PoseSequence {
        &self.sequence
    }

    pub fn targets(&self) -> &[EvaluationTarget] {
        &self.targets
    }

    pub fn tally(&self) -> &FrameTally {
        &self.tally
    }

    pub fn elapsed_active(&self) -> Duration {
        self.clock.elapsed_active()
    }

    /// Load the configured sequence and show its first step.
    ///
    /// Returns Ok(false) and stays Idle when there is nothing to play or
    /// playback is not Idle. A corrupt sequence file is an error.
    pub fn start(
        &mut self,
        store: &SequenceStore,
        anchor: &AnchorFrame,
        notify: &mut NotificationQueue,
    ) -> GuidanceResult<bool> {
        if self.state != PlaybackState::Idle {
            log::debug!("Playback start ignored in state {:?}", self.state);
            return Ok(false);
        }

        if self.config.hologram.is_empty() {
            log::error!("Playback start refused: hologram joint map is empty");
            return Err(GuidanceError::ConfigurationMissing(
                "hologram joint map is empty".to_string(),
            ));
        }
        if !self.config.targets.iter().any(|t| t.handle.is_some()) {
            log::error!("Playback start refused: no target has a render handle");
            return Err(GuidanceError::ConfigurationMissing(
                "no evaluation target has a render handle".to_string(),
            ));
        }

        let sequence = store.load(self.config.exercise_id, self.config.handedness)?;
        if sequence.is_empty() {
            log::warn!(
                "No steps recorded for exercise {} ({} hand), playback stays idle",
                self.config.exercise_id,
                self.config.handedness.to_string()
            );
            return Ok(false);
        }

        log::info!(
            "Playback starting: exercise {}, {} steps",
            self.config.exercise_id,
            sequence.len()
        );

        self.sequence = sequence;
        self.anchor = Some(*anchor);
        self.targets.clear();
        self.tally = FrameTally::default();
        self.countdown = None;
        self.result = None;
        self.paused = false;
        self.clock.start();

        self.show_step(0, notify);
        Ok(true)
    }

    /// Advance one frame. Returns the score on the frame the run finishes.
    pub fn tick(
        &mut self,
        dt: Duration,
        source: &dyn JointSource,
        notify: &mut NotificationQueue,
    ) -> Option<ScoreResult> {
        self.clock.advance(dt);
        if self.paused {
            return None;
        }

        match self.state {
            PlaybackState::Idle | PlaybackState::Finished => None,
            PlaybackState::ShowingStep { index } => {
                self.show_step(index, notify);
                None
            }
            PlaybackState::Evaluating { index } => {
                if self.evaluate(source, notify) {
                    self.begin_advance(index + 1, notify);
                }
                None
            }
            PlaybackState::Advancing { next_index } => {
                let finished = match self.countdown.as_mut() {
                    Some(countdown) => {
                        let tick = countdown.tick(dt);
                        if let Some(count) = tick.shown {
                            notify.push(Notification::Countdown { count });
                        }
                        tick.finished
                    }
                    None => true,
                };
                if !finished {
                    return None;
                }

                self.countdown = None;
                notify.push(Notification::HideText);
                if next_index >= self.sequence.len() {
                    Some(self.finish(notify))
                } else {
                    self.show_step(next_index, notify);
                    None
                }
            }
        }
    }

    /// Freeze evaluation, countdowns and the active-time clock
    pub fn pause(&mut self, notify: &mut NotificationQueue) -> bool {
        if !self.is_active() || self.paused {
            return false;
        }
        self.paused = true;
        self.clock.pause();

        notify.push(Notification::flash("PAUSED", self.config.flash));
        notify.push(Notification::SessionState {
            state: SessionState::Paused,
        });
        log::info!("Playback paused in {:?}", self.state);
        true
    }

    pub fn resume(&mut self, notify: &mut NotificationQueue) -> bool {
        if !self.paused {
            return false;
        }
        self.paused = false;
        self.clock.resume();

        notify.push(Notification::flash("RESUME", self.config.flash));
        notify.push(Notification::SessionState {
            state: SessionState::Recording,
        });
        log::info!(
            "Playback resumed, {:.1}s paused so far",
            self.clock.paused_total().as_secs_f32()
        );
        true
    }

    /// Abandon the run without a score and return to Idle
    pub fn stop(&mut self, notify: &mut NotificationQueue) -> bool {
        if self.state == PlaybackState::Idle {
            return false;
        }
        let was_active = self.is_active();

        self.state = PlaybackState::Idle;
        self.paused = false;
        self.clock.resume();
        self.anchor = None;
        self.targets.clear();
        self.countdown = None;
        self.result = None;
        self.sequence = PoseSequence::empty(self.config.handedness);

        if was_active {
            notify.push(Notification::HideText);
            notify.push(Notification::SessionState {
                state: SessionState::Idle,
            });
            log::info!("Playback stopped before finishing");
        }
        true
    }

    fn show_step(&mut self, index: usize, notify: &mut NotificationQueue) {
        let Some(anchor) = self.anchor else {
            log::error!("Cannot show step {}: no anchor frame", index);
            return;
        };
        let Some(step) = self.sequence.steps.get(index) else {
            log::error!("Cannot show step {}: out of range", index);
            return;
        };
        self.state = PlaybackState::ShowingStep { index };

        let previous = std::mem::take(&mut self.targets);
        self.targets = self
            .config
            .targets
            .iter()
            .map(|binding| {
                let mut target = EvaluationTarget::from_binding(binding);
                target.position = step
                    .position_of(binding.joint)
                    .map(|local| anchor.transform_point(&local));
                target.visual = previous
                    .iter()
                    .find(|p| p.joint == binding.joint)
                    .and_then(|p| p.visual);
                target
            })
            .collect();

        let valid = self.targets.iter().filter(|t| t.is_valid()).count();
        if valid == 0 {
            log::warn!("Step {} has no recorded position for any target", index);
        }

        for target in self.targets.iter_mut().filter(|t| t.is_valid()) {
            if target.set_visual(Classification::Far) {
                if let Some(handle) = target.handle {
                    notify.push(Notification::TargetVisual {
                        joint: target.joint,
                        handle,
                        classification: Classification::Far,
                    });
                }
            }
        }

        let view = StepView::build(
            index,
            self.sequence.len(),
            step,
            &anchor,
            &self.config.hologram,
            &self.targets,
        );
        notify.push(Notification::StepShown { view });

        log::info!(
            "Showing step {}/{} with {} valid targets",
            index + 1,
            self.sequence.len(),
            valid
        );
        self.state = PlaybackState::Evaluating { index };
    }

    /// Classify every valid target for this frame; true when the step is held
    fn evaluate(&mut self, source: &dyn JointSource, notify: &mut NotificationQueue) -> bool {
        if !source.is_running() {
            log::debug!("Hand tracking not running, frame skipped");
            return false;
        }

        let mut valid = 0;
        let mut satisfied = 0;
        for target in self.targets.iter_mut() {
            if !target.is_valid() {
                continue;
            }
            valid += 1;

            let live = read_world_pose(source, &self.origin, self.config.handedness, target.joint)
                .map(|pose| pose.position);
            let observation =
                target.observe(live.as_ref(), self.config.marginal_factor, &mut self.tally);
            if observation.miss_reset {
                log::debug!("{} lost its hold", target.joint);
            }

            if target.set_visual(observation.visual) {
                if let Some(handle) = target.handle {
                    notify.push(Notification::TargetVisual {
                        joint: target.joint,
                        handle,
                        classification: observation.visual,
                    });
                }
            }

            if target.is_satisfied(self.config.required_frames) {
                satisfied += 1;
            }
        }

        advance_ready(satisfied, valid, self.config.required_all_targets)
    }

    fn begin_advance(&mut self, next_index: usize, notify: &mut NotificationQueue) {
        for target in self.targets.iter_mut() {
            target.ok_frames = 0;
        }

        let mut countdown = Countdown::new(
            self.config.step_countdown_counts,
            self.config.step_countdown_interval,
        );
        // Show the first digit on the frame the step is completed
        if let Some(count) = countdown.tick(Duration::ZERO).shown {
            notify.push(Notification::Countdown { count });
        }
        self.countdown = Some(countdown);
        self.state = PlaybackState::Advancing { next_index };

        log::info!("Step {} held, advancing", next_index);
    }

    fn finish(&mut self, notify: &mut NotificationQueue) -> ScoreResult {
        let result = self.scoring.score(&self.tally, self.clock.elapsed_active());
        log::info!(
            "Sequence finished: score={:.1} grade={} time={:.2}s acc={:.1}% miss={}",
            result.score,
            result.grade.to_string(),
            result.elapsed_secs,
            result.accuracy * 100.0,
            result.miss_resets
        );

        self.state = PlaybackState::Finished;
        self.targets.clear();
        self.result = Some(result.clone());

        notify.push(Notification::flash("FINISH!", self.config.flash));
        notify.push(Notification::Finished {
            result: result.clone(),
        });
        notify.push(Notification::SessionState {
            state: SessionState::Idle,
        });
        result
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::capture::capture_snapshot;
    use crate::capture::snapshot::fixtures::full_hand;

    pub const EXERCISE: u32 = 9;

    pub fn anchor() -> AnchorFrame {
        RigidTransform::new(
            Vector3::new(0.0, 1.2, 0.3),
            UnitQuaternion::from_euler_angles(0.0, 0.5, 0.0),
        )
    }

    /// Live hand offsets used to record each step
    pub fn step_offsets() -> Vec<Vector3<f32>> {
        vec![Vector3::new(0.0, 0.9, 0.2), Vector3::new(0.1, 1.0, 0.25)]
    }

    /// Record one step per offset and save them under `EXERCISE`
    pub fn recorded_store(dir: &std::path::Path) -> SequenceStore {
        let store = SequenceStore::new(dir);
        let mut sequence = PoseSequence::empty(Handedness::Right);
        for offset in step_offsets() {
            let source = full_hand(offset);
            sequence.steps.push(
                capture_snapshot(&source, &RigidTransform::identity(), Handedness::Right, &anchor())
                    .unwrap(),
            );
        }
        store.save(EXERCISE, &sequence).unwrap();
        store
    }

    pub fn config() -> PlaybackConfig {
        let mut hologram = BTreeMap::new();
        hologram.insert(JointId::Wrist, RenderHandle(100));
        hologram.insert(JointId::Palm, RenderHandle(101));
        hologram.insert(JointId::IndexTip, RenderHandle(102));

        PlaybackConfig {
            exercise_id: EXERCISE,
            targets: vec![
                TargetBinding::new(JointId::IndexTip, RenderHandle(1)),
                TargetBinding::new(JointId::ThumbTip, RenderHandle(2)),
            ],
            hologram,
            ..PlaybackConfig::default()
        }
    }
}
