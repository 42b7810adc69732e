// Pose recorder
// Appends snapshots of the live hand to a sequence and persists the whole sequence after each change

use crate::error::{GuidanceError, GuidanceResult};
use crate::hand::{AnchorFrame, Handedness, JointSource, RigidTransform};
use crate::session::notify::{Notification, NotificationQueue};
use crate::state::{SavedSequence, SequenceStore};

use super::snapshot::{capture_snapshot, PoseSequence};

pub struct PoseRecorder {
    store: SequenceStore,
    exercise_id: u32,

    /// Tracking space -> world space
    origin: RigidTransform,

    sequence: PoseSequence,
}

impl PoseRecorder {
    /// Load the existing sequence for (exercise, hand) and get ready to append.
    ///
    /// A corrupt file is refused here rather than replaced by an empty
    /// sequence; the next capture would otherwise overwrite it.
    pub fn initialize(
        store: SequenceStore,
        exercise_id: u32,
        handedness: Handedness,
        origin: RigidTransform,
    ) -> GuidanceResult<Self> {
        let sequence = store.load(exercise_id, handedness)?;
        log::info!(
            "Recorder ready for exercise {} ({} hand), {} existing steps",
            exercise_id,
            handedness.to_string(),
            sequence.len()
        );

        Ok(PoseRecorder {
            store,
            exercise_id,
            origin,
            sequence,
        })
    }

    pub fn sequence(&self) -> &PoseSequence {
        &self.sequence
    }

    pub fn exercise_id(&self) -> u32 {
        self.exercise_id
    }

    pub fn handedness(&self) -> Handedness {
        self.sequence.handedness
    }

    pub fn store(&self) -> &SequenceStore {
        &self.store
    }

    /// Capture the live hand as the next step and persist the full sequence.
    ///
    /// On any failure the in-memory sequence is left as it was and an
    /// `OperationFailed` notification is pushed.
    pub fn capture_step(
        &mut self,
        anchor: Option<&AnchorFrame>,
        source: &dyn JointSource,
        notify: &mut NotificationQueue,
    ) -> GuidanceResult<SavedSequence> {
        match self.try_capture(anchor, source) {
            Ok(saved) => {
                log::info!(
                    "Captured step {} of exercise {} -> {:?}",
                    saved.steps - 1,
                    self.exercise_id,
                    saved.path
                );
                notify.push(Notification::StepCaptured {
                    index: saved.steps - 1,
                    steps: saved.steps,
                    path: saved.path.to_string_lossy().to_string(),
                });
                Ok(saved)
            }
            Err(e) => {
                log::warn!("Capture refused: {}", e);
                notify.push(Notification::failed("capture_step", &e));
                Err(e)
            }
        }
    }

    fn try_capture(
        &mut self,
        anchor: Option<&AnchorFrame>,
        source: &dyn JointSource,
    ) -> GuidanceResult<SavedSequence> {
        let anchor = anchor.ok_or(GuidanceError::AnchorNotLocked)?;
        let snapshot = capture_snapshot(source, &self.origin, self.handedness(), anchor)?;

        self.sequence.steps.push(snapshot);
        match self.store.save(self.exercise_id, &self.sequence) {
            Ok(saved) => Ok(saved),
            Err(e) => {
                self.sequence.steps.pop();
                Err(e.into())
            }
        }
    }

    /// Replace the stored sequence with an empty one. No undo.
    pub fn clear_sequence(
        &mut self,
        notify: &mut NotificationQueue,
    ) -> GuidanceResult<SavedSequence> {
        match self.store.clear(self.exercise_id, self.handedness()) {
            Ok(saved) => {
                log::info!(
                    "Cleared {} steps of exercise {}",
                    self.sequence.len(),
                    self.exercise_id
                );
                self.sequence = PoseSequence::empty(self.handedness());
                notify.push(Notification::SequenceCleared {
                    path: saved.path.to_string_lossy().to_string(),
                });
                Ok(saved)
            }
            Err(e) => {
                let e = GuidanceError::from(e);
                log::error!("Failed to clear sequence: {}", e);
                notify.push(Notification::failed("clear_sequence", &e));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::snapshot::fixtures::full_hand;
    use crate::hand::source::scripted::ScriptedSource;
    use crate::hand::JointId;
    use nalgebra::{UnitQuaternion, Vector3};
    use std::fs;
    use tempfile::TempDir;

    fn anchor() -> AnchorFrame {
        RigidTransform::new(
            Vector3::new(0.0, 1.1, 0.4),
            UnitQuaternion::from_euler_angles(0.0, 0.3, 0.0),
        )
    }

    fn recorder(dir: &TempDir) -> PoseRecorder {
        PoseRecorder::initialize(
            SequenceStore::new(dir.path()),
            6,
            Handedness::Right,
            RigidTransform::identity(),
        )
        .unwrap()
    }

    #[test]
    fn test_capture_appends_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let mut rec = recorder(&temp_dir);
        let mut notify = NotificationQueue::new();
        let source = full_hand(Vector3::new(0.0, 0.8, 0.2));
        let a = anchor();

        rec.capture_step(Some(&a), &source, &mut notify).unwrap();
        let saved = rec.capture_step(Some(&a), &source, &mut notify).unwrap();

        assert_eq!(saved.steps, 2);
        assert_eq!(rec.sequence().len(), 2);

        let on_disk = SequenceStore::new(temp_dir.path())
            .load(6, Handedness::Right)
            .unwrap();
        assert_eq!(&on_disk, rec.sequence());

        let events = notify.drain();
        assert!(matches!(
            events.last(),
            Some(Notification::StepCaptured { index: 1, steps: 2, .. })
        ));
    }

    #[test]
    fn test_capture_without_anchor_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let mut rec = recorder(&temp_dir);
        let mut notify = NotificationQueue::new();
        let source = full_hand(Vector3::zeros());

        let err = rec.capture_step(None, &source, &mut notify).unwrap_err();
        assert!(matches!(err, GuidanceError::AnchorNotLocked));
        assert!(rec.sequence().is_empty());
        assert!(!rec.store().exists(6, Handedness::Right));
        assert!(matches!(
            notify.drain().as_slice(),
            [Notification::OperationFailed { .. }]
        ));
    }

    #[test]
    fn test_capture_without_wrist_leaves_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let mut rec = recorder(&temp_dir);
        let mut notify = NotificationQueue::new();
        let a = anchor();

        let source = full_hand(Vector3::zeros());
        rec.capture_step(Some(&a), &source, &mut notify).unwrap();

        let mut lost = full_hand(Vector3::zeros());
        lost.remove(Handedness::Right, JointId::Wrist);
        let err = rec.capture_step(Some(&a), &lost, &mut notify).unwrap_err();

        assert!(matches!(err, GuidanceError::NoFrameAvailable));
        assert_eq!(rec.sequence().len(), 1);
    }

    #[test]
    fn test_capture_save_failure_leaves_sequence() {
        let temp_dir = TempDir::new().unwrap();
        // A plain file where the poses directory should be
        fs::write(temp_dir.path().join("poses"), "").unwrap();
        let mut rec = recorder(&temp_dir);
        let mut notify = NotificationQueue::new();

        let err = rec
            .capture_step(Some(&anchor()), &full_hand(Vector3::zeros()), &mut notify)
            .unwrap_err();

        assert!(matches!(err, GuidanceError::Storage(_)));
        assert!(rec.sequence().is_empty());
        assert!(matches!(
            notify.drain().as_slice(),
            [Notification::OperationFailed { .. }]
        ));
    }

    #[test]
    fn test_capture_with_tracking_down() {
        let temp_dir = TempDir::new().unwrap();
        let mut rec = recorder(&temp_dir);
        let mut notify = NotificationQueue::new();

        let err = rec
            .capture_step(Some(&anchor()), &ScriptedSource::default(), &mut notify)
            .unwrap_err();
        assert!(matches!(err, GuidanceError::TrackingUnavailable));
    }

    #[test]
    fn test_initialize_resumes_existing_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let mut notify = NotificationQueue::new();
        {
            let mut rec = recorder(&temp_dir);
            rec.capture_step(Some(&anchor()), &full_hand(Vector3::zeros()), &mut notify)
                .unwrap();
        }

        let rec = recorder(&temp_dir);
        assert_eq!(rec.sequence().len(), 1);
    }

    #[test]
    fn test_initialize_refuses_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = SequenceStore::new(temp_dir.path());
        let path = store.path_for(6, Handedness::Right);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "garbage").unwrap();

        let result = PoseRecorder::initialize(store, 6, Handedness::Right, RigidTransform::identity());
        assert!(matches!(
            result,
            Err(GuidanceError::DeserializationFailed { .. })
        ));
        // The corrupt file is left for inspection
        assert_eq!(fs::read_to_string(&path).unwrap(), "garbage");
    }

    #[test]
    fn test_clear_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let mut rec = recorder(&temp_dir);
        let mut notify = NotificationQueue::new();
        rec.capture_step(Some(&anchor()), &full_hand(Vector3::zeros()), &mut notify)
            .unwrap();

        rec.clear_sequence(&mut notify).unwrap();

        assert!(rec.sequence().is_empty());
        assert!(rec.store().load(6, Handedness::Right).unwrap().is_empty());
        assert!(matches!(
            notify.drain().last(),
            Some(Notification::SequenceCleared { .. })
        ));
    }
}
