//! Pose evaluation collaborator
//!
//! The baker never skins meshes or evaluates animation curves itself. It
//! drives a [`PoseEvaluator`] through the timeline and reads back CPU-skinned
//! vertices and per-bone ref-to-local matrices. Every call is synchronous:
//! once [`PoseEvaluator::refresh_pose`] returns, the data read afterwards
//! reflects the new pose.

use std::ops::{Deref, DerefMut};

use glam::Mat4;

use crate::mesh::SkinnedVertex;

/// What the evaluator knows about an animation sequence
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    /// Playable length in seconds
    pub duration: f32,
    /// Name of the skeleton the sequence animates
    pub skeleton: String,
}

pub trait PoseEvaluator {
    /// Skinning mode, forced LOD and animation state to restore after a bake
    type State;

    fn save_state(&mut self) -> Self::State;

    fn restore_state(&mut self, state: Self::State);

    /// Switch to CPU skinning with the reference LOD forced
    fn begin_capture(&mut self);

    fn clip_info(&self, sequence: &str) -> Option<ClipInfo>;

    /// Play `sequence`, or hold the reference pose with `None`
    fn set_animation(&mut self, sequence: Option<&str>);

    fn set_frame_time(&mut self, seconds: f32);

    /// Evaluate the current pose and wait for the result
    fn refresh_pose(&mut self);

    fn skinned_vertices(&self, lod: usize) -> Vec<SkinnedVertex>;

    /// Ref-to-local matrix of every mesh skeleton bone, in mesh skeleton order
    fn ref_to_local(&self) -> Vec<Mat4>;
}

/// Capture scope over an evaluator
///
/// Saves the evaluator state, switches it to capture mode and holds the
/// reference pose. The saved state is restored when the session drops, on
/// success and on every early return.
pub struct CaptureSession<'a, E: PoseEvaluator> {
    evaluator: &'a mut E,
    saved: Option<E::State>,
}

impl<'a, E: PoseEvaluator> CaptureSession<'a, E> {
    pub fn begin(evaluator: &'a mut E) -> Self {
        let saved = evaluator.save_state();
        evaluator.begin_capture();
        evaluator.set_animation(None);
        evaluator.refresh_pose();
        Self {
            evaluator,
            saved: Some(saved),
        }
    }

    /// Return to the reference pose
    pub fn reset_to_ref_pose(&mut self) {
        self.evaluator.set_animation(None);
        self.evaluator.refresh_pose();
    }

    /// Pose the current animation at `seconds` as one evaluate-and-flush step
    pub fn pose_at(&mut self, seconds: f32) {
        self.evaluator.set_frame_time(seconds);
        self.evaluator.refresh_pose();
    }
}

impl<E: PoseEvaluator> Deref for CaptureSession<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.evaluator
    }
}

impl<E: PoseEvaluator> DerefMut for CaptureSession<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.evaluator
    }
}

impl<E: PoseEvaluator> Drop for CaptureSession<'_, E> {
    fn drop(&mut self) {
        if let Some(state) = self.saved.take() {
            self.evaluator.set_animation(None);
            self.evaluator.refresh_pose();
            self.evaluator.restore_state(state);
            tracing::debug!("Pose evaluator state restored");
        }
    }
}
