//! Correction of local prediction against authoritative server state

use crate::prediction::LocalPredictor;
use log::{debug, warn};
use shared::{EntityState, Quat, Vec3};

/// Consumes authoritative snapshots for the local entity.
///
/// Routine broadcasts prune acknowledged inputs and snap the transform only
/// when divergence exceeds the configured tolerance; explicit corrections
/// snap unconditionally. Both snap paths clear the pending buffer whole:
/// unacknowledged inputs are stale relative to the corrected baseline and are
/// not replayed against it.
pub struct ReconciliationEngine {
    tolerance: f32,
}

impl ReconciliationEngine {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Routine authoritative state for the local entity.
    pub fn on_broadcast(
        &self,
        predictor: &mut LocalPredictor,
        state: &EntityState,
        last_processed_input: Option<u32>,
    ) {
        if let Some(last_processed) = last_processed_input {
            predictor.pending_mut().acknowledge(last_processed);
        }

        let divergence = predictor.transform().position.distance(&state.position);
        if divergence > self.tolerance {
            warn!(
                "Prediction diverged {:.3} units from entity {} authority, snapping",
                divergence, state.id
            );
            self.snap(predictor, state.position, state.rotation);
        } else {
            debug!(
                "Entity {} within tolerance ({:.3} <= {:.3})",
                state.id, divergence, self.tolerance
            );
        }
    }

    /// Out-of-band hard correction. Always snaps.
    pub fn on_correction(&self, predictor: &mut LocalPredictor, position: Vec3, rotation: Quat) {
        self.snap(predictor, position, rotation);
    }

    fn snap(&self, predictor: &mut LocalPredictor, position: Vec3, rotation: Quat) {
        predictor.snap_to(position, rotation);
        predictor.reset_pending();
    }
}
