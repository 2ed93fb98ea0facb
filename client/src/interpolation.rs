//! Velocity-smoothed interpolation of remote entities between sparse updates

use crate::prediction::Transform;
use log::{debug, warn};
use shared::{Quat, Vec3};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// One authoritative update for a remote entity, in server time.
#[derive(Debug, Clone, Copy)]
pub struct RemoteSnapshot {
    pub position: Vec3,
    pub rotation: Quat,
    pub timestamp: u64,
}

/// Where a tracked entity sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationPhase {
    /// Fewer than two snapshots: frozen at the last known transform.
    Buffering,
    /// Two or more snapshots: moving along interpolated segments.
    Interpolating,
}

struct RemoteEntity {
    buffer: Vec<RemoteSnapshot>,
    velocity: Vec3,
    rendered: Transform,
}

impl RemoteEntity {
    fn new(first: RemoteSnapshot) -> Self {
        Self {
            buffer: vec![first],
            rendered: Transform::new(first.position, first.rotation),
            velocity: Vec3::ZERO,
        }
    }

    fn phase(&self) -> InterpolationPhase {
        if self.buffer.len() >= 2 {
            InterpolationPhase::Interpolating
        } else {
            InterpolationPhase::Buffering
        }
    }
}

/// Interpolation along the segment between two snapshots.
///
/// Pure form of the per-tick position math, before velocity extrapolation and
/// render smoothing are layered on top.
pub fn segment_position(prev: &RemoteSnapshot, next: &RemoteSnapshot, now_ms: u64) -> (f32, Vec3) {
    let span = next.timestamp.saturating_sub(prev.timestamp);
    if span == 0 {
        return (0.0, prev.position);
    }

    let elapsed = now_ms.saturating_sub(prev.timestamp);
    let alpha = (elapsed as f32 / span as f32).clamp(0.0, 1.0);
    (alpha, prev.position.lerp(&next.position, alpha))
}

/// Produces a smooth view of every remote entity from whatever snapshots have
/// arrived, independent of packet timing.
///
/// Three layers hide network jitter: linear interpolation between the two
/// most recent snapshots, a smoothed-velocity dead-reckoning term that keeps
/// entities drifting forward after the segment is exhausted, and a final
/// exponential chase of the rendered transform toward the predicted one so
/// irregular arrivals never show up as steps.
pub struct RemoteStateInterpolator {
    entities: HashMap<u32, RemoteEntity>,
    buffer_size: usize,
    speed: f32,
}

impl RemoteStateInterpolator {
    pub fn new(buffer_size: usize, speed: f32) -> Self {
        Self {
            entities: HashMap::new(),
            buffer_size: buffer_size.max(2),
            speed,
        }
    }

    /// How aggressively rendered state chases the predicted target, in
    /// buffer-widths per second. Higher trades smoothness for lag.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Buffers one snapshot. Returns false if the update was rejected.
    pub fn on_snapshot(&mut self, entity_id: u32, snapshot: RemoteSnapshot) -> bool {
        let entity = match self.entities.entry(entity_id) {
            Entry::Vacant(slot) => {
                debug!("Tracking new remote entity {}", entity_id);
                slot.insert(RemoteEntity::new(snapshot));
                return true;
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        // Arrival order is treated as time order; anything non-monotonic is
        // a reorder or duplicate and would corrupt the current segment
        if let Some(last) = entity.buffer.last() {
            if snapshot.timestamp <= last.timestamp {
                warn!(
                    "Rejected out-of-order snapshot for entity {} ({} <= {})",
                    entity_id, snapshot.timestamp, last.timestamp
                );
                return false;
            }
        }

        entity.buffer.push(snapshot);
        if entity.buffer.len() > self.buffer_size {
            entity.buffer.remove(0);
        }
        true
    }

    /// Advances every tracked entity's rendered transform to `now_ms`.
    pub fn tick(&mut self, now_ms: u64, dt: f32) {
        let blend = (dt * self.speed).clamp(0.0, 1.0);

        for entity in self.entities.values_mut() {
            let len = entity.buffer.len();
            if len < 2 {
                // Not enough data to move: freeze rather than guess
                continue;
            }

            let prev = entity.buffer[len - 2];
            let next = entity.buffer[len - 1];
            let span_ms = next.timestamp.saturating_sub(prev.timestamp);
            if span_ms == 0 {
                continue;
            }

            let (alpha, base) = segment_position(&prev, &next, now_ms);

            // Smoothed velocity absorbs sudden implied-speed changes between
            // consecutive segments
            let raw_velocity = (next.position - prev.position) * (1000.0 / span_ms as f32);
            entity.velocity = entity.velocity.lerp(&raw_velocity, blend);

            // Dead reckoning keeps the entity drifting past the end of the
            // segment until a newer snapshot lands
            let predicted = base + entity.velocity * dt;
            entity.rendered.position = entity.rendered.position.lerp(&predicted, blend);

            let target_rotation = prev.rotation.slerp(&next.rotation, alpha);
            entity.rendered.rotation = entity.rendered.rotation.slerp(&target_rotation, blend);

            // Deferred trim: only once the segment is spent and the buffer
            // is comfortably full, so late-but-relevant snapshots survive
            if alpha >= 0.99 && entity.buffer.len() > self.buffer_size / 2 {
                entity.buffer.remove(0);
            }
        }
    }

    /// The smoothed transform to draw for `entity_id`.
    pub fn rendered(&self, entity_id: u32) -> Option<&Transform> {
        self.entities.get(&entity_id).map(|e| &e.rendered)
    }

    pub fn velocity(&self, entity_id: u32) -> Option<Vec3> {
        self.entities.get(&entity_id).map(|e| e.velocity)
    }

    pub fn phase(&self, entity_id: u32) -> Option<InterpolationPhase> {
        self.entities.get(&entity_id).map(|e| e.phase())
    }

    pub fn buffered_len(&self, entity_id: u32) -> usize {
        self.entities
            .get(&entity_id)
            .map_or(0, |e| e.buffer.len())
    }

    /// Snaps every rendered transform to its newest buffered snapshot,
    /// bypassing smoothing. Used when interpolation is toggled off.
    pub fn snap_to_latest(&mut self) {
        for entity in self.entities.values_mut() {
            if let Some(last) = entity.buffer.last() {
                entity.rendered = Transform::new(last.position, last.rotation);
                entity.velocity = Vec3::ZERO;
            }
        }
    }

    /// Stops tracking a departed entity.
    pub fn remove(&mut self, entity_id: u32) {
        if self.entities.remove(&entity_id).is_some() {
            debug!("Removed remote entity {}", entity_id);
        }
    }

    /// Drops every tracked entity, e.g. on transport disconnect.
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    pub fn tracked_count(&self) -> usize {
        self.entities.len()
    }
}
