//! Optimistic local movement applied ahead of server confirmation

use crate::input::InputSample;
use log::debug;
use shared::{movement_delta, CameraBasis, MoveFlags, Packet, Quat, Vec3};
use std::collections::VecDeque;

/// One applied input, kept until the server acknowledges it.
#[derive(Debug, Clone)]
pub struct InputRecord {
    pub id: u32,
    pub dt: f32,
    pub flags: MoveFlags,
    pub running: bool,
    pub timestamp: u64,
}

/// The local entity's live transform. Single mutable value: the predictor
/// writes it every tick, reconciliation replaces it on a hard correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Inputs applied locally but not yet confirmed by the server.
///
/// Ids are strictly increasing. Acknowledged prefixes are dropped in bulk;
/// under size pressure the oldest entries are evicted first.
pub struct PendingInputBuffer {
    entries: VecDeque<InputRecord>,
    capacity: usize,
}

impl PendingInputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: InputRecord) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    /// Drops every entry with `id <= last_processed`. Idempotent: a stale
    /// acknowledgment that references already-pruned ids is a no-op.
    pub fn acknowledge(&mut self, last_processed: u32) {
        while self
            .entries
            .front()
            .is_some_and(|r| r.id <= last_processed)
        {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputRecord> {
        self.entries.iter()
    }
}

/// Post-tick state kept for diagnostics and divergence inspection.
#[derive(Debug, Clone, Copy)]
pub struct LocalStateSnapshot {
    pub input_id: u32,
    pub position: Vec3,
    pub rotation: Quat,
    pub timestamp: u64,
}

/// Fixed-capacity ring of [`LocalStateSnapshot`]s (~1 second at 60Hz).
///
/// Pre-allocated once; pushes overwrite the oldest slot through a head
/// pointer so tick-rate appends never touch the allocator.
pub struct StateHistory {
    slots: Vec<Option<LocalStateSnapshot>>,
    head: usize,
    len: usize,
}

impl StateHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, snapshot: LocalStateSnapshot) {
        self.slots[self.head] = Some(snapshot);
        self.head = (self.head + 1) % self.slots.len();
        if self.len < self.slots.len() {
            self.len += 1;
        }
    }

    pub fn latest(&self) -> Option<&LocalStateSnapshot> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.slots.len() - 1) % self.slots.len();
        self.slots[idx].as_ref()
    }

    /// Snapshots from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &LocalStateSnapshot> {
        let cap = self.slots.len();
        let start = (self.head + cap - self.len) % cap;
        (0..self.len).filter_map(move |i| self.slots[(start + i) % cap].as_ref())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Applies each input to the live transform the moment it is sampled.
pub struct LocalPredictor {
    transform: Transform,
    next_input_id: u32,
    pending: PendingInputBuffer,
    history: StateHistory,
}

impl LocalPredictor {
    pub fn new(pending_capacity: usize, history_capacity: usize) -> Self {
        Self {
            transform: Transform::default(),
            next_input_id: 1,
            pending: PendingInputBuffer::new(pending_capacity),
            history: StateHistory::new(history_capacity),
        }
    }

    /// Applies one tick of input and returns the move payload to send, or
    /// `None` when nothing moved.
    ///
    /// A zero-delta tick allocates no input id, buffers nothing, and sends
    /// nothing: the server only needs to hear about inputs that changed
    /// state, and idle players cost no bandwidth.
    pub fn step(&mut self, sample: &InputSample, basis: &CameraBasis, dt: f32) -> Option<Packet> {
        let delta = movement_delta(&sample.flags, sample.running, basis, dt);
        if delta == Vec3::ZERO {
            return None;
        }

        let input_id = self.next_input_id;
        self.next_input_id += 1;

        let yaw = facing_yaw(basis);
        self.transform.position += delta;
        self.transform.rotation = Quat::from_yaw(yaw);

        self.pending.push(InputRecord {
            id: input_id,
            dt,
            flags: sample.flags,
            running: sample.running,
            timestamp: sample.timestamp,
        });

        self.history.push(LocalStateSnapshot {
            input_id,
            position: self.transform.position,
            rotation: self.transform.rotation,
            timestamp: sample.timestamp,
        });

        Some(Packet::Move {
            input_id,
            delta,
            yaw,
            timestamp: sample.timestamp,
        })
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Wholesale transform replacement, used only by hard corrections.
    pub fn snap_to(&mut self, position: Vec3, rotation: Quat) {
        debug!(
            "Snapping local transform: {:.3} units of divergence",
            self.transform.position.distance(&position)
        );
        self.transform = Transform::new(position, rotation);
    }

    pub fn pending(&self) -> &PendingInputBuffer {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut PendingInputBuffer {
        &mut self.pending
    }

    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    /// Forgets all unacknowledged inputs. Prediction restarts from whatever
    /// the server says next.
    pub fn reset_pending(&mut self) {
        self.pending.clear();
    }
}

// Yaw that faces the camera's flattened forward vector.
fn facing_yaw(basis: &CameraBasis) -> f32 {
    basis.forward.x.atan2(-basis.forward.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::PLAYER_SPEED;

    const DT: f32 = 1.0 / 60.0;

    fn sample(flags: MoveFlags, running: bool) -> InputSample {
        InputSample {
            flags,
            running,
            timestamp: 1000,
        }
    }

    fn forward_flags() -> MoveFlags {
        MoveFlags {
            forward: true,
            ..Default::default()
        }
    }

    fn predictor() -> LocalPredictor {
        LocalPredictor::new(128, 60)
    }

    #[test]
    fn test_step_moves_transform_immediately() {
        let mut p = predictor();
        let basis = CameraBasis::axis_aligned();

        let packet = p.step(&sample(forward_flags(), false), &basis, DT);
        assert!(packet.is_some());
        assert_approx_eq!(p.transform().position.z, -PLAYER_SPEED * DT, 0.0001);
        assert_eq!(p.pending().len(), 1);
        assert_eq!(p.history().len(), 1);
    }

    #[test]
    fn test_idle_tick_is_silent() {
        let mut p = predictor();
        let basis = CameraBasis::axis_aligned();

        let packet = p.step(&sample(MoveFlags::default(), false), &basis, DT);
        assert!(packet.is_none());
        assert_eq!(p.pending().len(), 0);
        assert_eq!(p.history().len(), 0);

        // No id was burned: the next real move starts at 1
        let packet = p.step(&sample(forward_flags(), false), &basis, DT);
        match packet {
            Some(Packet::Move { input_id, .. }) => assert_eq!(input_id, 1),
            _ => panic!("Expected a move packet"),
        }
    }

    #[test]
    fn test_input_ids_strictly_increase() {
        let mut p = predictor();
        let basis = CameraBasis::axis_aligned();

        let mut last_id = 0;
        for _ in 0..5 {
            match p.step(&sample(forward_flags(), false), &basis, DT) {
                Some(Packet::Move { input_id, .. }) => {
                    assert!(input_id > last_id);
                    last_id = input_id;
                }
                _ => panic!("Expected a move packet"),
            }
        }

        let ids: Vec<u32> = p.pending().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_acknowledge_drops_prefix() {
        let mut p = predictor();
        let basis = CameraBasis::axis_aligned();

        for _ in 0..3 {
            p.step(&sample(forward_flags(), false), &basis, DT);
        }
        assert_eq!(p.pending().len(), 3);

        p.pending_mut().acknowledge(2);
        let ids: Vec<u32> = p.pending().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_acknowledge_idempotent() {
        let mut buffer = PendingInputBuffer::new(16);
        for id in 1..=4 {
            buffer.push(InputRecord {
                id,
                dt: DT,
                flags: forward_flags(),
                running: false,
                timestamp: 0,
            });
        }

        buffer.acknowledge(3);
        assert_eq!(buffer.len(), 1);

        buffer.acknowledge(3);
        assert_eq!(buffer.len(), 1);

        buffer.acknowledge(1);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_pending_evicts_oldest_under_pressure() {
        let mut buffer = PendingInputBuffer::new(4);
        for id in 1..=6 {
            buffer.push(InputRecord {
                id,
                dt: DT,
                flags: forward_flags(),
                running: false,
                timestamp: 0,
            });
        }

        assert_eq!(buffer.len(), 4);
        let ids: Vec<u32> = buffer.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_history_ring_wraps_without_growing() {
        let mut history = StateHistory::new(60);

        for i in 0..75 {
            history.push(LocalStateSnapshot {
                input_id: i,
                position: Vec3::new(i as f32, 0.0, 0.0),
                rotation: Quat::IDENTITY,
                timestamp: i as u64,
            });
        }

        assert_eq!(history.len(), 60);
        assert_eq!(history.capacity(), 60);
        assert_eq!(history.latest().unwrap().input_id, 74);

        let oldest = history.iter().next().unwrap();
        assert_eq!(oldest.input_id, 15);

        // Ordered oldest to newest
        let ids: Vec<u32> = history.iter().map(|s| s.input_id).collect();
        assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[test]
    fn test_running_covers_more_ground() {
        let basis = CameraBasis::axis_aligned();

        let mut walker = predictor();
        walker.step(&sample(forward_flags(), false), &basis, DT);

        let mut runner = predictor();
        runner.step(&sample(forward_flags(), true), &basis, DT);

        assert!(
            runner.transform().position.length() > walker.transform().position.length()
        );
    }
}
