use serde::{Deserialize, Serialize};

pub mod math;

pub use math::{Quat, Vec3};

pub const TICK_RATE_HZ: u32 = 60;
pub const TICK_INTERVAL_MS: f32 = 1000.0 / TICK_RATE_HZ as f32;
pub const PLAYER_SPEED: f32 = 5.0;
pub const RUN_MULTIPLIER: f32 = 1.8;
pub const INTERPOLATION_BUFFER_SIZE: usize = 8;
pub const INTERPOLATION_SPEED: f32 = 5.0;
pub const RECONCILIATION_TOLERANCE: f32 = 0.25;
pub const NETWORK_SEND_RATE_MS: u64 = 50;
pub const STATE_HISTORY_CAPACITY: usize = 60;
pub const PENDING_INPUT_CAPACITY: usize = 128;
pub const MAX_FRAME_ACCUMULATION_MS: f32 = 250.0;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Move {
        input_id: u32,
        delta: Vec3,
        yaw: f32,
        timestamp: u64,
    },
    Disconnect,

    Connected {
        client_id: u32,
    },
    StateBroadcast {
        timestamp: u64,
        entities: Vec<EntityState>,
        last_processed_input: Option<u32>,
    },
    Correction {
        entity_id: u32,
        position: Vec3,
        rotation: Quat,
    },
    EntityLeft {
        entity_id: u32,
    },
    Disconnected {
        reason: String,
    },
}

/// One entity's authoritative state inside a broadcast.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EntityState {
    pub id: u32,
    pub position: Vec3,
    pub rotation: Quat,
    pub move_state: Option<MoveState>,
}

/// Movement flags sampled from the host's controls.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveFlags {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl MoveFlags {
    pub fn any(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }
}

/// Flags plus modifiers, broadcast for remote animation hints.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveState {
    pub flags: MoveFlags,
    pub running: bool,
}

/// Decided once when an entity enters the world, never probed for afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRole {
    Local,
    Remote(u32),
}

/// Camera-relative movement basis supplied by the presentation layer.
#[derive(Debug, Clone, Copy)]
pub struct CameraBasis {
    pub forward: Vec3,
    pub right: Vec3,
}

impl CameraBasis {
    /// Basis looking down -Z, the spawn orientation.
    pub fn axis_aligned() -> Self {
        Self {
            forward: Vec3::new(0.0, 0.0, -1.0),
            right: Vec3::new(1.0, 0.0, 0.0),
        }
    }
}

/// Displacement for one tick of held movement flags.
///
/// Both the client predictor and the authoritative server run this exact
/// rule, which is what makes optimistic prediction converge. Basis vectors
/// are flattened to the ground plane so camera pitch never leaks into
/// movement speed.
pub fn movement_delta(flags: &MoveFlags, running: bool, basis: &CameraBasis, dt: f32) -> Vec3 {
    if !flags.any() {
        return Vec3::ZERO;
    }

    let forward = Vec3::new(basis.forward.x, 0.0, basis.forward.z).normalized();
    let right = Vec3::new(basis.right.x, 0.0, basis.right.z).normalized();

    let mut direction = Vec3::ZERO;
    if flags.forward {
        direction += forward;
    }
    if flags.backward {
        direction += -forward;
    }
    if flags.right {
        direction += right;
    }
    if flags.left {
        direction += -right;
    }

    // Opposing flags cancel out to a zero-length direction
    let direction = direction.normalized();
    if direction == Vec3::ZERO {
        return Vec3::ZERO;
    }

    let speed = if running {
        PLAYER_SPEED * RUN_MULTIPLIER
    } else {
        PLAYER_SPEED
    };

    direction * (speed * dt)
}

/// Runtime-tunable engine parameters. One value per recognized option.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub tick_rate_hz: u32,
    pub interpolation_buffer_size: usize,
    pub interpolation_speed: f32,
    pub reconciliation_tolerance: f32,
    pub network_send_rate_ms: u64,
    pub state_history_capacity: usize,
    pub pending_input_capacity: usize,
    pub max_frame_accumulation_ms: f32,
}

impl SyncConfig {
    pub fn tick_interval_ms(&self) -> f32 {
        1000.0 / self.tick_rate_hz as f32
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: TICK_RATE_HZ,
            interpolation_buffer_size: INTERPOLATION_BUFFER_SIZE,
            interpolation_speed: INTERPOLATION_SPEED,
            reconciliation_tolerance: RECONCILIATION_TOLERANCE,
            network_send_rate_ms: NETWORK_SEND_RATE_MS,
            state_history_capacity: STATE_HISTORY_CAPACITY,
            pending_input_capacity: PENDING_INPUT_CAPACITY,
            max_frame_accumulation_ms: MAX_FRAME_ACCUMULATION_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn basis() -> CameraBasis {
        CameraBasis::axis_aligned()
    }

    #[test]
    fn test_move_flags_any() {
        assert!(!MoveFlags::default().any());

        let flags = MoveFlags {
            left: true,
            ..Default::default()
        };
        assert!(flags.any());
    }

    #[test]
    fn test_movement_delta_forward() {
        let flags = MoveFlags {
            forward: true,
            ..Default::default()
        };
        let dt = 1.0 / 60.0;

        let delta = movement_delta(&flags, false, &basis(), dt);
        assert_approx_eq!(delta.x, 0.0, 0.0001);
        assert_approx_eq!(delta.z, -PLAYER_SPEED * dt, 0.0001);
    }

    #[test]
    fn test_movement_delta_running_multiplier() {
        let flags = MoveFlags {
            right: true,
            ..Default::default()
        };
        let dt = 1.0 / 60.0;

        let walk = movement_delta(&flags, false, &basis(), dt);
        let run = movement_delta(&flags, true, &basis(), dt);
        assert_approx_eq!(run.length(), walk.length() * RUN_MULTIPLIER, 0.0001);
    }

    #[test]
    fn test_movement_delta_diagonal_not_faster() {
        let flags = MoveFlags {
            forward: true,
            right: true,
            ..Default::default()
        };
        let dt = 1.0 / 60.0;

        let delta = movement_delta(&flags, false, &basis(), dt);
        assert_approx_eq!(delta.length(), PLAYER_SPEED * dt, 0.0001);
    }

    #[test]
    fn test_movement_delta_opposing_flags_cancel() {
        let flags = MoveFlags {
            forward: true,
            backward: true,
            ..Default::default()
        };

        let delta = movement_delta(&flags, false, &basis(), 1.0 / 60.0);
        assert_eq!(delta, Vec3::ZERO);
    }

    #[test]
    fn test_movement_delta_ignores_camera_pitch() {
        // Camera tilted down: vertical component must not slow movement
        let tilted = CameraBasis {
            forward: Vec3::new(0.0, -0.7, -0.7),
            right: Vec3::new(1.0, 0.0, 0.0),
        };
        let flags = MoveFlags {
            forward: true,
            ..Default::default()
        };
        let dt = 1.0 / 60.0;

        let delta = movement_delta(&flags, false, &tilted, dt);
        assert_approx_eq!(delta.y, 0.0, 0.0001);
        assert_approx_eq!(delta.length(), PLAYER_SPEED * dt, 0.0001);
    }

    #[test]
    fn test_packet_serialization_move() {
        let packet = Packet::Move {
            input_id: 42,
            delta: Vec3::new(0.5, 0.0, -0.25),
            yaw: 1.5,
            timestamp: 123456789,
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Move {
                input_id,
                delta,
                yaw,
                timestamp,
            } => {
                assert_eq!(input_id, 42);
                assert_approx_eq!(delta.x, 0.5, 0.0001);
                assert_approx_eq!(delta.z, -0.25, 0.0001);
                assert_approx_eq!(yaw, 1.5, 0.0001);
                assert_eq!(timestamp, 123456789);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_state_broadcast() {
        let entities = vec![
            EntityState {
                id: 1,
                position: Vec3::new(1.0, 2.0, 3.0),
                rotation: Quat::from_yaw(0.5),
                move_state: Some(MoveState {
                    flags: MoveFlags {
                        forward: true,
                        ..Default::default()
                    },
                    running: true,
                }),
            },
            EntityState {
                id: 7,
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                move_state: None,
            },
        ];

        let packet = Packet::StateBroadcast {
            timestamp: 987654321,
            entities,
            last_processed_input: Some(17),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::StateBroadcast {
                timestamp,
                entities,
                last_processed_input,
            } => {
                assert_eq!(timestamp, 987654321);
                assert_eq!(entities.len(), 2);
                assert_eq!(entities[0].id, 1);
                assert!(entities[0].move_state.unwrap().running);
                assert_eq!(entities[1].id, 7);
                assert!(entities[1].move_state.is_none());
                assert_eq!(last_processed_input, Some(17));
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_correction() {
        let packet = Packet::Correction {
            entity_id: 3,
            position: Vec3::new(10.0, 0.0, 0.0),
            rotation: Quat::from_yaw(2.0),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Correction {
                entity_id,
                position,
                ..
            } => {
                assert_eq!(entity_id, 3);
                assert_approx_eq!(position.x, 10.0, 0.0001);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_entity_role_tagging() {
        let local = EntityRole::Local;
        let remote = EntityRole::Remote(9);

        assert_eq!(local, EntityRole::Local);
        assert_ne!(local, remote);
        match remote {
            EntityRole::Remote(id) => assert_eq!(id, 9),
            EntityRole::Local => panic!("Expected remote role"),
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.tick_rate_hz, 60);
        assert_eq!(config.interpolation_buffer_size, 8);
        assert_approx_eq!(config.interpolation_speed, 5.0, 0.0001);
        assert_approx_eq!(config.tick_interval_ms(), 1000.0 / 60.0, 0.0001);
    }
}
