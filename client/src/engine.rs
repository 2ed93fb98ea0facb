//! Engine facade wiring sampling, prediction, reconciliation and
//! interpolation to a message-based transport

use crate::input::{get_timestamp, ControlState, InputSampler};
use crate::interpolation::{RemoteSnapshot, RemoteStateInterpolator};
use crate::prediction::{LocalPredictor, Transform};
use crate::reconciliation::ReconciliationEngine;
use crate::scheduler::FixedTickScheduler;
use log::{info, warn};
use shared::{CameraBasis, EntityRole, Packet, SyncConfig, Vec3};

/// One synchronization engine per connection.
///
/// The engine is synchronous and owns no socket: inbound packets are pushed
/// into [`handle_packet`](SyncEngine::handle_packet), and each call to
/// [`frame`](SyncEngine::frame) returns whatever should go out on the wire.
/// That keeps every buffer explicit and lets tests run as many independent
/// instances as they like.
pub struct SyncEngine {
    config: SyncConfig,
    sampler: InputSampler,
    scheduler: FixedTickScheduler,
    predictor: LocalPredictor,
    reconciliation: ReconciliationEngine,
    remotes: RemoteStateInterpolator,

    local_id: Option<u32>,
    connected: bool,
    ping_ms: u64,

    // Send-rate limiter: per-tick deltas coalesce into one Move per window
    last_send_ms: u64,
    unsent_delta: Vec3,
    unsent_move: Option<(u32, f32, u64)>,

    prediction_enabled: bool,
    reconciliation_enabled: bool,
    interpolation_enabled: bool,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        let scheduler =
            FixedTickScheduler::new(config.tick_interval_ms(), config.max_frame_accumulation_ms);
        let predictor =
            LocalPredictor::new(config.pending_input_capacity, config.state_history_capacity);
        let reconciliation = ReconciliationEngine::new(config.reconciliation_tolerance);
        let remotes = RemoteStateInterpolator::new(
            config.interpolation_buffer_size,
            config.interpolation_speed,
        );

        Self {
            config,
            sampler: InputSampler::new(),
            scheduler,
            predictor,
            reconciliation,
            remotes,
            local_id: None,
            connected: false,
            ping_ms: 0,
            last_send_ms: 0,
            unsent_delta: Vec3::ZERO,
            unsent_move: None,
            prediction_enabled: true,
            reconciliation_enabled: true,
            interpolation_enabled: true,
        }
    }

    /// Host-pushed control state, read at the next tick boundary.
    pub fn set_controls(&mut self, controls: ControlState) {
        self.sampler.set_controls(controls);
    }

    /// Routes one inbound message to the component that owns it.
    pub fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.local_id = Some(client_id);
                self.connected = true;
            }

            Packet::StateBroadcast {
                timestamp,
                entities,
                last_processed_input,
            } => {
                if timestamp > 0 {
                    self.ping_ms = get_timestamp().saturating_sub(timestamp);
                }

                for entity in &entities {
                    let role = match self.local_id {
                        Some(id) if id == entity.id => EntityRole::Local,
                        _ => EntityRole::Remote(entity.id),
                    };

                    match role {
                        EntityRole::Local => {
                            if self.reconciliation_enabled {
                                self.reconciliation.on_broadcast(
                                    &mut self.predictor,
                                    entity,
                                    last_processed_input,
                                );
                            }
                        }
                        EntityRole::Remote(id) => {
                            self.remotes.on_snapshot(
                                id,
                                RemoteSnapshot {
                                    position: entity.position,
                                    rotation: entity.rotation,
                                    timestamp,
                                },
                            );
                        }
                    }
                }
            }

            Packet::Correction {
                entity_id,
                position,
                rotation,
            } => {
                // The snap is the engine's drift bound; it ignores the
                // reconciliation toggle
                if self.local_id == Some(entity_id) {
                    warn!("Hard correction for local entity {}", entity_id);
                    self.reconciliation
                        .on_correction(&mut self.predictor, position, rotation);
                } else {
                    warn!("Correction for non-local entity {}, ignored", entity_id);
                }
            }

            Packet::EntityLeft { entity_id } => {
                self.remotes.remove(entity_id);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.handle_disconnect();
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Transport lifecycle event: stale prediction and remote buffers are
    /// worthless after a disconnect, so play resumes from the next
    /// authoritative snapshot.
    pub fn handle_disconnect(&mut self) {
        self.connected = false;
        self.local_id = None;
        self.predictor.reset_pending();
        self.remotes.clear();
        self.unsent_delta = Vec3::ZERO;
        self.unsent_move = None;
    }

    /// Advances the engine by one render frame.
    ///
    /// Runs zero or more fixed simulation ticks, updates remote entity
    /// smoothing, and returns the outbound packets for this frame.
    pub fn frame(&mut self, now_ms: u64, frame_ms: f32, basis: &CameraBasis) -> Vec<Packet> {
        let sampler = &self.sampler;
        let predictor = &mut self.predictor;
        let prediction_enabled = self.prediction_enabled;

        let mut tick_moves = Vec::new();
        self.scheduler.advance(frame_ms, |dt| {
            let sample = sampler.sample();
            if !prediction_enabled {
                return;
            }
            if let Some(packet) = predictor.step(&sample, basis, dt) {
                tick_moves.push(packet);
            }
        });

        for packet in tick_moves {
            if let Packet::Move {
                input_id,
                delta,
                yaw,
                timestamp,
            } = packet
            {
                self.unsent_delta += delta;
                self.unsent_move = Some((input_id, yaw, timestamp));
            }
        }

        let mut outbound = Vec::new();
        if self.connected {
            if let Some((input_id, yaw, timestamp)) = self.unsent_move {
                if now_ms.saturating_sub(self.last_send_ms) >= self.config.network_send_rate_ms {
                    outbound.push(Packet::Move {
                        input_id,
                        delta: self.unsent_delta,
                        yaw,
                        timestamp,
                    });
                    self.unsent_delta = Vec3::ZERO;
                    self.unsent_move = None;
                    self.last_send_ms = now_ms;
                }
            }
        }

        if self.interpolation_enabled {
            self.remotes.tick(now_ms, frame_ms / 1000.0);
        } else {
            self.remotes.snap_to_latest();
        }

        outbound
    }

    pub fn local_transform(&self) -> &Transform {
        self.predictor.transform()
    }

    pub fn predictor(&self) -> &LocalPredictor {
        &self.predictor
    }

    pub fn remotes(&self) -> &RemoteStateInterpolator {
        &self.remotes
    }

    pub fn local_id(&self) -> Option<u32> {
        self.local_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn ping_ms(&self) -> u64 {
        self.ping_ms
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn set_interpolation_speed(&mut self, speed: f32) {
        self.config.interpolation_speed = speed.max(0.0);
        self.remotes.set_speed(speed);
        info!("Interpolation speed: {}", self.remotes.speed());
    }

    pub fn toggle_prediction(&mut self) -> bool {
        self.prediction_enabled = !self.prediction_enabled;
        info!("Client-side prediction: {}", self.prediction_enabled);
        self.prediction_enabled
    }

    pub fn toggle_reconciliation(&mut self) -> bool {
        self.reconciliation_enabled = !self.reconciliation_enabled;
        info!("Server reconciliation: {}", self.reconciliation_enabled);
        self.reconciliation_enabled
    }

    pub fn toggle_interpolation(&mut self) -> bool {
        self.interpolation_enabled = !self.interpolation_enabled;
        info!("Interpolation: {}", self.interpolation_enabled);
        self.interpolation_enabled
    }
}
