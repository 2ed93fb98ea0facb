//! UDP transport adapter driving the engine's frame loop

use crate::engine::SyncEngine;
use crate::input::{get_timestamp, ControlState};
use bincode::{deserialize, serialize};
use log::{error, info};
use shared::{CameraBasis, Packet, SyncConfig};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

/// Owns the socket and the async loop; the engine itself stays synchronous.
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    engine: SyncEngine,
    basis: CameraBasis,
    fake_ping_ms: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        config: SyncConfig,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            engine: SyncEngine::new(config),
            basis: CameraBasis::axis_aligned(),
            fake_ping_ms,
        })
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SyncEngine {
        &mut self.engine
    }

    /// Host-supplied control flags.
    pub fn set_controls(&mut self, controls: ControlState) {
        self.engine.set_controls(controls);
    }

    /// Host-supplied camera basis for camera-relative movement.
    pub fn set_camera_basis(&mut self, basis: CameraBasis) {
        self.basis = basis;
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect { client_version: 1 };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Runs the receive/frame loop until the server disconnects us.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut frame_interval = interval(Duration::from_millis(16));
        let mut last_frame = Instant::now();
        let mut buffer = [0u8; 2048];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                let was_connected = self.engine.is_connected();
                                self.engine.handle_packet(packet);

                                if was_connected && !self.engine.is_connected() {
                                    info!("Server closed the session");
                                    return Ok(());
                                }
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = frame_interval.tick() => {
                    let frame_ms = last_frame.elapsed().as_secs_f32() * 1000.0;
                    last_frame = Instant::now();

                    let outbound = self.engine.frame(get_timestamp(), frame_ms, &self.basis);
                    for packet in outbound {
                        if let Err(e) = self.send_packet(&packet).await {
                            error!("Error sending packet: {}", e);
                        }
                    }
                },
            }
        }
    }

    /// Best-effort goodbye, then local cleanup.
    pub async fn shutdown(&mut self) {
        if self.engine.is_connected() {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }
        self.engine.handle_disconnect();
    }
}
