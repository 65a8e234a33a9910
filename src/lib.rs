// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `alarmsync` - A Rust library to synchronize security alarm panels.
//!
//! This library keeps a local representation of a fleet of alarm panel
//! communicators in sync with the panel service over two redundant
//! channels: a persistent MQTT-over-secure-WebSocket stream per device
//! for push updates and commands, and a polling REST API as fallback.
//!
//! # Supported Features
//!
//! - **Live state**: area arm states, zone activity, PGM outputs, mains
//!   and battery status, merged last-writer-wins from both channels
//! - **Commands**: arm/disarm/stay/sleep per area and PGM control, with
//!   automatic stream-first routing and REST fallback
//! - **Resilience**: per-device reconnect state machine with
//!   exponential backoff, periodic health checks and snapshot polls
//! - **Change notifications**: per-area/zone/PGM events plus
//!   whole-device updates over a broadcast bus
//!
//! # Quick Start
//!
//! ```no_run
//! use alarmsync::{FleetConfig, FleetSupervisor, PanelCommand, StaticToken};
//!
//! #[tokio::main]
//! async fn main() -> alarmsync::Result<()> {
//!     let config = FleetConfig::new("https://apiv4.olarm.co/api/v4");
//!     let mut fleet = FleetSupervisor::new(config, StaticToken::new("api-key"))?;
//!
//!     // Subscribe before starting so no initial merge is missed.
//!     let mut events = fleet.subscribe();
//!     fleet.start().await?;
//!
//!     // Arm area 1 of the first discovered device.
//!     let devices = fleet.devices();
//!     if let Some(device) = devices.first() {
//!         let outcome = fleet.execute(device.id(), PanelCommand::ArmAway, 1).await;
//!         println!("arm outcome: {outcome:?}");
//!     }
//!
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!
//!     fleet.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Stream-only Deployments
//!
//! Deployments that must never fall back to the REST API for commands
//! opt in with [`FleetConfig::stream_only`]; a failed stream publish
//! then yields [`CommandOutcome::Unavailable`] instead of a silent
//! retry on the other channel:
//!
//! ```no_run
//! use alarmsync::FleetConfig;
//!
//! let config = FleetConfig::new("https://apiv4.olarm.co/api/v4").stream_only();
//! ```

mod auth;
mod config;
mod device;
mod dispatch;
pub mod error;
pub mod event;
mod fleet;
pub mod payload;
pub mod protocol;
pub mod state;
pub mod types;

pub use auth::{StaticToken, TokenProvider};
pub use config::{ApiConfig, FleetConfig, StreamConfig, StreamTransport};
pub use device::{Device, DeviceId, DeviceProfile};
pub use dispatch::{ActionStream, CommandDispatcher, CommandOutcome};
pub use error::{ApiError, AuthError, DecodeError, Error, Result, TransportError};
pub use event::{EventBus, StateEvent};
pub use fleet::FleetSupervisor;
pub use protocol::{ConnectionState, DeviceRecord, RestClient, StreamConnection, StreamStatus};
pub use state::{AreaState, DeviceState, PgmState, StateStore, UpdateSource, ZoneState};
pub use types::{ArmState, PanelCommand, PowerStatus, ZoneActivity};
