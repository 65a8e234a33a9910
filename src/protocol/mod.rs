// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Channel implementations.
//!
//! Two redundant channels keep the local state in sync with the panel
//! service:
//!
//! - [`RestClient`]: stateless, authenticated HTTP wrapper over the
//!   devices API. Used for discovery, periodic snapshot polls and
//!   command fallback.
//! - [`StreamConnection`]: one persistent MQTT-over-WebSocket session
//!   per device, delivering push updates and carrying the command fast
//!   path. Each connection runs its own reconnect state machine.

mod reconnect;
mod rest;
mod stream;

pub use reconnect::{ConnectionState, ReconnectPolicy};
pub use rest::{DeviceRecord, RestClient};
pub use stream::{StreamConnection, StreamStatus, StreamUpdate};
