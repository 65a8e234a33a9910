// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change event types.

use crate::device::DeviceId;
use crate::state::UpdateSource;
use crate::types::{ArmState, PowerStatus, ZoneActivity};

/// Events published by the state store and the fleet supervisor.
///
/// Per-index events fire only when the merged value differs from the
/// previous snapshot; [`StateEvent::DeviceUpdated`] fires once per merge
/// regardless.
#[derive(Debug, Clone)]
pub enum StateEvent {
    /// An area's arm state changed.
    AreaChanged {
        /// The device owning the area.
        device_id: DeviceId,
        /// 1-based area index.
        index: usize,
        /// The new arm state.
        state: ArmState,
    },

    /// A zone's activity changed.
    ZoneChanged {
        /// The device owning the zone.
        device_id: DeviceId,
        /// 1-based zone index.
        index: usize,
        /// The new activity.
        activity: ZoneActivity,
    },

    /// A programmable output changed.
    PgmChanged {
        /// The device owning the output.
        device_id: DeviceId,
        /// 1-based output index.
        index: usize,
        /// Whether the output is now closed.
        closed: bool,
    },

    /// Mains or battery status changed.
    PowerChanged {
        /// The affected device.
        device_id: DeviceId,
        /// The new power status.
        power: PowerStatus,
    },

    /// A snapshot was merged for the device.
    DeviceUpdated {
        /// The affected device.
        device_id: DeviceId,
        /// Which channel produced the snapshot.
        source: UpdateSource,
    },

    /// A device's stream connection went up or down.
    ConnectionChanged {
        /// The affected device.
        device_id: DeviceId,
        /// Whether the stream is now connected.
        connected: bool,
    },
}

impl StateEvent {
    /// Returns the device this event concerns.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::AreaChanged { device_id, .. }
            | Self::ZoneChanged { device_id, .. }
            | Self::PgmChanged { device_id, .. }
            | Self::PowerChanged { device_id, .. }
            | Self::DeviceUpdated { device_id, .. }
            | Self::ConnectionChanged { device_id, .. } => device_id,
        }
    }

    /// Returns `true` for per-area events.
    #[must_use]
    pub fn is_area_change(&self) -> bool {
        matches!(self, Self::AreaChanged { .. })
    }

    /// Returns `true` for per-zone events.
    #[must_use]
    pub fn is_zone_change(&self) -> bool {
        matches!(self, Self::ZoneChanged { .. })
    }
}
