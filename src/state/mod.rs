// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state tracking and merging.
//!
//! One [`DeviceState`] per device, owned exclusively by the
//! [`StateStore`]. A merge replaces the area/zone/PGM lists and the
//! power flags wholesale from a single source-tagged snapshot — there is
//! no field-level reconciliation between the stream and the poll
//! channel; the last writer wins.

mod store;

use chrono::{DateTime, Utc};

use crate::device::DeviceProfile;
use crate::payload::{RawPanelState, WireFlag};
use crate::types::{ArmState, PowerStatus, ZoneActivity};

pub use store::StateStore;

/// Which channel produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// Push update from the stream connection.
    Stream,
    /// Snapshot from a REST poll.
    Poll,
}

impl std::fmt::Display for UpdateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Stream => "stream",
            Self::Poll => "poll",
        })
    }
}

/// State of one alarm area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaState {
    /// 1-based area index, stable for the device's lifetime.
    pub index: usize,
    /// Area display name.
    pub name: String,
    /// Current arm state.
    pub arm_state: ArmState,
    /// When the panel last reported a change for this area.
    pub last_changed: Option<DateTime<Utc>>,
}

/// State of one sensor zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneState {
    /// 1-based zone index, stable for the device's lifetime.
    pub index: usize,
    /// Current activity.
    pub activity: ZoneActivity,
    /// When the panel last reported a change for this zone.
    pub last_changed: Option<DateTime<Utc>>,
}

/// State of one programmable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgmState {
    /// 1-based output index.
    pub index: usize,
    /// Whether the output is closed (energized).
    pub closed: bool,
}

/// Mutable state snapshot of one device.
///
/// Created empty at store initialization for every known device and
/// replaced in place on each merge — never partially torn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    /// Area states, sized by the device profile.
    pub areas: Vec<AreaState>,
    /// Zone states, sized by the device profile.
    pub zones: Vec<ZoneState>,
    /// PGM states, sized by the device profile.
    pub pgms: Vec<PgmState>,
    /// Mains and battery status.
    pub power: PowerStatus,
    /// Channel that produced the last merge, if any yet.
    pub source: Option<UpdateSource>,
    /// When the last merge happened.
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeviceState {
    /// Creates the empty initial state for a device profile.
    ///
    /// Areas start [`ArmState::Unknown`], zones closed, PGMs open.
    #[must_use]
    pub fn empty(profile: &DeviceProfile) -> Self {
        Self {
            areas: (1..=profile.areas_limit)
                .map(|index| AreaState {
                    index,
                    name: profile.area_name(index),
                    arm_state: ArmState::Unknown,
                    last_changed: None,
                })
                .collect(),
            zones: (1..=profile.zones_limit)
                .map(|index| ZoneState {
                    index,
                    activity: ZoneActivity::Closed,
                    last_changed: None,
                })
                .collect(),
            pgms: (1..=profile.pgm_limit)
                .map(|index| PgmState {
                    index,
                    closed: false,
                })
                .collect(),
            power: PowerStatus::default(),
            source: None,
            updated_at: None,
        }
    }

    /// Returns the area with the given 1-based index.
    #[must_use]
    pub fn area(&self, index: usize) -> Option<&AreaState> {
        index.checked_sub(1).and_then(|i| self.areas.get(i))
    }

    /// Returns the zone with the given 1-based index.
    #[must_use]
    pub fn zone(&self, index: usize) -> Option<&ZoneState> {
        index.checked_sub(1).and_then(|i| self.zones.get(i))
    }

    /// Returns the PGM with the given 1-based index.
    #[must_use]
    pub fn pgm(&self, index: usize) -> Option<&PgmState> {
        index.checked_sub(1).and_then(|i| self.pgms.get(i))
    }
}

/// A profile-fitted snapshot ready for merging.
///
/// Built from a [`RawPanelState`] and the device profile: lists are
/// sized to the profile limits regardless of what the message carried,
/// keeping indices stable across updates.
#[derive(Debug, Clone)]
pub struct PanelSnapshot {
    /// Area states.
    pub areas: Vec<AreaState>,
    /// Zone states.
    pub zones: Vec<ZoneState>,
    /// PGM states.
    pub pgms: Vec<PgmState>,
    /// Power status.
    pub power: PowerStatus,
}

impl PanelSnapshot {
    /// Fits a raw wire state to a device profile.
    ///
    /// Areas beyond what the message carries read as
    /// [`ArmState::Unknown`]; missing zones read as closed. Area names
    /// prefer the payload's `areasDetail`, then the profile labels.
    #[must_use]
    pub fn from_raw(raw: &RawPanelState, profile: &DeviceProfile) -> Self {
        let areas = (1..=profile.areas_limit)
            .map(|index| {
                let position = index - 1;
                let arm_state = raw
                    .areas
                    .get(position)
                    .map_or(ArmState::Unknown, |value| ArmState::from_wire(value));
                let name = raw
                    .area_detail(position)
                    .map_or_else(|| profile.area_name(index), str::to_string);
                AreaState {
                    index,
                    name,
                    arm_state,
                    last_changed: raw.area_stamp(position),
                }
            })
            .collect();

        let zones = (1..=profile.zones_limit)
            .map(|index| {
                let position = index - 1;
                let activity = raw
                    .zones
                    .get(position)
                    .map_or(ZoneActivity::Closed, |value| ZoneActivity::from_wire(value));
                ZoneState {
                    index,
                    activity,
                    last_changed: raw.zone_stamp(position),
                }
            })
            .collect();

        let pgms = (1..=profile.pgm_limit)
            .map(|index| PgmState {
                index,
                closed: raw.pgm.get(index - 1).is_some_and(|value| value == "c"),
            })
            .collect();

        let power = raw.power.as_ref().map_or_else(PowerStatus::default, |p| {
            PowerStatus::new(
                p.ac.as_ref().is_some_and(WireFlag::is_set),
                p.batt.as_ref().is_some_and(WireFlag::is_set),
            )
        });

        Self {
            areas,
            zones,
            pgms,
            power,
        }
    }
}
