// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identity and profile.
//!
//! A [`Device`] is the immutable identity of one alarm panel
//! communicator, created at fleet discovery and never mutated. The
//! accompanying [`DeviceProfile`] fixes the cardinality and labels of
//! areas, zones and programmable outputs for the device's lifetime —
//! state snapshots are sized against the profile, never against whatever
//! a single message happens to carry.

use std::sync::Arc;

use serde::Deserialize;

/// Identifier of a device within the fleet.
///
/// Wraps the service-assigned device id. Cheap to clone; used as the key
/// for state entries, stream connections and events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(Arc<str>);

impl DeviceId {
    /// Creates a device id from the service-assigned string.
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Immutable identity of one alarm panel communicator.
#[derive(Debug, Clone)]
pub struct Device {
    id: DeviceId,
    imei: String,
    name: String,
}

impl Device {
    /// Creates a device identity.
    #[must_use]
    pub fn new(id: impl Into<DeviceId>, imei: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            imei: imei.into(),
            name: name.into(),
        }
    }

    /// Returns the device id.
    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Returns the transport address (IMEI) used in stream topics.
    #[must_use]
    pub fn imei(&self) -> &str {
        &self.imei
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Panel profile: cardinality and labels of areas, zones and PGMs.
///
/// Loaded once from the devices endpoint at discovery. Indices derived
/// from the profile are 1-based and stable; per-message payloads are
/// fitted to these limits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceProfile {
    /// Number of areas the panel exposes.
    #[serde(rename = "areasLimit", default)]
    pub areas_limit: usize,

    /// Area labels, indexed by area number - 1.
    #[serde(rename = "areasLabels", default)]
    pub areas_labels: Vec<String>,

    /// Number of sensor zones.
    #[serde(rename = "zonesLimit", default)]
    pub zones_limit: usize,

    /// Zone labels, indexed by zone number - 1.
    #[serde(rename = "zonesLabels", default)]
    pub zones_labels: Vec<String>,

    /// Number of programmable outputs.
    #[serde(rename = "pgmLimit", default)]
    pub pgm_limit: usize,

    /// PGM labels, indexed by output number - 1.
    #[serde(rename = "pgmLabels", default)]
    pub pgm_labels: Vec<String>,

    /// PGM control masks. Two characters per output: char 0 is the
    /// enabled flag, char 1 the open/close-controllable flag.
    #[serde(rename = "pgmControl", default)]
    pub pgm_control: Vec<String>,
}

impl DeviceProfile {
    /// Returns the label for a 1-based area index, falling back to
    /// `Area {index}` when the profile carries no usable label.
    #[must_use]
    pub fn area_name(&self, index: usize) -> String {
        self.label_or(&self.areas_labels, index, "Area")
    }

    /// Returns the label for a 1-based zone index.
    #[must_use]
    pub fn zone_name(&self, index: usize) -> String {
        self.label_or(&self.zones_labels, index, "Zone")
    }

    /// Returns the label for a 1-based PGM index.
    #[must_use]
    pub fn pgm_name(&self, index: usize) -> String {
        self.label_or(&self.pgm_labels, index, "PGM")
    }

    /// Returns `true` when the 1-based PGM index is enabled for
    /// open/close control.
    #[must_use]
    pub fn pgm_controllable(&self, index: usize) -> bool {
        let Some(mask) = index.checked_sub(1).and_then(|i| self.pgm_control.get(i)) else {
            return false;
        };
        let mut chars = mask.chars();
        chars.next() == Some('1') && chars.next() == Some('1')
    }

    fn label_or(&self, labels: &[String], index: usize, fallback: &str) -> String {
        index
            .checked_sub(1)
            .and_then(|i| labels.get(i))
            .filter(|label| !label.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("{fallback} {index}"))
    }
}
