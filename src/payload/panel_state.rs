// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw panel state as it appears on the wire.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Full panel state snapshot in wire format.
///
/// The same shape arrives on both channels: stream alarm payloads carry
/// it under `data`, the REST devices endpoint under `deviceState`. All
/// fields default to empty — panels with no zones simply omit the zone
/// arrays.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPanelState {
    /// Area arm states, one wire string per area.
    #[serde(default)]
    pub areas: Vec<String>,

    /// Area names as reported by the panel; entries may be null.
    #[serde(rename = "areasDetail", default)]
    pub areas_detail: Vec<Option<String>>,

    /// Last-changed timestamps per area, epoch milliseconds.
    #[serde(rename = "areasStamp", default)]
    pub areas_stamp: Vec<Option<i64>>,

    /// Zone activity codes, one per zone.
    #[serde(default)]
    pub zones: Vec<String>,

    /// Last-changed timestamps per zone, epoch milliseconds.
    #[serde(rename = "zonesStamp", default)]
    pub zones_stamp: Vec<Option<i64>>,

    /// Programmable output states, `c` for closed.
    #[serde(default)]
    pub pgm: Vec<String>,

    /// Mains and battery supply flags.
    #[serde(default)]
    pub power: Option<RawPower>,
}

impl RawPanelState {
    /// Returns the area timestamp at a 0-based position, decoded.
    #[must_use]
    pub fn area_stamp(&self, position: usize) -> Option<DateTime<Utc>> {
        decode_stamp(&self.areas_stamp, position)
    }

    /// Returns the zone timestamp at a 0-based position, decoded.
    #[must_use]
    pub fn zone_stamp(&self, position: usize) -> Option<DateTime<Utc>> {
        decode_stamp(&self.zones_stamp, position)
    }

    /// Returns the area name at a 0-based position, when the payload
    /// carries a non-empty one.
    #[must_use]
    pub fn area_detail(&self, position: usize) -> Option<&str> {
        self.areas_detail
            .get(position)
            .and_then(Option::as_deref)
            .filter(|name| !name.is_empty())
    }
}

fn decode_stamp(stamps: &[Option<i64>], position: usize) -> Option<DateTime<Utc>> {
    let millis = (*stamps.get(position)?)?;
    DateTime::from_timestamp_millis(millis)
}

/// Power supply flags in wire format.
///
/// The service is inconsistent about the value type here — observed as
/// the strings `"0"`/`"1"` and as bare numbers — so both are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPower {
    /// Mains supply flag.
    #[serde(rename = "AC", default)]
    pub ac: Option<WireFlag>,

    /// Battery health flag.
    #[serde(rename = "Batt", default)]
    pub batt: Option<WireFlag>,
}

/// A boolean flag that arrives as a string, number or bool.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireFlag {
    /// String form, `"1"` meaning set.
    Text(String),
    /// Numeric form, non-zero meaning set.
    Number(i64),
    /// Plain boolean.
    Bool(bool),
}

impl WireFlag {
    /// Returns `true` when the flag is set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        match self {
            Self::Text(value) => value == "1",
            Self::Number(value) => *value != 0,
            Self::Bool(value) => *value,
        }
    }
}
