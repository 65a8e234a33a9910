// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Zone activity states.

use serde::{Deserialize, Serialize};

/// Activity of a single sensor zone.
///
/// The wire format is a one-letter code: `a` (active), `c` (closed),
/// `b` (bypassed). Unrecognized codes are treated as closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneActivity {
    /// The sensor is tripped (door open, motion detected).
    Active,
    /// The sensor is at rest.
    Closed,
    /// The zone is bypassed and excluded from arming.
    Bypassed,
}

impl ZoneActivity {
    /// Parses a wire-format zone code.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "a" => Self::Active,
            "b" => Self::Bypassed,
            _ => Self::Closed,
        }
    }

    /// Returns `true` if the sensor is tripped.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for ZoneActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Bypassed => "bypassed",
        };
        f.write_str(label)
    }
}
