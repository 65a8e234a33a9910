// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Area arm states.

use serde::{Deserialize, Serialize};

/// Arm state of a single alarm area.
///
/// Both channels report area states as short strings (`disarm`, `arm`,
/// `stay`, `sleep`, `alarm`, `countdown`). Anything the panel firmware
/// sends outside that vocabulary maps to [`ArmState::Unknown`] rather
/// than failing the whole snapshot.
///
/// # Examples
///
/// ```
/// use alarmsync::ArmState;
///
/// assert_eq!(ArmState::from_wire("arm"), ArmState::ArmedAway);
/// assert_eq!(ArmState::from_wire("launch"), ArmState::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmState {
    /// The area is disarmed.
    Disarmed,
    /// The area is fully armed (away mode).
    ArmedAway,
    /// The area is armed with occupants present (stay mode).
    ArmedHome,
    /// The area is armed for the night (sleep mode).
    ArmedNight,
    /// The alarm is sounding.
    Triggered,
    /// Exit/entry delay is counting down.
    Pending,
    /// The panel reported a state outside the known vocabulary, or no
    /// state has been received yet.
    Unknown,
}

impl ArmState {
    /// Parses a wire-format state string.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "disarm" => Self::Disarmed,
            "arm" => Self::ArmedAway,
            "stay" => Self::ArmedHome,
            "sleep" => Self::ArmedNight,
            "alarm" => Self::Triggered,
            "countdown" => Self::Pending,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` if the area is in any armed state.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        matches!(self, Self::ArmedAway | Self::ArmedHome | Self::ArmedNight)
    }
}

impl std::fmt::Display for ArmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Disarmed => "disarmed",
            Self::ArmedAway => "armed_away",
            Self::ArmedHome => "armed_home",
            Self::ArmedNight => "armed_night",
            Self::Triggered => "triggered",
            Self::Pending => "pending",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_states() {
        assert_eq!(ArmState::from_wire("disarm"), ArmState::Disarmed);
        assert_eq!(ArmState::from_wire("arm"), ArmState::ArmedAway);
        assert_eq!(ArmState::from_wire("stay"), ArmState::ArmedHome);
        assert_eq!(ArmState::from_wire("sleep"), ArmState::ArmedNight);
        assert_eq!(ArmState::from_wire("alarm"), ArmState::Triggered);
        assert_eq!(ArmState::from_wire("countdown"), ArmState::Pending);
    }

    #[test]
    fn unrecognized_state_maps_to_unknown() {
        assert_eq!(ArmState::from_wire(""), ArmState::Unknown);
        assert_eq!(ArmState::from_wire("ARM"), ArmState::Unknown);
        assert_eq!(ArmState::from_wire("partial"), ArmState::Unknown);
    }

    #[test]
    fn armed_predicate() {
        assert!(ArmState::ArmedAway.is_armed());
        assert!(ArmState::ArmedNight.is_armed());
        assert!(!ArmState::Disarmed.is_armed());
        assert!(!ArmState::Triggered.is_armed());
    }
}
