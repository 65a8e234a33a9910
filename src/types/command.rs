// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logical panel commands.
//!
//! A [`PanelCommand`] is channel-neutral; the two transports encode it
//! differently. The stream control topic takes the short arm verbs
//! (`disarm`, `arm`, `stay`, `sleep`), while the REST actions endpoint
//! takes the prefixed forms (`area-disarm`, `pgm-open`, ...). PGM
//! commands are REST-only: the panel service does not accept them on the
//! stream control topic.

/// A logical command addressed to one area or programmable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelCommand {
    /// Disarm an area.
    Disarm,
    /// Arm an area in away mode.
    ArmAway,
    /// Arm an area in stay mode.
    ArmHome,
    /// Arm an area in sleep mode.
    ArmNight,
    /// Energize a programmable output.
    PgmOpen,
    /// De-energize a programmable output.
    PgmClose,
    /// Pulse a programmable output.
    PgmPulse,
}

impl PanelCommand {
    /// Returns the stream control verb, or `None` when the command can
    /// only travel over the REST API.
    #[must_use]
    pub fn stream_cmd(&self) -> Option<&'static str> {
        match self {
            Self::Disarm => Some("disarm"),
            Self::ArmAway => Some("arm"),
            Self::ArmHome => Some("stay"),
            Self::ArmNight => Some("sleep"),
            Self::PgmOpen | Self::PgmClose | Self::PgmPulse => None,
        }
    }

    /// Returns the REST action command string.
    #[must_use]
    pub fn rest_cmd(&self) -> &'static str {
        match self {
            Self::Disarm => "area-disarm",
            Self::ArmAway => "area-arm",
            Self::ArmHome => "area-stay",
            Self::ArmNight => "area-sleep",
            Self::PgmOpen => "pgm-open",
            Self::PgmClose => "pgm-close",
            Self::PgmPulse => "pgm-pulse",
        }
    }

    /// Returns `true` for commands targeting a programmable output.
    #[must_use]
    pub fn is_pgm(&self) -> bool {
        matches!(self, Self::PgmOpen | Self::PgmClose | Self::PgmPulse)
    }
}

impl std::fmt::Display for PanelCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.rest_cmd())
    }
}
