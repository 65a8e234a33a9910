// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mains and battery power status.

use serde::{Deserialize, Serialize};

/// Power status of the panel communicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerStatus {
    /// Mains (AC) supply is present.
    pub ac_ok: bool,
    /// Backup battery is healthy.
    pub batt_ok: bool,
}

impl PowerStatus {
    /// Creates a power status from the two supply flags.
    #[must_use]
    pub fn new(ac_ok: bool, batt_ok: bool) -> Self {
        Self { ac_ok, batt_ok }
    }
}

impl std::fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ac={} batt={}", self.ac_ok, self.batt_ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unpowered() {
        let power = PowerStatus::default();
        assert!(!power.ac_ok);
        assert!(!power.batt_ok);
    }

    #[test]
    fn display_format() {
        let power = PowerStatus::new(true, false);
        assert_eq!(power.to_string(), "ac=true batt=false");
    }
}
