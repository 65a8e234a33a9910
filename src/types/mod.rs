// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Domain value types for alarm panels.
//!
//! These types model the vocabulary shared by both synchronization
//! channels: area arm states, zone activity, programmable outputs, mains
//! and battery power, and the logical commands a caller can issue.

mod arm_state;
mod command;
mod power;
mod zone;

pub use arm_state::ArmState;
pub use command::PanelCommand;
pub use power::PowerStatus;
pub use zone::ZoneActivity;
