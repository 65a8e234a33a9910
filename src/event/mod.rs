// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change notifications.
//!
//! The state store publishes a [`StateEvent`] on a broadcast bus for
//! every observed value change, plus one whole-device update per merge.
//! UI layers subscribe once and filter by device/index.

mod event_bus;
mod state_event;

pub use event_bus::EventBus;
pub use state_event::StateEvent;
