// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire payload parsing.
//!
//! Both channels deliver panel state in the same JSON shape: the stream
//! wraps it in a typed envelope, the REST devices endpoint embeds it as
//! `deviceState`. This module decodes the envelope and the raw state;
//! fitting a raw state to a device profile happens in
//! [`crate::state`].

mod envelope;
mod panel_state;

pub use envelope::{ALARM_PAYLOAD, Envelope, decode_envelope};
pub use panel_state::{RawPanelState, RawPower, WireFlag};
