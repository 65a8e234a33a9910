// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound stream envelope.

use serde::Deserialize;

use crate::error::DecodeError;

use super::RawPanelState;

/// Envelope type carrying a full panel state snapshot.
pub const ALARM_PAYLOAD: &str = "alarmPayload";

/// Envelope of an inbound stream message.
///
/// Messages of type [`ALARM_PAYLOAD`] carry a [`RawPanelState`] in
/// `data`; every other type is discarded by the connection with a
/// debug-level note.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Message type discriminator.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Panel state, present on alarm payloads.
    #[serde(default)]
    pub data: Option<RawPanelState>,
}

impl Envelope {
    /// Returns `true` when this envelope carries a panel state snapshot.
    #[must_use]
    pub fn is_alarm_payload(&self) -> bool {
        self.kind.as_deref() == Some(ALARM_PAYLOAD)
    }

    /// Consumes the envelope, returning the panel state of an alarm
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MissingField`] when an alarm payload has
    /// no `data` field.
    pub fn into_panel_state(self) -> Result<RawPanelState, DecodeError> {
        self.data.ok_or(DecodeError::MissingField("data"))
    }
}

/// Decodes raw payload bytes into an [`Envelope`].
///
/// # Errors
///
/// Returns [`DecodeError`] when the bytes are not UTF-8 or not valid
/// JSON for the envelope shape.
pub fn decode_envelope(payload: &[u8]) -> Result<Envelope, DecodeError> {
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_alarm_payload() {
        let raw = br#"{
            "type": "alarmPayload",
            "data": {
                "areas": ["disarm"],
                "zones": ["c", "a"],
                "power": {"AC": "1", "Batt": "1"}
            }
        }"#;

        let envelope = decode_envelope(raw).unwrap();
        assert!(envelope.is_alarm_payload());

        let state = envelope.into_panel_state().unwrap();
        assert_eq!(state.areas, vec!["disarm"]);
        assert_eq!(state.zones.len(), 2);
    }

    #[test]
    fn non_alarm_type_is_not_alarm_payload() {
        let envelope = decode_envelope(br#"{"type": "heartbeat"}"#).unwrap();
        assert!(!envelope.is_alarm_payload());
    }

    #[test]
    fn missing_type_is_not_alarm_payload() {
        let envelope = decode_envelope(br"{}").unwrap();
        assert!(!envelope.is_alarm_payload());
    }

    #[test]
    fn alarm_payload_without_data_is_missing_field() {
        let envelope = decode_envelope(br#"{"type": "alarmPayload"}"#).unwrap();
        assert!(matches!(
            envelope.into_panel_state(),
            Err(DecodeError::MissingField("data"))
        ));
    }

    #[test]
    fn invalid_json_is_decode_error() {
        assert!(matches!(
            decode_envelope(b"not json"),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn invalid_utf8_is_decode_error() {
        assert!(matches!(
            decode_envelope(&[0xff, 0xfe]),
            Err(DecodeError::NotUtf8)
        ));
    }
}
