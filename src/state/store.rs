// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Authoritative in-memory store of per-device state.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;

use crate::device::{DeviceId, DeviceProfile};
use crate::error::Error;
use crate::event::{EventBus, StateEvent};
use crate::payload::RawPanelState;

use super::{DeviceState, PanelSnapshot, UpdateSource};

/// Authoritative merge target for both synchronization channels.
///
/// The store owns one [`DeviceState`] per device, each behind its own
/// lock — merges for unrelated devices never serialize against each
/// other. The device set is fixed at construction; snapshots for
/// unknown devices are rejected.
///
/// Merge rule: an incoming source-tagged snapshot fully replaces the
/// area/zone/PGM lists and the power flags for that device. Change
/// events are emitted per index only where the merged value differs
/// from the previous one (value-level diffing, not source-level), plus
/// one whole-device update per merge.
#[derive(Debug)]
pub struct StateStore {
    entries: HashMap<DeviceId, StoreEntry>,
    bus: EventBus,
}

#[derive(Debug)]
struct StoreEntry {
    profile: DeviceProfile,
    state: Mutex<DeviceState>,
}

impl StateStore {
    /// Creates a store seeded with empty state for every known device.
    #[must_use]
    pub fn new(devices: impl IntoIterator<Item = (DeviceId, DeviceProfile)>, bus: EventBus) -> Self {
        let entries = devices
            .into_iter()
            .map(|(id, profile)| {
                let state = Mutex::new(DeviceState::empty(&profile));
                (id, StoreEntry { profile, state })
            })
            .collect();
        Self { entries, bus }
    }

    /// Returns the ids of all devices in the store.
    #[must_use]
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.entries.keys().cloned().collect()
    }

    /// Returns the number of devices in the store.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns a copy of a device's current state.
    #[must_use]
    pub fn get(&self, device_id: &DeviceId) -> Option<DeviceState> {
        self.entries
            .get(device_id)
            .map(|entry| entry.state.lock().clone())
    }

    /// Returns the profile of a device in the store.
    #[must_use]
    pub fn profile(&self, device_id: &DeviceId) -> Option<&DeviceProfile> {
        self.entries.get(device_id).map(|entry| &entry.profile)
    }

    /// Merges a raw snapshot for one device.
    ///
    /// The snapshot is fitted to the device's profile, then swapped in
    /// wholesale under the device's lock. Value changes are published on
    /// the event bus after the lock is released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDevice`] when the device was not part of
    /// the store's seed set.
    pub fn merge(
        &self,
        device_id: &DeviceId,
        raw: &RawPanelState,
        source: UpdateSource,
    ) -> Result<(), Error> {
        let entry = self
            .entries
            .get(device_id)
            .ok_or_else(|| Error::UnknownDevice(device_id.to_string()))?;

        let snapshot = PanelSnapshot::from_raw(raw, &entry.profile);
        let mut events = Vec::new();

        {
            let mut state = entry.state.lock();

            for (old, new) in state.areas.iter().zip(&snapshot.areas) {
                if old.arm_state != new.arm_state {
                    events.push(StateEvent::AreaChanged {
                        device_id: device_id.clone(),
                        index: new.index,
                        state: new.arm_state,
                    });
                }
            }
            for (old, new) in state.zones.iter().zip(&snapshot.zones) {
                if old.activity != new.activity {
                    events.push(StateEvent::ZoneChanged {
                        device_id: device_id.clone(),
                        index: new.index,
                        activity: new.activity,
                    });
                }
            }
            for (old, new) in state.pgms.iter().zip(&snapshot.pgms) {
                if old.closed != new.closed {
                    events.push(StateEvent::PgmChanged {
                        device_id: device_id.clone(),
                        index: new.index,
                        closed: new.closed,
                    });
                }
            }
            if state.power != snapshot.power {
                events.push(StateEvent::PowerChanged {
                    device_id: device_id.clone(),
                    power: snapshot.power,
                });
            }

            state.areas = snapshot.areas;
            state.zones = snapshot.zones;
            state.pgms = snapshot.pgms;
            state.power = snapshot.power;
            state.source = Some(source);
            state.updated_at = Some(Utc::now());
        }

        tracing::debug!(
            device = %device_id,
            %source,
            changes = events.len(),
            "Merged panel snapshot"
        );

        for event in events {
            self.bus.publish(event);
        }
        self.bus.publish(StateEvent::DeviceUpdated {
            device_id: device_id.clone(),
            source,
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArmState, ZoneActivity};

    fn profile() -> DeviceProfile {
        DeviceProfile {
            areas_limit: 2,
            areas_labels: vec!["House".to_string(), "Garage".to_string()],
            zones_limit: 2,
            zones_labels: Vec::new(),
            pgm_limit: 1,
            pgm_labels: Vec::new(),
            pgm_control: Vec::new(),
        }
    }

    fn store_with(ids: &[&str]) -> StateStore {
        let bus = EventBus::new();
        StateStore::new(
            ids.iter().map(|id| (DeviceId::from(*id), profile())),
            bus,
        )
    }

    fn raw(json: &str) -> RawPanelState {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn unknown_device_is_rejected() {
        let store = store_with(&["dev-1"]);
        let result = store.merge(&DeviceId::from("ghost"), &RawPanelState::default(), UpdateSource::Poll);
        assert!(matches!(result, Err(Error::UnknownDevice(_))));
    }

    #[test]
    fn merge_replaces_state_wholesale() {
        let store = store_with(&["dev-1"]);
        let id = DeviceId::from("dev-1");

        store
            .merge(
                &id,
                &raw(r#"{"areas": ["arm", "disarm"], "zones": ["a", "c"], "power": {"AC": "1", "Batt": "1"}}"#),
                UpdateSource::Stream,
            )
            .unwrap();

        let state = store.get(&id).unwrap();
        assert_eq!(state.area(1).unwrap().arm_state, ArmState::ArmedAway);
        assert_eq!(state.zone(1).unwrap().activity, ZoneActivity::Active);
        assert!(state.power.ac_ok);
        assert_eq!(state.source, Some(UpdateSource::Stream));
        assert!(state.updated_at.is_some());
    }

    #[test]
    fn last_writer_wins_without_field_blending() {
        let store = store_with(&["dev-1"]);
        let id = DeviceId::from("dev-1");

        store
            .merge(
                &id,
                &raw(r#"{"areas": ["arm", "arm"], "zones": ["a", "a"], "power": {"AC": "1", "Batt": "1"}}"#),
                UpdateSource::Stream,
            )
            .unwrap();
        // The poll snapshot omits power entirely; the merged state must
        // reflect the poll exactly, not keep the stream's power flags.
        store
            .merge(
                &id,
                &raw(r#"{"areas": ["disarm", "disarm"], "zones": ["c", "c"]}"#),
                UpdateSource::Poll,
            )
            .unwrap();

        let state = store.get(&id).unwrap();
        assert_eq!(state.area(1).unwrap().arm_state, ArmState::Disarmed);
        assert_eq!(state.area(2).unwrap().arm_state, ArmState::Disarmed);
        assert_eq!(state.zone(2).unwrap().activity, ZoneActivity::Closed);
        assert!(!state.power.ac_ok);
        assert_eq!(state.source, Some(UpdateSource::Poll));
    }

    #[tokio::test]
    async fn changed_indices_notify_only_changed_values() {
        let bus = EventBus::new();
        let store = StateStore::new([(DeviceId::from("dev-1"), profile())], bus.clone());
        let id = DeviceId::from("dev-1");

        store
            .merge(
                &id,
                &raw(r#"{"areas": ["disarm", "disarm"], "zones": ["c", "c"]}"#),
                UpdateSource::Poll,
            )
            .unwrap();

        let mut rx = bus.subscribe();

        // Area 1 arms; area 2 and both zones are untouched.
        store
            .merge(
                &id,
                &raw(r#"{"areas": ["arm", "disarm"], "zones": ["c", "c"]}"#),
                UpdateSource::Stream,
            )
            .unwrap();

        let first = rx.recv().await.unwrap();
        match first {
            StateEvent::AreaChanged { index, state, .. } => {
                assert_eq!(index, 1);
                assert_eq!(state, ArmState::ArmedAway);
            }
            other => panic!("expected AreaChanged, got {other:?}"),
        }

        // The only other event from this merge is the whole-device
        // update.
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, StateEvent::DeviceUpdated { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn devices_merge_independently() {
        let store = store_with(&["dev-1", "dev-2"]);
        let one = DeviceId::from("dev-1");
        let two = DeviceId::from("dev-2");

        store
            .merge(&one, &raw(r#"{"areas": ["alarm", "alarm"]}"#), UpdateSource::Stream)
            .unwrap();
        store
            .merge(&two, &raw(r#"{"areas": ["stay", "stay"]}"#), UpdateSource::Poll)
            .unwrap();

        assert_eq!(
            store.get(&one).unwrap().area(1).unwrap().arm_state,
            ArmState::Triggered
        );
        assert_eq!(
            store.get(&two).unwrap().area(1).unwrap().arm_state,
            ArmState::ArmedHome
        );
    }

    #[test]
    fn identical_merge_emits_no_value_events() {
        let bus = EventBus::new();
        let store = StateStore::new([(DeviceId::from("dev-1"), profile())], bus.clone());
        let id = DeviceId::from("dev-1");
        let snapshot = raw(r#"{"areas": ["disarm", "disarm"], "zones": ["c", "c"]}"#);

        store.merge(&id, &snapshot, UpdateSource::Poll).unwrap();

        let mut rx = bus.subscribe();
        store.merge(&id, &snapshot, UpdateSource::Poll).unwrap();

        // Only the whole-device update fires.
        assert!(matches!(
            rx.try_recv().unwrap(),
            StateEvent::DeviceUpdated { .. }
        ));
        assert!(rx.try_recv().is_err());
    }
}
