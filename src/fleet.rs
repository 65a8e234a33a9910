// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fleet orchestration.
//!
//! The supervisor discovers the device fleet over REST, seeds the state
//! store, wires one stream connection per device into a single merge
//! loop, and runs two timers: a snapshot poll and a stream health
//! check. A single device's failure — discovery glitches aside — never
//! blocks the rest of the fleet.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::auth::TokenProvider;
use crate::config::FleetConfig;
use crate::device::{Device, DeviceId};
use crate::dispatch::{CommandDispatcher, CommandOutcome};
use crate::error::Error;
use crate::event::{EventBus, StateEvent};
use crate::protocol::{RestClient, StreamConnection, StreamStatus, StreamUpdate};
use crate::state::{StateStore, UpdateSource};
use crate::types::PanelCommand;

/// Owns the fleet: stream connections, the state store, and the timers
/// that keep both channels moving.
///
/// # Examples
///
/// ```no_run
/// use alarmsync::{FleetConfig, FleetSupervisor, StaticToken};
///
/// # async fn example() -> alarmsync::Result<()> {
/// let config = FleetConfig::new("https://apiv4.olarm.co/api/v4");
/// let mut fleet = FleetSupervisor::new(config, StaticToken::new("api-key"))?;
///
/// let mut events = fleet.subscribe();
/// fleet.start().await?;
///
/// while let Ok(event) = events.recv().await {
///     println!("{event:?}");
/// }
///
/// fleet.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct FleetSupervisor<P: TokenProvider> {
    config: FleetConfig,
    tokens: Arc<P>,
    rest: Arc<RestClient<P>>,
    bus: EventBus,
    runtime: Option<FleetRuntime<P>>,
}

struct FleetRuntime<P: TokenProvider> {
    store: Arc<StateStore>,
    streams: Arc<HashMap<DeviceId, StreamConnection>>,
    devices: Vec<Device>,
    dispatcher: Arc<CommandDispatcher<P>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<P: TokenProvider + 'static> FleetSupervisor<P> {
    /// Creates a supervisor. Nothing is contacted until
    /// [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the HTTP client cannot be built.
    pub fn new(config: FleetConfig, tokens: P) -> Result<Self, Error> {
        let tokens = Arc::new(tokens);
        let rest = Arc::new(RestClient::new(&config.api, Arc::clone(&tokens))?);
        let bus = EventBus::with_capacity(config.event_capacity);
        Ok(Self {
            config,
            tokens,
            rest,
            bus,
            runtime: None,
        })
    }

    /// Subscribes to state and connection events.
    ///
    /// May be called before [`start`](Self::start); events begin to
    /// flow once the fleet is running.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.bus.subscribe()
    }

    /// Returns `true` once the fleet is running.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.runtime.is_some()
    }

    /// Discovers the fleet and brings both channels up.
    ///
    /// Each device's stream is connected independently: one device
    /// failing to connect is logged and does not block the others, and
    /// the health timer keeps retrying it. Idempotent once started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] or [`Error::Auth`] when discovery itself
    /// fails — without a device list there is no fleet to run.
    pub async fn start(&mut self) -> Result<(), Error> {
        if self.runtime.is_some() {
            return Ok(());
        }

        let records = self.rest.list_devices().await?;
        tracing::info!(devices = records.len(), "Discovered fleet");

        let store = Arc::new(StateStore::new(
            records
                .iter()
                .map(|record| (DeviceId::from(record.device_id.as_str()), record.profile.clone())),
            self.bus.clone(),
        ));

        // Seed every device from the snapshot the listing already
        // carries.
        for record in &records {
            let id = DeviceId::from(record.device_id.as_str());
            if let Err(err) = store.merge(&id, &record.state, UpdateSource::Poll) {
                tracing::warn!(device = %id, error = %err, "Seed merge failed");
            }
        }

        let (updates_tx, updates_rx) = mpsc::channel::<StreamUpdate>(self.config.merge_capacity);
        let mut tasks = Vec::new();
        tasks.push(Self::spawn_merge_loop(Arc::clone(&store), updates_rx));

        let token = self.tokens.access_token().await?;
        let mut devices = Vec::new();
        let mut streams = HashMap::new();
        for record in &records {
            let device = record.identity();
            devices.push(device.clone());

            if device.imei().is_empty() {
                tracing::warn!(
                    device = %device.id(),
                    "Device has no transport address, poll-only"
                );
                continue;
            }
            let stream = StreamConnection::new(
                device.clone(),
                token.clone(),
                self.config.stream.clone(),
                updates_tx.clone(),
                self.bus.clone(),
            );
            streams.insert(device.id().clone(), stream);
        }
        let streams = Arc::new(streams);

        // Connect each device independently; failures are isolated and
        // retried by the health timer.
        for (id, stream) in streams.iter() {
            if !stream.connect().await {
                tracing::warn!(device = %id, "Initial stream connect failed, continuing");
            }
        }

        tasks.push(self.spawn_poll_timer(Arc::clone(&store)));
        tasks.push(self.spawn_health_timer(Arc::clone(&streams)));

        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&self.rest),
            Arc::clone(&store),
            Arc::clone(&streams),
            self.config.stream_only,
        ));

        self.runtime = Some(FleetRuntime {
            store,
            streams,
            devices,
            dispatcher,
            tasks,
        });

        tracing::info!("Fleet started");
        Ok(())
    }

    /// Stops the timers, disconnects every stream, and releases the
    /// runtime. Safe to call when not started.
    pub async fn shutdown(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        for task in runtime.tasks {
            task.abort();
        }
        for stream in runtime.streams.values() {
            stream.disconnect().await;
        }
        tracing::info!("Fleet shut down");
    }

    /// Executes a command against one device.
    ///
    /// Returns [`CommandOutcome::Unavailable`] when the fleet is not
    /// started.
    pub async fn execute(
        &self,
        device_id: &DeviceId,
        command: PanelCommand,
        num: usize,
    ) -> CommandOutcome {
        let Some(runtime) = &self.runtime else {
            tracing::warn!(device = %device_id, "Fleet not started, command unavailable");
            return CommandOutcome::Unavailable;
        };
        runtime.dispatcher.execute(device_id, command, num).await
    }

    /// Returns the state store once started.
    #[must_use]
    pub fn store(&self) -> Option<Arc<StateStore>> {
        self.runtime.as_ref().map(|r| Arc::clone(&r.store))
    }

    /// Returns the command dispatcher once started.
    #[must_use]
    pub fn dispatcher(&self) -> Option<Arc<CommandDispatcher<P>>> {
        self.runtime.as_ref().map(|r| Arc::clone(&r.dispatcher))
    }

    /// Returns the discovered device identities once started.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.runtime
            .as_ref()
            .map(|r| r.devices.clone())
            .unwrap_or_default()
    }

    /// Returns the health snapshot of one device's stream.
    #[must_use]
    pub fn stream_status(&self, device_id: &DeviceId) -> Option<StreamStatus> {
        self.runtime
            .as_ref()
            .and_then(|r| r.streams.get(device_id))
            .map(StreamConnection::status)
    }

    /// Single control loop applying stream snapshots to the store.
    /// Keeps per-device merges totally ordered by arrival.
    fn spawn_merge_loop(
        store: Arc<StateStore>,
        mut updates: mpsc::Receiver<StreamUpdate>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                if let Err(err) = store.merge(&update.device_id, &update.state, UpdateSource::Stream)
                {
                    tracing::warn!(device = %update.device_id, error = %err, "Stream merge failed");
                }
            }
            tracing::debug!("Merge loop stopped");
        })
    }

    /// Periodic REST snapshot poll, refreshing the token ahead of the
    /// request when it is near expiry.
    fn spawn_poll_timer(&self, store: Arc<StateStore>) -> JoinHandle<()> {
        let rest = Arc::clone(&self.rest);
        let tokens = Arc::clone(&self.tokens);
        let period = self.config.poll_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Discovery just seeded the store; skip the immediate tick.
            interval.tick().await;

            loop {
                interval.tick().await;

                if tokens.is_expired() {
                    if let Err(err) = tokens.refresh().await {
                        tracing::warn!(error = %err, "Token refresh failed, skipping poll");
                        continue;
                    }
                }

                match rest.list_devices().await {
                    Ok(records) => {
                        for record in records {
                            let id = DeviceId::from(record.device_id.as_str());
                            match store.merge(&id, &record.state, UpdateSource::Poll) {
                                Ok(()) => {}
                                Err(Error::UnknownDevice(_)) => {
                                    tracing::debug!(
                                        device = %id,
                                        "Poll returned a device outside the fleet, ignoring"
                                    );
                                }
                                Err(err) => {
                                    tracing::warn!(device = %id, error = %err, "Poll merge failed");
                                }
                            }
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "Snapshot poll failed"),
                }
            }
        })
    }

    /// Periodic stream health check: observe every connection, request
    /// a status from the healthy ones, re-dial the unhealthy ones.
    fn spawn_health_timer(
        &self,
        streams: Arc<HashMap<DeviceId, StreamConnection>>,
    ) -> JoinHandle<()> {
        let period = self.config.health_check_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let mut unhealthy = Vec::new();
                for (id, stream) in streams.iter() {
                    let status = stream.status();
                    tracing::info!(
                        device = %id,
                        connected = status.connected,
                        messages = status.messages_received,
                        reconnect_attempts = status.reconnect_attempts,
                        "Stream health"
                    );
                    if status.connected {
                        stream.publish_status_request().await;
                    } else {
                        unhealthy.push((id.clone(), stream.clone()));
                    }
                }

                // Reconnects last so slow dials do not delay the status
                // requests of healthy devices.
                for (id, stream) in unhealthy {
                    if !stream.connect().await {
                        tracing::warn!(device = %id, "Health-check reconnect failed");
                    }
                }
            }
        })
    }
}

impl<P: TokenProvider> std::fmt::Debug for FleetSupervisor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetSupervisor")
            .field("started", &self.runtime.is_some())
            .field(
                "devices",
                &self.runtime.as_ref().map_or(0, |r| r.devices.len()),
            )
            .finish_non_exhaustive()
    }
}
