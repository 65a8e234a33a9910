// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command routing across the two channels.
//!
//! The stream path is always tried first when the connection is
//! nominally healthy; a single failed publish does not mark the
//! connection unhealthy — only the reconnect state machine does that.
//! The same policy applies to every command; there are no per-command
//! variations.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::auth::TokenProvider;
use crate::device::DeviceId;
use crate::error::Error;
use crate::protocol::{RestClient, StreamConnection};
use crate::state::{StateStore, UpdateSource};
use crate::types::PanelCommand;

/// Outcome of one command execution, distinguishing the path taken.
///
/// UI layers use this to tell "handled via backup path" apart from
/// "failed entirely".
#[derive(Debug)]
pub enum CommandOutcome {
    /// Delivered over the live stream.
    Success,
    /// Stream path unavailable or refused; delivered through the REST
    /// API.
    FallbackSuccess,
    /// Stream path failed and REST fallback is disallowed in this
    /// deployment.
    Unavailable,
    /// The REST fallback itself failed.
    ApiError(Error),
}

impl CommandOutcome {
    /// Returns `true` when the command reached the device on either
    /// path.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::FallbackSuccess)
    }
}

/// The dispatcher's view of a device's stream connection.
///
/// [`StreamConnection`] is the production implementation; tests
/// substitute mocks.
pub trait ActionStream: Send + Sync {
    /// Returns `true` while the stream session is up.
    fn is_connected(&self) -> bool;

    /// Publishes a control message, returning whether the publish was
    /// accepted.
    fn publish_action(
        &self,
        action_cmd: &str,
        action_num: usize,
    ) -> impl Future<Output = bool> + Send;
}

impl ActionStream for StreamConnection {
    fn is_connected(&self) -> bool {
        StreamConnection::is_connected(self)
    }

    async fn publish_action(&self, action_cmd: &str, action_num: usize) -> bool {
        StreamConnection::publish_action(self, action_cmd, action_num).await
    }
}

/// Routes user commands to the stream fast path with REST fallback.
#[derive(Debug)]
pub struct CommandDispatcher<P, S = StreamConnection> {
    rest: Arc<RestClient<P>>,
    store: Arc<StateStore>,
    streams: Arc<HashMap<DeviceId, S>>,
    stream_only: bool,
}

impl<P: TokenProvider, S: ActionStream> CommandDispatcher<P, S> {
    /// Creates a dispatcher over the given channels.
    #[must_use]
    pub fn new(
        rest: Arc<RestClient<P>>,
        store: Arc<StateStore>,
        streams: Arc<HashMap<DeviceId, S>>,
        stream_only: bool,
    ) -> Self {
        Self {
            rest,
            store,
            streams,
            stream_only,
        }
    }

    /// Executes one command against one area or output.
    ///
    /// Policy, in order: a connected stream is tried first and a
    /// successful publish ends the command; otherwise the REST API is
    /// used when fallback is permitted, followed by an immediate
    /// refresh poll of the device; in stream-only deployments a failed
    /// or unavailable stream path yields
    /// [`CommandOutcome::Unavailable`] — the command is never silently
    /// dropped.
    pub async fn execute(
        &self,
        device_id: &DeviceId,
        command: PanelCommand,
        num: usize,
    ) -> CommandOutcome {
        if let Some(stream) = self.streams.get(device_id) {
            if stream.is_connected() {
                if let Some(action_cmd) = command.stream_cmd() {
                    if stream.publish_action(action_cmd, num).await {
                        tracing::debug!(
                            device = %device_id,
                            %command,
                            "Command delivered over stream"
                        );
                        return CommandOutcome::Success;
                    }
                    tracing::warn!(
                        device = %device_id,
                        %command,
                        "Stream publish failed, considering fallback"
                    );
                }
            } else {
                tracing::debug!(
                    device = %device_id,
                    %command,
                    "Stream not connected, considering fallback"
                );
            }
        }

        if self.stream_only {
            tracing::warn!(
                device = %device_id,
                %command,
                "Stream path unavailable and fallback disallowed"
            );
            return CommandOutcome::Unavailable;
        }

        match self.rest.send_action(device_id, command.rest_cmd(), num).await {
            Ok(()) => {
                tracing::info!(
                    device = %device_id,
                    %command,
                    "Command delivered over API fallback"
                );
                self.refresh_device(device_id).await;
                CommandOutcome::FallbackSuccess
            }
            Err(err) => {
                tracing::warn!(device = %device_id, %command, error = %err, "API fallback failed");
                CommandOutcome::ApiError(err)
            }
        }
    }

    /// Pulls a fresh snapshot after a fallback command so observers do
    /// not wait for the next scheduled poll.
    async fn refresh_device(&self, device_id: &DeviceId) {
        match self.rest.get_device(device_id).await {
            Ok(record) => {
                if let Err(err) = self.store.merge(device_id, &record.state, UpdateSource::Poll) {
                    tracing::warn!(device = %device_id, error = %err, "Post-command merge failed");
                }
            }
            Err(err) => {
                tracing::warn!(device = %device_id, error = %err, "Post-command refresh failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mock stream recording publish calls.
    struct MockStream {
        connected: bool,
        publish_result: bool,
        publishes: std::sync::atomic::AtomicUsize,
    }

    impl MockStream {
        fn new(connected: bool, publish_result: bool) -> Self {
            Self {
                connected,
                publish_result,
                publishes: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        fn publish_count(&self) -> usize {
            self.publishes.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    impl ActionStream for MockStream {
        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn publish_action(&self, _action_cmd: &str, _action_num: usize) -> bool {
            self.publishes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.publish_result
        }
    }

    fn dispatcher(
        stream: MockStream,
        stream_only: bool,
    ) -> (
        CommandDispatcher<crate::auth::StaticToken, MockStream>,
        Arc<HashMap<DeviceId, MockStream>>,
    ) {
        let tokens = Arc::new(crate::auth::StaticToken::new("key"));
        // Points at an unroutable address; tests relying on REST calls
        // succeeding live in the integration suite.
        let rest = Arc::new(
            RestClient::new(
                &crate::config::ApiConfig::new("http://127.0.0.1:1")
                    .with_timeout(std::time::Duration::from_millis(200)),
                tokens,
            )
            .unwrap(),
        );
        let store = Arc::new(StateStore::new(
            [(DeviceId::from("dev-1"), crate::device::DeviceProfile::default())],
            crate::event::EventBus::new(),
        ));
        let streams: Arc<HashMap<DeviceId, MockStream>> =
            Arc::new([(DeviceId::from("dev-1"), stream)].into_iter().collect());
        (
            CommandDispatcher::new(rest, store, Arc::clone(&streams), stream_only),
            streams,
        )
    }

    #[tokio::test]
    async fn successful_stream_publish_short_circuits() {
        let (dispatcher, streams) = dispatcher(MockStream::new(true, true), false);
        let id = DeviceId::from("dev-1");

        let outcome = dispatcher.execute(&id, PanelCommand::ArmAway, 1).await;

        assert!(matches!(outcome, CommandOutcome::Success));
        assert_eq!(streams.get(&id).unwrap().publish_count(), 1);
    }

    #[tokio::test]
    async fn stream_only_failed_publish_is_unavailable() {
        let (dispatcher, streams) = dispatcher(MockStream::new(true, false), true);
        let id = DeviceId::from("dev-1");

        let outcome = dispatcher.execute(&id, PanelCommand::Disarm, 1).await;

        assert!(matches!(outcome, CommandOutcome::Unavailable));
        assert_eq!(streams.get(&id).unwrap().publish_count(), 1);
    }

    #[tokio::test]
    async fn stream_only_disconnected_is_unavailable_without_publish() {
        let (dispatcher, streams) = dispatcher(MockStream::new(false, true), true);
        let id = DeviceId::from("dev-1");

        let outcome = dispatcher.execute(&id, PanelCommand::ArmNight, 1).await;

        assert!(matches!(outcome, CommandOutcome::Unavailable));
        assert_eq!(streams.get(&id).unwrap().publish_count(), 0);
    }

    #[tokio::test]
    async fn pgm_commands_skip_the_stream_path() {
        // PGM commands have no stream encoding; even on a healthy
        // stream they go straight to fallback handling.
        let (dispatcher, streams) = dispatcher(MockStream::new(true, true), true);
        let id = DeviceId::from("dev-1");

        let outcome = dispatcher.execute(&id, PanelCommand::PgmOpen, 1).await;

        assert!(matches!(outcome, CommandOutcome::Unavailable));
        assert_eq!(streams.get(&id).unwrap().publish_count(), 0);
    }

    #[tokio::test]
    async fn unreachable_api_surfaces_api_error() {
        let (dispatcher, _streams) = dispatcher(MockStream::new(false, false), false);
        let id = DeviceId::from("dev-1");

        let outcome = dispatcher.execute(&id, PanelCommand::Disarm, 1).await;

        assert!(matches!(outcome, CommandOutcome::ApiError(_)));
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn unknown_device_without_fallback_is_unavailable() {
        let (dispatcher, _streams) = dispatcher(MockStream::new(true, true), true);
        let ghost = DeviceId::from("ghost");

        let outcome = dispatcher.execute(&ghost, PanelCommand::ArmHome, 1).await;

        assert!(matches!(outcome, CommandOutcome::Unavailable));
    }
}
