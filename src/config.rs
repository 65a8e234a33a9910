// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for the REST channel, the stream channel and the fleet.

use std::time::Duration;

/// Configuration for the REST API client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the panel service API, without a trailing slash.
    pub base_url: String,
    /// Bounded timeout applied to every request.
    pub timeout: Duration,
    /// Page size for the paginated devices listing.
    pub page_length: u32,
}

impl ApiConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default devices page size.
    pub const DEFAULT_PAGE_LENGTH: u32 = 50;

    /// Creates an API configuration for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Self::DEFAULT_TIMEOUT,
            page_length: Self::DEFAULT_PAGE_LENGTH,
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the devices page size.
    #[must_use]
    pub fn with_page_length(mut self, page_length: u32) -> Self {
        self.page_length = page_length;
        self
    }
}

/// Transport used by the stream channel.
///
/// Production panels speak MQTT over secure WebSocket. The plain
/// variants exist for local brokers in development and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamTransport {
    /// MQTT over TLS WebSocket (`wss://`).
    #[default]
    SecureWebsocket,
    /// MQTT over plain WebSocket (`ws://`).
    Websocket,
    /// MQTT over plain TCP.
    Tcp,
}

/// Configuration for one device's stream connection.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Broker hostname.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Broker username; the bearer token is presented as the password.
    pub username: String,
    /// Transport variant.
    pub transport: StreamTransport,
    /// MQTT keep-alive interval.
    pub keep_alive: Duration,
    /// How long `connect()` waits for the CONNECTED transition.
    pub connect_timeout: Duration,
    /// Granularity of the CONNECTED poll while connecting.
    pub connect_poll_interval: Duration,
    /// Base delay of the exponential reconnect backoff.
    pub reconnect_base_delay: Duration,
    /// Reconnect attempts before the connection is marked failed.
    pub max_reconnect_attempts: u32,
}

impl StreamConfig {
    /// Default broker host.
    pub const DEFAULT_HOST: &'static str = "mqtt-ws.olarm.com";
    /// Default broker port.
    pub const DEFAULT_PORT: u16 = 443;
    /// Default broker username.
    pub const DEFAULT_USERNAME: &'static str = "native_app";
    /// WebSocket path on the broker.
    pub const WS_PATH: &'static str = "/mqtt";
    /// Default connection-establishment timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
    /// Default reconnect backoff base delay.
    pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_secs(5);
    /// Default reconnect attempt cap.
    pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

    /// Sets the broker host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the broker port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the transport variant.
    #[must_use]
    pub fn with_transport(mut self, transport: StreamTransport) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the connection-establishment timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the reconnect backoff base delay.
    #[must_use]
    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    /// Sets the reconnect attempt cap.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
            username: Self::DEFAULT_USERNAME.to_string(),
            transport: StreamTransport::SecureWebsocket,
            keep_alive: Duration::from_secs(30),
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            connect_poll_interval: Duration::from_millis(250),
            reconnect_base_delay: Self::DEFAULT_RECONNECT_BASE_DELAY,
            max_reconnect_attempts: Self::DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Configuration for the fleet supervisor.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// REST channel configuration.
    pub api: ApiConfig,
    /// Stream channel configuration, shared by every device connection.
    pub stream: StreamConfig,
    /// Interval of the REST snapshot poll.
    pub poll_interval: Duration,
    /// Interval of the stream health check.
    pub health_check_interval: Duration,
    /// Disallows REST fallback for commands when set.
    pub stream_only: bool,
    /// Capacity of the change-notification broadcast channel.
    pub event_capacity: usize,
    /// Capacity of the transport-to-core merge channel.
    pub merge_capacity: usize,
}

impl FleetConfig {
    /// Default REST poll interval.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
    /// Default stream health-check interval.
    pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(300);
    /// Default event channel capacity.
    pub const DEFAULT_EVENT_CAPACITY: usize = 256;
    /// Default merge channel capacity.
    pub const DEFAULT_MERGE_CAPACITY: usize = 64;

    /// Creates a fleet configuration for the given API base URL.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig::new(api_base_url),
            stream: StreamConfig::default(),
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            health_check_interval: Self::DEFAULT_HEALTH_CHECK_INTERVAL,
            stream_only: false,
            event_capacity: Self::DEFAULT_EVENT_CAPACITY,
            merge_capacity: Self::DEFAULT_MERGE_CAPACITY,
        }
    }

    /// Replaces the stream configuration.
    #[must_use]
    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Sets the REST poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the stream health-check interval.
    #[must_use]
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Disallows REST fallback for commands (stream-only deployment).
    #[must_use]
    pub fn stream_only(mut self) -> Self {
        self.stream_only = true;
        self
    }
}
