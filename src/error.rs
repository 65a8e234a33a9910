// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `alarmsync` library.
//!
//! This module provides the error hierarchy for failures across the
//! library: stream transport, REST API, payload decoding, and credential
//! handling. Each category has its own propagation policy — transport
//! failures feed the reconnect machinery, API failures surface to the
//! caller untouched, decode failures are logged and discarded, and auth
//! failures trigger a single token refresh before becoming fatal to the
//! operation that hit them.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error on the push-transport channel.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Error from the REST API.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Error while decoding a wire payload.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error obtaining or refreshing the bearer credential.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// The device is not part of the synchronized fleet.
    #[error("unknown device: {0}")]
    UnknownDevice(String),
}

/// Errors on the push-transport (MQTT over WebSocket) channel.
///
/// Transport failures are retried by the per-connection reconnect state
/// machine, capped at its attempt limit. They never abort other devices.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The MQTT client rejected a request.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection establishment timed out.
    #[error("connection timed out after {0} s")]
    Timeout(u64),

    /// The connection is not established.
    #[error("not connected")]
    NotConnected,
}

/// Errors from the REST API.
///
/// The REST client performs no internal retry; callers own the retry
/// policy. The one exception is the auth policy: a rejected credential
/// triggers a token refresh and a single replay of the failed call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, verbatim.
        body: String,
    },

    /// The request failed at the network level.
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The request exceeded the bounded timeout.
    #[error("request timed out after {0} s")]
    Timeout(u64),
}

/// Errors while decoding wire payloads.
///
/// Decode failures on the stream are non-fatal: the payload is discarded
/// with a debug-level note and the session keeps running.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    /// A required field is missing from the payload.
    #[error("missing field in payload: {0}")]
    MissingField(&'static str),
}

/// Errors obtaining or refreshing the bearer credential.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The service rejected the presented credential.
    #[error("token rejected: {0}")]
    Rejected(String),

    /// Refreshing the credential failed.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// No credential is available.
    #[error("no credentials available")]
    MissingCredentials,
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
