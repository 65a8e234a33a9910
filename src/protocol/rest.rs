// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! REST API client for the panel service.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::auth::TokenProvider;
use crate::config::ApiConfig;
use crate::device::{Device, DeviceId, DeviceProfile};
use crate::error::{ApiError, DecodeError, Error};
use crate::payload::RawPanelState;

/// One device as returned by the devices endpoint.
///
/// Carries identity, the profile fixing area/zone/PGM cardinality, and
/// the raw state snapshot merged into the store as a poll result.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRecord {
    /// Service-assigned device id.
    #[serde(rename = "deviceId")]
    pub device_id: String,

    /// Display name.
    #[serde(rename = "deviceName", default)]
    pub name: String,

    /// Transport address used in stream topics.
    #[serde(rename = "deviceImei", alias = "IMEI", alias = "imei", default)]
    pub imei: String,

    /// Panel profile.
    #[serde(rename = "deviceProfile", default)]
    pub profile: DeviceProfile,

    /// Raw state snapshot at the time of the request.
    #[serde(rename = "deviceState", default)]
    pub state: RawPanelState,
}

impl DeviceRecord {
    /// Extracts the immutable device identity.
    #[must_use]
    pub fn identity(&self) -> Device {
        Device::new(self.device_id.as_str(), &self.imei, &self.name)
    }
}

#[derive(Debug, Deserialize)]
struct DevicesPage {
    #[serde(default)]
    data: Vec<DeviceRecord>,
}

enum Method {
    Get,
    Post,
}

/// Stateless HTTP wrapper for the panel service API.
///
/// Every call presents the current bearer token and applies the
/// configured bounded timeout. The client performs no internal retry —
/// callers own their retry policy — with one exception: a 401 triggers
/// [`TokenProvider::refresh`] and a single replay of the failed call.
#[derive(Debug)]
pub struct RestClient<P> {
    http: reqwest::Client,
    base_url: String,
    page_length: u32,
    timeout_secs: u64,
    tokens: Arc<P>,
}

impl<P: TokenProvider> RestClient<P> {
    /// Creates a client for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, tokens: Arc<P>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_length: config.page_length,
            timeout_secs: config.timeout.as_secs(),
            tokens,
        })
    }

    /// Lists all devices, walking every page of the devices endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] on non-success responses or network
    /// failures, [`Error::Auth`] when the token cannot be refreshed.
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>, Error> {
        let mut records = Vec::new();
        let mut page = 1u32;
        loop {
            let query = [
                ("page", page.to_string()),
                ("pageLength", self.page_length.to_string()),
            ];
            let batch: DevicesPage = self
                .request(Method::Get, "/devices", Some(&query), None)
                .await?;

            let count = batch.data.len();
            records.extend(batch.data);
            if count < self.page_length as usize {
                break;
            }
            page += 1;
        }

        tracing::debug!(devices = records.len(), "Listed devices");
        Ok(records)
    }

    /// Fetches a single device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] on non-success responses or network
    /// failures.
    pub async fn get_device(&self, device_id: &DeviceId) -> Result<DeviceRecord, Error> {
        let path = format!("/devices/{device_id}");
        self.request(Method::Get, &path, None, None).await
    }

    /// Sends an action to a device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] on non-success responses or network
    /// failures.
    pub async fn send_action(
        &self,
        device_id: &DeviceId,
        action_cmd: &str,
        action_num: usize,
    ) -> Result<(), Error> {
        let path = format!("/devices/{device_id}/actions");
        let body = json!({
            "actionCmd": action_cmd,
            "actionNum": action_num,
        });

        tracing::debug!(device = %device_id, cmd = action_cmd, num = action_num, "Sending API action");

        let _response: serde_json::Value = self
            .request(Method::Post, &path, None, Some(&body))
            .await?;
        Ok(())
    }

    /// Performs one request, replaying it once after a token refresh on
    /// a 401.
    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&serde_json::Value>,
    ) -> Result<T, Error> {
        let token = self.tokens.access_token().await.map_err(Error::Auth)?;
        match self.perform(&method, path, query, body, &token).await {
            Err(Error::Api(ApiError::Status { status: 401, .. })) => {
                tracing::debug!(path, "Token rejected, refreshing and replaying once");
                let token = self.tokens.refresh().await.map_err(Error::Auth)?;
                self.perform(&method, path, query, body, &token).await
            }
            other => other,
        }
    }

    async fn perform<T: serde::de::DeserializeOwned>(
        &self,
        method: &Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&serde_json::Value>,
        token: &str,
    ) -> Result<T, Error> {
        let url = format!("{}{path}", self.base_url);

        let mut request = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };
        request = request.bearer_auth(token);
        if let Some(query) = query {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                Error::Api(ApiError::Timeout(self.timeout_secs))
            } else {
                Error::Api(ApiError::Network(err))
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(ApiError::Network)?;

        if !status.is_success() {
            tracing::warn!(url, status = status.as_u16(), "API request failed");
            return Err(Error::Api(ApiError::Status {
                status: status.as_u16(),
                body: text,
            }));
        }

        serde_json::from_str(&text).map_err(|err| Error::Decode(DecodeError::Json(err)))
    }
}
