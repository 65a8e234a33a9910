// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end tests for the fleet supervisor and command dispatch,
//! driving the REST channel with wiremock. The stream broker is
//! unreachable in these tests; the fleet must come up anyway and route
//! commands per the fallback policy.

use std::time::Duration;

use alarmsync::{
    ArmState, CommandOutcome, DeviceId, FleetConfig, FleetSupervisor, PanelCommand, StaticToken,
    StreamConfig, StreamTransport, UpdateSource, ZoneActivity,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn devices_body() -> serde_json::Value {
    serde_json::json!({
        "data": [
            {
                "deviceId": "dev-1",
                "deviceName": "Warehouse",
                "deviceImei": "860000000000001",
                "deviceProfile": {
                    "areasLimit": 2,
                    "areasLabels": ["House", "Garage"],
                    "zonesLimit": 2,
                    "pgmLimit": 1,
                    "pgmControl": ["11"]
                },
                "deviceState": {
                    "areas": ["disarm", "disarm"],
                    "zones": ["c", "a"],
                    "pgm": ["c"],
                    "power": {"AC": "1", "Batt": "1"}
                }
            },
            {
                "deviceId": "dev-2",
                "deviceName": "Office",
                "deviceImei": "860000000000002",
                "deviceProfile": {"areasLimit": 1, "zonesLimit": 1},
                "deviceState": {"areas": ["stay"], "zones": ["c"]}
            }
        ]
    })
}

/// Stream config pointing at a dead endpoint: connects fail fast, the
/// fleet must treat that as an isolated, non-fatal condition.
fn dead_stream() -> StreamConfig {
    StreamConfig::default()
        .with_host("127.0.0.1")
        .with_port(1)
        .with_transport(StreamTransport::Tcp)
        .with_connect_timeout(Duration::from_millis(500))
}

fn fleet_for(server: &MockServer, stream_only: bool) -> FleetSupervisor<StaticToken> {
    let mut config = FleetConfig::new(server.uri())
        .with_stream(dead_stream())
        // Keep the timers from interfering with request expectations.
        .with_poll_interval(Duration::from_secs(3600))
        .with_health_check_interval(Duration::from_secs(3600));
    if stream_only {
        config = config.stream_only();
    }
    FleetSupervisor::new(config, StaticToken::new("test-token")).unwrap()
}

#[tokio::test]
async fn start_seeds_the_store_despite_dead_streams() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;

    let mut fleet = fleet_for(&server, false);
    fleet.start().await.unwrap();
    assert!(fleet.is_started());
    assert_eq!(fleet.devices().len(), 2);

    let store = fleet.store().unwrap();
    let state = store.get(&DeviceId::from("dev-1")).unwrap();
    assert_eq!(state.area(1).unwrap().arm_state, ArmState::Disarmed);
    assert_eq!(state.area(1).unwrap().name, "House");
    assert_eq!(state.zone(2).unwrap().activity, ZoneActivity::Active);
    assert!(state.pgm(1).unwrap().closed);
    assert!(state.power.ac_ok);
    assert_eq!(state.source, Some(UpdateSource::Poll));

    let other = store.get(&DeviceId::from("dev-2")).unwrap();
    assert_eq!(other.area(1).unwrap().arm_state, ArmState::ArmedHome);

    // The streams never came up.
    let status = fleet.stream_status(&DeviceId::from("dev-1")).unwrap();
    assert!(!status.connected);

    fleet.shutdown().await;
    assert!(!fleet.is_started());
}

#[tokio::test]
async fn command_falls_back_to_api_and_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/devices/dev-1/actions"))
        .and(body_json(serde_json::json!({
            "actionCmd": "area-arm",
            "actionNum": 1
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"actionStatus": "OK"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    // The post-command refresh poll reports the area armed.
    Mock::given(method("GET"))
        .and(path("/devices/dev-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "deviceId": "dev-1",
            "deviceProfile": {
                "areasLimit": 2,
                "areasLabels": ["House", "Garage"],
                "zonesLimit": 2,
                "pgmLimit": 1
            },
            "deviceState": {
                "areas": ["arm", "disarm"],
                "zones": ["c", "a"],
                "pgm": ["c"],
                "power": {"AC": "1", "Batt": "1"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut fleet = fleet_for(&server, false);
    fleet.start().await.unwrap();

    let id = DeviceId::from("dev-1");
    let outcome = fleet.execute(&id, PanelCommand::ArmAway, 1).await;
    assert!(matches!(outcome, CommandOutcome::FallbackSuccess));

    // The refresh merged the armed state.
    let state = fleet.store().unwrap().get(&id).unwrap();
    assert_eq!(state.area(1).unwrap().arm_state, ArmState::ArmedAway);
    assert_eq!(state.area(2).unwrap().arm_state, ArmState::Disarmed);

    fleet.shutdown().await;
}

#[tokio::test]
async fn stream_only_mode_never_touches_the_actions_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    // The fallback path must stay cold.
    Mock::given(method("POST"))
        .and(path("/devices/dev-1/actions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut fleet = fleet_for(&server, true);
    fleet.start().await.unwrap();

    let outcome = fleet
        .execute(&DeviceId::from("dev-1"), PanelCommand::Disarm, 1)
        .await;
    assert!(matches!(outcome, CommandOutcome::Unavailable));

    fleet.shutdown().await;
}

#[tokio::test]
async fn api_failure_on_fallback_surfaces_to_the_caller() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/devices/dev-2/actions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let mut fleet = fleet_for(&server, false);
    fleet.start().await.unwrap();

    let outcome = fleet
        .execute(&DeviceId::from("dev-2"), PanelCommand::ArmHome, 1)
        .await;
    assert!(matches!(outcome, CommandOutcome::ApiError(_)));
    assert!(!outcome.is_success());

    fleet.shutdown().await;
}

#[tokio::test]
async fn discovery_failure_fails_start() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&server)
        .await;

    let mut fleet = fleet_for(&server, false);
    assert!(fleet.start().await.is_err());
    assert!(!fleet.is_started());
}
