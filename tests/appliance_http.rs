mod common;

use std::sync::Arc;
use std::time::Duration;

use acmeter::billing::Tariff;
use acmeter::config::ApplianceConfig;
use acmeter::device::{Appliance, DeviceError, HttpAppliance, TemperatureProbe};
use acmeter::display::OutputSerializer;
use acmeter::state::SharedState;
use common::mock_server::{MockResponse, MockServer};
use common::{CountingSink, TICK};

fn config(server: &MockServer) -> ApplianceConfig {
    ApplianceConfig {
        base_url: server.base_url(),
        request_timeout_secs: 1,
        ..ApplianceConfig::default()
    }
}

#[tokio::test]
async fn power_on_sends_control_info() {
    let server = MockServer::start().await;
    let appliance = HttpAppliance::new(&config(&server)).unwrap();

    appliance.power_on().await.unwrap();

    let requests = server.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/aircon/set_control_info");
    assert_eq!(
        requests[0].query.as_deref(),
        Some("pow=1&mode=7&stemp=25&shum=0&f_rate=A&f_dir=0")
    );
}

#[tokio::test]
async fn power_off_sends_pow_zero() {
    let server = MockServer::start().await;
    let appliance = HttpAppliance::new(&config(&server)).unwrap();

    appliance.power_off().await.unwrap();

    let requests = server.requests().await;
    let query = requests[0].query.as_deref().unwrap();
    assert!(query.starts_with("pow=0&"));
}

#[tokio::test]
async fn rejected_command_is_an_error() {
    let server = MockServer::start().await;
    server.enqueue(MockResponse::text("ret=PARAM NG")).await;
    let appliance = HttpAppliance::new(&config(&server)).unwrap();

    let err = appliance.power_on().await.unwrap_err();
    assert!(matches!(err, DeviceError::Rejected(ref body) if body == "ret=PARAM NG"));
}

#[tokio::test]
async fn slow_appliance_times_out() {
    let server = MockServer::start().await;
    server
        .enqueue(MockResponse::text("ret=OK").with_delay(1_500))
        .await;
    let appliance = HttpAppliance::new(&config(&server)).unwrap();

    let err = appliance.power_off().await.unwrap_err();
    assert!(matches!(err, DeviceError::Timeout(_)));
}

#[tokio::test]
async fn unreachable_appliance_is_a_request_error() {
    let appliance = HttpAppliance::new(&ApplianceConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        request_timeout_secs: 2,
        ..ApplianceConfig::default()
    })
    .unwrap();

    let err = appliance.power_on().await.unwrap_err();
    assert!(matches!(
        err,
        DeviceError::Request { .. } | DeviceError::Timeout(_)
    ));
}

#[tokio::test]
async fn disabled_appliance_sends_nothing() {
    let server = MockServer::start().await;
    let appliance = HttpAppliance::new(&ApplianceConfig {
        enabled: false,
        ..config(&server)
    })
    .unwrap();

    appliance.power_on().await.unwrap();
    appliance.power_off().await.unwrap();

    assert!(server.requests().await.is_empty());
}

#[tokio::test]
async fn reads_room_temperature() {
    let server = MockServer::start().await;
    server
        .enqueue(MockResponse::text("ret=OK,htemp=24.5,hhum=-,otemp=18.0,err=0,cmpfreq=0"))
        .await;
    let appliance = HttpAppliance::new(&config(&server)).unwrap();

    let celsius = appliance.read_temperature().await.unwrap();
    assert_eq!(celsius, 24.5);

    let requests = server.requests().await;
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/aircon/get_sensor_info");
}

#[tokio::test]
async fn probe_refreshes_only_on_change() {
    let server = MockServer::start().await;
    for body in [
        "ret=OK,htemp=22.0",
        "ret=OK,htemp=22.0",
        "ret=OK,htemp=-",
        "ret=OK,htemp=23.5",
    ] {
        server.enqueue(MockResponse::text(body)).await;
    }

    let appliance: Arc<dyn Appliance> = Arc::new(HttpAppliance::new(&config(&server)).unwrap());
    let shared = SharedState::new();
    let sink = CountingSink::new();
    let display = OutputSerializer::new(sink.clone(), shared.clone(), Tariff::new(1, TICK));
    let probe = TemperatureProbe::new(
        appliance,
        shared.temperature_writer(),
        display.clone(),
        Duration::from_secs(60),
    );

    assert!(probe.measure().await);
    assert_eq!(shared.snapshot().temperature, Some(22.0));

    assert!(!probe.measure().await);

    // A failed read clears the value.
    assert!(probe.measure().await);
    assert_eq!(shared.snapshot().temperature, None);

    assert!(probe.measure().await);
    assert_eq!(shared.snapshot().temperature, Some(23.5));

    display.idle().await;
    assert!(sink.count() >= 1);
}

#[tokio::test]
async fn probe_stops_writing_after_close() {
    let server = MockServer::start().await;
    server.enqueue(MockResponse::text("ret=OK,htemp=21.0")).await;

    let appliance: Arc<dyn Appliance> = Arc::new(HttpAppliance::new(&config(&server)).unwrap());
    let shared = SharedState::new();
    let display = OutputSerializer::new(CountingSink::new(), shared.clone(), Tariff::new(1, TICK));
    let probe = TemperatureProbe::new(
        appliance,
        shared.temperature_writer(),
        display.clone(),
        Duration::from_secs(60),
    );

    display.close();
    assert!(!probe.measure().await);
    assert_eq!(shared.snapshot().temperature, None);
}
