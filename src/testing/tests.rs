use std::time::Duration;

use super::{MockReceiver, MockReceiverConfig};
use crate::protocol::rtsp::{Method, RtspClient, RtspRequest};

const TIMEOUT: Duration = Duration::from_secs(2);

fn client(receiver: &MockReceiver) -> RtspClient {
    RtspClient::connect(receiver.addr(), TIMEOUT, "test/1.0").unwrap()
}

#[test]
fn test_mock_receiver_answers_options() {
    let receiver = MockReceiver::start().unwrap();
    let mut client = client(&receiver);

    let response = client.options().unwrap();

    assert!(response.is_success());
    assert!(response.headers.get("Public").unwrap().contains("RECORD"));
    assert_eq!(receiver.methods(), vec![Method::Options]);
    assert_eq!(receiver.connections(), 1);
}

#[test]
fn test_mock_receiver_setup_reports_ports() {
    let receiver = MockReceiver::start().unwrap();
    let mut client = client(&receiver);

    let transport = client.setup(6001, 6002).unwrap();

    assert_ne!(transport.server_port, 0);
    assert_ne!(transport.control_port, transport.timing_port);
    assert_eq!(client.session().session_id(), Some("DEADBEEF"));
}

#[test]
fn test_mock_receiver_omits_configured_port() {
    let receiver = MockReceiver::with_config(MockReceiverConfig {
        omit_port: Some("timing_port"),
        ..MockReceiverConfig::default()
    })
    .unwrap();
    let mut client = client(&receiver);

    let err = client.setup(6001, 6002).unwrap_err();
    assert!(err.to_string().contains("timing_port"), "{err}");
}

#[test]
fn test_mock_receiver_fails_configured_method() {
    let receiver = MockReceiver::with_config(MockReceiverConfig {
        fail_method: Some(Method::Options),
        ..MockReceiverConfig::default()
    })
    .unwrap();
    let mut client = client(&receiver);

    assert!(client.options().is_err());
}

#[test]
fn test_mock_receiver_records_latency_and_bodies() {
    let receiver = MockReceiver::with_config(MockReceiverConfig {
        latency: Some(11025),
        ..MockReceiverConfig::default()
    })
    .unwrap();
    let mut client = client(&receiver);

    assert_eq!(client.record(1, 2).unwrap(), Some(11025));
    client.set_parameter("volume: -15.0").unwrap();

    let request: RtspRequest = receiver.last_request(Method::SetParameter).unwrap();
    assert_eq!(request.body_text(), "volume: -15.0\r\n");
}

#[test]
fn test_retransmit_request_needs_setup() {
    let receiver = MockReceiver::start().unwrap();
    assert!(receiver.request_retransmit(1, 1).is_err());
}
