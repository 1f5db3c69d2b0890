use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use airplay_raop::protocol::rtsp::Method;
use airplay_raop::testing::MockReceiver;
use airplay_raop::{DeviceController, RaopSession, SessionConfig, SessionState};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn controller(receiver: &MockReceiver, teardown_timeout: Duration) -> DeviceController {
    let config = SessionConfig::builder()
        .local_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .teardown_timeout(teardown_timeout)
        .build();
    let session = Arc::new(RaopSession::new(config).unwrap());
    DeviceController::new(session, receiver.ip(), receiver.port()).unwrap()
}

fn wait_for_state(controller: &DeviceController, state: SessionState, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if controller.session().state() == state {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn test_controller_drives_playback_commands() {
    init_tracing();
    let receiver = MockReceiver::start().unwrap();
    let device = controller(&receiver, Duration::from_secs(120));

    device.connect();
    assert!(wait_for_state(&device, SessionState::Flushed, Duration::from_secs(3)));

    assert!(device.session().send_chunk(&[1; 32], 352, false).was_sent());
    assert_eq!(device.session().state(), SessionState::Streaming);

    device.set_volume(250);
    assert!(receiver.wait_for(Method::SetParameter, 2, Duration::from_secs(3)));
    let volume = receiver.last_request(Method::SetParameter).unwrap();
    assert_eq!(volume.body_text(), "volume: 0.0\r\n");

    device.pause();
    assert!(receiver.wait_for(Method::Flush, 1, Duration::from_secs(3)));
    assert!(wait_for_state(&device, SessionState::Flushed, Duration::from_secs(3)));

    device.unpause();
    device.disconnect();
    assert!(wait_for_state(&device, SessionState::DownFull, Duration::from_secs(3)));
    assert!(receiver.wait_for(Method::Teardown, 1, Duration::from_secs(3)));
}

#[test]
fn test_idle_after_flush_disconnects() {
    init_tracing();
    let receiver = MockReceiver::start().unwrap();
    let device = controller(&receiver, Duration::from_millis(200));

    device.connect();
    assert!(wait_for_state(&device, SessionState::Flushed, Duration::from_secs(3)));
    device.session().send_chunk(&[1; 32], 352, false);

    device.stop();
    assert!(receiver.wait_for(Method::Flush, 1, Duration::from_secs(3)));

    // Idle ticks are one second apart
    assert!(wait_for_state(&device, SessionState::DownFull, Duration::from_secs(4)));
    assert!(receiver.last_request(Method::Teardown).is_some());
}

#[test]
fn test_drop_joins_worker_and_disconnects() {
    let receiver = MockReceiver::start().unwrap();
    let device = controller(&receiver, Duration::from_secs(120));
    device.connect();
    assert!(wait_for_state(&device, SessionState::Flushed, Duration::from_secs(3)));

    let session = Arc::clone(device.session());
    drop(device);

    // The worker no longer holds the session
    assert_eq!(Arc::strong_count(&session), 1);
    assert_eq!(session.state(), SessionState::DownFull);
    assert!(receiver.wait_for(Method::Teardown, 1, Duration::from_secs(3)));
}
