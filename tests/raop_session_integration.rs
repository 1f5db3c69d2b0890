use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use airplay_raop::protocol::daap::DmapProgress;
use airplay_raop::protocol::rtp::{
    NtpTimestamp, RETRANSMIT_HEADER, RaopAudioPacket, SyncPacket, TimingReply,
};
use airplay_raop::protocol::rtsp::Method;
use airplay_raop::protocol::sdp::SdpParser;
use airplay_raop::raop::wrapping_before;
use airplay_raop::testing::{MockReceiver, MockReceiverConfig};
use airplay_raop::{
    CryptoMode, FlushMode, RaopError, RaopSession, SessionConfig, SessionState, TrackMetadata,
};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config() -> SessionConfig {
    SessionConfig::builder()
        .local_addr(LOCALHOST)
        .rtsp_timeout(Duration::from_secs(2))
        .build()
}

fn connected(receiver: &MockReceiver) -> RaopSession {
    let session = RaopSession::new(config()).unwrap();
    session.connect(receiver.ip(), receiver.port()).unwrap();
    session
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

fn next_audio(receiver: &MockReceiver) -> RaopAudioPacket {
    RaopAudioPacket::decode(&receiver.recv_audio().expect("no audio packet")).unwrap()
}

#[test]
fn test_connect_runs_handshake_and_reaches_flushed() {
    init_tracing();
    let receiver = MockReceiver::with_config(MockReceiverConfig {
        latency: Some(11025),
        ..MockReceiverConfig::default()
    })
    .unwrap();
    let session = connected(&receiver);

    assert_eq!(session.state(), SessionState::Flushed);
    assert_eq!(session.latency(), 11025);
    assert_eq!(
        receiver.methods(),
        vec![
            Method::Options,
            Method::Announce,
            Method::Setup,
            Method::Record,
            Method::SetParameter,
        ]
    );

    let announce = receiver.last_request(Method::Announce).unwrap();
    assert!(announce.headers.get("Apple-Challenge").is_some());
    let sdp = SdpParser::parse(&announce.body_text()).unwrap();
    assert_eq!(sdp.fmtp(), Some("96 352 0 16 40 10 14 2 255 0 0 44100"));
    assert!(sdp.rsaaeskey().is_none());

    let record = receiver.last_request(Method::Record).unwrap();
    let rtp_info = record.headers.get("RTP-Info").unwrap();
    assert!(rtp_info.starts_with("seq="), "{rtp_info}");
    assert!(record.headers.get("Session").is_some());

    let volume = receiver.last_request(Method::SetParameter).unwrap();
    assert_eq!(volume.body_text(), "volume: -15.0\r\n");
}

#[test]
fn test_connect_twice_is_a_no_op() {
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);

    session.connect(receiver.ip(), receiver.port()).unwrap();

    assert_eq!(receiver.methods().len(), 5);
    assert_eq!(receiver.connections(), 1);
}

#[test]
fn test_first_chunk_streams_with_marker_and_sync() {
    init_tracing();
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);

    let chunk = session.send_chunk(&[0x11; 64], 352, false);
    assert!(chunk.was_sent());
    assert_eq!(session.state(), SessionState::Streaming);

    let packet = next_audio(&receiver);
    assert!(packet.marker);
    assert_eq!(Some(packet.sequence), chunk.sequence);
    assert_eq!(&packet.payload[..], &[0x11; 64]);

    let sync = SyncPacket::decode(&receiver.recv_control().unwrap()).unwrap();
    assert!(sync.extension);

    let second = session.send_chunk(&[0x22; 64], 352, false);
    let packet = next_audio(&receiver);
    assert!(!packet.marker);
    assert_eq!(Some(packet.sequence), second.sequence);
    assert_eq!(packet.timestamp, chunk.timestamp.wrapping_add(352));
    assert_eq!(session.sanity(), 0);
}

#[test]
fn test_flush_then_resume_continues_sequence_and_timeline() {
    init_tracing();
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);

    let mut last = None;
    for _ in 0..3 {
        last = Some(session.send_chunk(&[1; 32], 352, false));
    }
    let last = last.unwrap();
    let before = session.position();

    session.flush_stream(FlushMode::Reclock).unwrap();
    assert_eq!(session.state(), SessionState::Flushed);

    let flush = receiver.last_request(Method::Flush).unwrap();
    let expected = format!(
        "seq={};rtptime={}",
        last.sequence.unwrap().wrapping_add(1),
        before.wrapping_add(1)
    );
    assert_eq!(flush.headers.get("RTP-Info"), Some(expected.as_str()));

    let resumed = session.send_chunk(&[2; 32], 352, false);
    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(
        resumed.sequence,
        Some(last.sequence.unwrap().wrapping_add(1))
    );
    assert!(!wrapping_before(resumed.timestamp, before));

    // Three packets before the flush, then the marked one after it
    for _ in 0..3 {
        next_audio(&receiver);
    }
    assert!(next_audio(&receiver).marker);
}

#[test]
fn test_rebuffer_keeps_timestamps_moving_forward() {
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);

    let first = session.send_chunk(&[1; 32], 352, false);
    session.flush_stream(FlushMode::Rebuffer).unwrap();
    let after = session.send_chunk(&[1; 32], 352, false);

    assert!(wrapping_before(first.timestamp, after.timestamp));
}

#[test]
fn test_flush_requires_streaming() {
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);

    let err = session.flush_stream(FlushMode::Reclock).unwrap_err();
    assert!(matches!(err, RaopError::InvalidState { .. }), "{err}");
    assert!(receiver.last_request(Method::Flush).is_none());
    assert_eq!(session.state(), SessionState::Flushed);
}

#[test]
fn test_volume_is_cached_unless_forced() {
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);
    let initial = receiver.requests().len();

    session.update_volume(50, false).unwrap();
    assert_eq!(receiver.requests().len(), initial);

    session.update_volume(0, false).unwrap();
    let request = receiver.last_request(Method::SetParameter).unwrap();
    assert_eq!(request.body_text(), "volume: -144.0\r\n");

    session.update_volume(0, true).unwrap();
    assert_eq!(receiver.requests().len(), initial + 2);

    session.update_volume(200, false).unwrap();
    assert_eq!(session.volume(), 100);
    let request = receiver.last_request(Method::SetParameter).unwrap();
    assert_eq!(request.body_text(), "volume: 0.0\r\n");
}

#[test]
fn test_volume_before_connect_is_rejected() {
    let session = RaopSession::new(config()).unwrap();
    assert!(matches!(
        session.update_volume(10, true),
        Err(RaopError::InvalidState { .. })
    ));
}

#[test]
fn test_metadata_carries_dmap_and_rtptime() {
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);
    session.send_chunk(&[1; 32], 352, false);

    let track = TrackMetadata::new("Song", "Artist", "Album");
    session.set_metadata(&track).unwrap();

    let request = receiver.last_request(Method::SetParameter).unwrap();
    assert_eq!(
        request.headers.get("Content-Type"),
        Some("application/x-dmap-tagged")
    );
    let expected = format!("rtptime={}", session.position());
    assert_eq!(request.headers.get("RTP-Info"), Some(expected.as_str()));
    assert_eq!(TrackMetadata::from_dmap(&request.body), Some(track));
}

#[test]
fn test_open_ended_progress() {
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);

    session.set_progress(0, 0).unwrap();

    let request = receiver.last_request(Method::SetParameter).unwrap();
    let progress = DmapProgress::parse(&request.body_text()).unwrap();
    assert_eq!(progress.current, session.position());
    assert_eq!(progress.end, progress.current.wrapping_add(3599 * 44100));
}

#[test]
fn test_missing_transport_port_fails_connect() {
    init_tracing();
    let receiver = MockReceiver::with_config(MockReceiverConfig {
        omit_port: Some("control_port"),
        ..MockReceiverConfig::default()
    })
    .unwrap();
    let session = RaopSession::new(config()).unwrap();

    let err = session.connect(receiver.ip(), receiver.port()).unwrap_err();

    assert!(matches!(err, RaopError::MissingTransportPort("control_port")), "{err}");
    assert!(err.is_handshake_failure());
    assert_eq!(session.state(), SessionState::DownFull);
    assert!(!receiver.methods().contains(&Method::Record));
    assert!(!session.send_chunk(&[1; 32], 352, false).was_sent());
}

#[test]
fn test_rejected_announce_fails_connect() {
    let receiver = MockReceiver::with_config(MockReceiverConfig {
        fail_method: Some(Method::Announce),
        ..MockReceiverConfig::default()
    })
    .unwrap();
    let session = RaopSession::new(config()).unwrap();

    let err = session.connect(receiver.ip(), receiver.port()).unwrap_err();

    assert!(matches!(
        err,
        RaopError::RtspStatus {
            method: Method::Announce,
            status_code: 500,
            ..
        }
    ));
    assert_eq!(session.state(), SessionState::DownFull);
}

#[test]
fn test_timing_probe_is_answered() {
    let receiver = MockReceiver::start().unwrap();
    let _session = connected(&receiver);

    let sent = NtpTimestamp {
        seconds: 0xE000_0000,
        fraction: 0x1234_5678,
    };
    receiver.send_timing_probe(7, sent).unwrap();

    let reply = TimingReply::decode(&receiver.recv_timing().unwrap()).unwrap();
    assert_eq!(reply.header[1], 0xD3);
    assert_eq!(&reply.header[2..4], &7u16.to_be_bytes());
    assert_eq!(reply.reference_time, sent);
    assert_eq!(reply.receive_time, reply.send_time);
}

#[test]
fn test_retransmit_request_is_served_from_backlog() {
    init_tracing();
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);

    let first = session.send_chunk(&[0xA0; 16], 352, false).sequence.unwrap();
    session.send_chunk(&[0xA1; 16], 352, false);
    session.send_chunk(&[0xA2; 16], 352, false);
    let originals: Vec<Vec<u8>> = (0..3).map(|_| receiver.recv_audio().unwrap()).collect();

    receiver.request_retransmit(first, 3).unwrap();

    // Sync packets share the control port
    let mut resent = Vec::new();
    assert!(wait_until(|| {
        if let Some(datagram) = receiver.recv_control() {
            if datagram[..4] == RETRANSMIT_HEADER {
                resent.push(datagram[4..].to_vec());
            }
        }
        resent.len() == 3
    }));
    assert_eq!(resent, originals);
    assert_eq!(session.sanity(), 0);
}

#[test]
fn test_encrypted_retransmit_matches_original_datagram() {
    init_tracing();
    let receiver = MockReceiver::start().unwrap();
    let config = SessionConfig::builder()
        .local_addr(LOCALHOST)
        .rtsp_timeout(Duration::from_secs(2))
        .crypto(CryptoMode::Rsa)
        .build();
    let session = RaopSession::new(config).unwrap();
    session.connect(receiver.ip(), receiver.port()).unwrap();

    // Two full blocks plus a 5-byte tail
    let frames: Vec<Vec<u8>> = (0..3u8).map(|i| vec![0xB0 + i; 37]).collect();
    let first = session.send_chunk(&frames[0], 352, false).sequence.unwrap();
    session.send_chunk(&frames[1], 352, false);
    session.send_chunk(&frames[2], 352, false);
    let originals: Vec<Vec<u8>> = (0..3).map(|_| receiver.recv_audio().unwrap()).collect();

    for (original, frame) in originals.iter().zip(&frames) {
        let packet = RaopAudioPacket::decode(original).unwrap();
        assert_ne!(&packet.payload[..32], &frame[..32]);
        assert_eq!(&packet.payload[32..], &frame[32..]);
    }

    receiver.request_retransmit(first, 3).unwrap();

    let mut resent = Vec::new();
    assert!(wait_until(|| {
        if let Some(datagram) = receiver.recv_control() {
            if datagram[..4] == RETRANSMIT_HEADER {
                resent.push(datagram[4..].to_vec());
            }
        }
        resent.len() == 3
    }));
    assert_eq!(resent, originals);
    assert_eq!(session.sanity(), 0);
}

#[test]
fn test_teardown_keeps_rtsp_connection() {
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);
    session.send_chunk(&[1; 16], 352, false);

    session.teardown().unwrap();
    assert_eq!(session.state(), SessionState::Down);
    assert!(receiver.last_request(Method::Teardown).is_some());
    assert!(!session.send_chunk(&[1; 16], 352, false).was_sent());

    session.reconnect().unwrap();
    assert_eq!(session.state(), SessionState::Flushed);
    assert_eq!(receiver.connections(), 1);
    let options = receiver
        .methods()
        .into_iter()
        .filter(|m| *m == Method::Options)
        .count();
    assert_eq!(options, 1);
}

#[test]
fn test_teardown_requires_connection() {
    let session = RaopSession::new(config()).unwrap();
    assert!(matches!(
        session.teardown(),
        Err(RaopError::InvalidState { .. })
    ));
}

#[test]
fn test_disconnect_then_connect_opens_fresh_connection() {
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);

    session.disconnect().unwrap();
    assert_eq!(session.state(), SessionState::DownFull);
    assert!(receiver.last_request(Method::Teardown).is_some());

    session.connect(receiver.ip(), receiver.port()).unwrap();
    assert!(wait_until(|| receiver.connections() == 2));
    assert_eq!(session.state(), SessionState::Flushed);
}

#[test]
fn test_peer_close_is_detected_and_repaired() {
    init_tracing();
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);
    assert!(session.is_sane());

    receiver.close_connection();
    assert!(wait_until(|| !session.is_sane()));
    assert_eq!(session.state(), SessionState::PeerDisconnect);

    session.repair().unwrap();
    assert_eq!(session.state(), SessionState::Flushed);
    assert_eq!(receiver.connections(), 2);
    assert!(session.is_sane());
}

#[test]
fn test_destroy_sends_no_teardown() {
    let receiver = MockReceiver::start().unwrap();
    let session = connected(&receiver);

    session.destroy();

    std::thread::sleep(Duration::from_millis(50));
    assert!(receiver.last_request(Method::Teardown).is_none());
}

#[test]
fn test_rsa_session_announces_keys_and_encrypts_payload() {
    init_tracing();
    let receiver = MockReceiver::start().unwrap();
    let config = SessionConfig::builder()
        .local_addr(LOCALHOST)
        .crypto(CryptoMode::Rsa)
        .build();
    let session = RaopSession::new(config).unwrap();
    session.connect(receiver.ip(), receiver.port()).unwrap();

    let announce = receiver.last_request(Method::Announce).unwrap();
    let sdp = SdpParser::parse(&announce.body_text()).unwrap();
    assert!(sdp.rsaaeskey().is_some());
    assert!(sdp.aesiv().is_some());

    // One full AES block plus a partial one
    let frame = [0x5A; 20];
    session.send_chunk(&frame, 352, false);
    let packet = next_audio(&receiver);

    assert_eq!(packet.payload.len(), 20);
    assert_ne!(&packet.payload[..16], &frame[..16]);
    assert_eq!(&packet.payload[16..], &frame[16..]);
}

#[test]
fn test_unsupported_codec_rejected_at_construction() {
    let config = SessionConfig::builder()
        .codec(airplay_raop::Codec::AacEld)
        .build();
    assert!(matches!(
        RaopSession::new(config),
        Err(RaopError::UnsupportedCodec(_))
    ));
}
