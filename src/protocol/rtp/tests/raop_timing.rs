use crate::protocol::rtp::raop_timing::{TimingProbe, TimingReply};
use crate::protocol::rtp::{NtpTimestamp, RtpDecodeError};

fn ntp(seconds: u32, fraction: u32) -> NtpTimestamp {
    NtpTimestamp { seconds, fraction }
}

#[test]
fn test_probe_decode() {
    let probe = TimingProbe::new(0x1234, ntp(100, 0x8000_0000));
    let encoded = probe.encode();

    assert_eq!(encoded.len(), 32);
    assert_eq!(encoded[0..4], [0x80, 0xD2, 0x12, 0x34]);

    let decoded = TimingProbe::decode(&encoded).unwrap();
    assert_eq!(decoded, probe);
}

#[test]
fn test_reply_echoes_send_time() {
    let mut encoded = TimingProbe::new(7, ntp(100, 42)).encode();
    // Garbage in the padding must not leak into the reply
    encoded[4..8].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

    let probe = TimingProbe::decode(&encoded).unwrap();
    let now = ntp(200, 0x4000_0000);
    let reply = probe.reply(now).encode();

    assert_eq!(reply[0..4], [0x80, 0xD3, 0x00, 0x07]);
    assert_eq!(reply[4..8], [0, 0, 0, 0]);
    assert_eq!(reply[8..16], ntp(100, 42).encode());
    assert_eq!(reply[16..24], now.encode());
    assert_eq!(reply[24..32], now.encode());
}

#[test]
fn test_probe_rejects_short_packet() {
    let result = TimingProbe::decode(&[0x80, 0xD2, 0x00, 0x07]);
    assert_eq!(
        result,
        Err(RtpDecodeError::BufferTooSmall {
            needed: 32,
            have: 4
        })
    );
}

#[test]
fn test_probe_rejects_other_payload_types() {
    let mut encoded = TimingProbe::new(1, ntp(1, 1)).encode();
    encoded[1] = 0xD4;

    assert_eq!(
        TimingProbe::decode(&encoded),
        Err(RtpDecodeError::UnexpectedPayloadType(0x54))
    );
}

#[test]
fn test_reply_round_trip_estimate() {
    let reply = TimingReply {
        header: [0x80, 0xD3, 0, 7],
        reference_time: ntp(100, 0),
        receive_time: ntp(105, 0),
        send_time: ntp(105, 0),
    };

    // 2 seconds on the receiver's clock with zero processing time
    let rtt = reply.round_trip_micros(ntp(102, 0));
    assert_eq!(rtt, 2_000_000);

    let decoded = TimingReply::decode(&reply.encode()).unwrap();
    assert_eq!(decoded, reply);
}
