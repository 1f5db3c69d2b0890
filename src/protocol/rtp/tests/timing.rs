use std::time::Duration;

use crate::protocol::rtp::NtpTimestamp;

#[test]
fn test_ntp_from_unix_epoch() {
    let ts = NtpTimestamp::from_unix(Duration::ZERO);

    assert_eq!(ts.seconds, 0x83AA_7E80);
    assert_eq!(ts.fraction, 0);
}

#[test]
fn test_ntp_fraction_half_second() {
    let ts = NtpTimestamp::from_unix(Duration::from_millis(1500));

    assert_eq!(ts.seconds, 0x83AA_7E81);
    assert_eq!(ts.fraction, 0x8000_0000);
}

#[test]
fn test_ntp_timestamp_encode_decode() {
    let ts = NtpTimestamp {
        seconds: 1_234_567_890,
        fraction: 0x8000_0000,
    };

    let decoded = NtpTimestamp::decode(&ts.encode()).unwrap();
    assert_eq!(decoded, ts);
    assert_eq!(NtpTimestamp::decode(&[0u8; 7]), None);
}

#[test]
fn test_ntp_timestamp_now() {
    let ts = NtpTimestamp::now();

    // Should be somewhere reasonable (after 2020)
    assert!(ts.seconds > 3_786_825_600);
}

#[test]
fn test_ntp_to_micros() {
    let ts = NtpTimestamp {
        seconds: 2,
        fraction: 0x4000_0000,
    };
    assert_eq!(ts.to_micros(), 2_250_000);
}
