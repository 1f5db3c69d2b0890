use crate::error::RaopError;
use crate::protocol::crypto::RaopSessionKeys;
use crate::protocol::sdp::{AlacFmtp, SdpParser, create_raop_announce_sdp};
use crate::types::{Codec, CryptoMode, StreamParameters};

#[test]
fn test_clear_announce_matches_template() {
    let params = StreamParameters::default();

    let sdp = create_raop_announce_sdp(&params, "3413821438", "192.168.1.10", "192.168.1.20", None)
        .unwrap();

    assert_eq!(
        sdp,
        "v=0\r\n\
o=iTunes 3413821438 0 IN IP4 192.168.1.10\r\n\
s=iTunes\r\n\
c=IN IP4 192.168.1.20\r\n\
t=0 0\r\n\
m=audio 0 RTP/AVP 96\r\n\
a=rtpmap:96 AppleLossless\r\n\
a=fmtp:96 352 0 16 40 10 14 2 255 0 0 44100\r\n"
    );
}

#[test]
fn test_rsa_announce_carries_keys() {
    let params = StreamParameters {
        crypto: CryptoMode::Rsa,
        ..StreamParameters::default()
    };
    let keys = RaopSessionKeys::generate().unwrap();

    let sdp = create_raop_announce_sdp(&params, "1", "10.0.0.1", "10.0.0.2", Some(&keys)).unwrap();
    let parsed = SdpParser::parse(&sdp).unwrap();

    let rsaaeskey = parsed.rsaaeskey().unwrap();
    assert_eq!(rsaaeskey, keys.rsaaeskey());
    assert!(!rsaaeskey.ends_with('='));
    assert_eq!(parsed.aesiv(), Some(keys.aesiv().as_str()));
    assert!(sdp.ends_with(&format!("a=aesiv:{}\r\n", keys.aesiv())));
}

#[test]
fn test_rsa_without_keys_rejected() {
    let params = StreamParameters {
        crypto: CryptoMode::Rsa,
        ..StreamParameters::default()
    };

    let result = create_raop_announce_sdp(&params, "1", "10.0.0.1", "10.0.0.2", None);

    assert!(matches!(result, Err(RaopError::InvalidParameter { name: "keys", .. })));
}

#[test]
fn test_unsupported_codec_and_crypto_rejected() {
    let aac = StreamParameters {
        codec: Codec::Aac,
        ..StreamParameters::default()
    };
    let mfi = StreamParameters {
        crypto: CryptoMode::MfiSap,
        ..StreamParameters::default()
    };

    assert!(matches!(
        create_raop_announce_sdp(&aac, "1", "a", "b", None),
        Err(RaopError::UnsupportedCodec(_))
    ));
    assert!(matches!(
        create_raop_announce_sdp(&mfi, "1", "a", "b", None),
        Err(RaopError::UnsupportedEncryption(_))
    ));
}

#[test]
fn test_fmtp_parse() {
    let with_pt = AlacFmtp::parse("96 352 0 24 40 10 14 1 255 0 0 48000").unwrap();
    let without_pt = AlacFmtp::parse("4096 0 16 40 10 14 2 255 0 0 44100").unwrap();

    assert_eq!(with_pt.bit_depth, 24);
    assert_eq!(with_pt.channels, 1);
    assert_eq!(with_pt.sample_rate, 48000);
    assert_eq!(without_pt.frames_per_packet, 4096);
    assert!(AlacFmtp::parse("96 352").is_err());
}
