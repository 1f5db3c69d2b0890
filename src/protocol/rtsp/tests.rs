use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread;
use std::time::Duration;

use proptest::prelude::*;

use super::codec::{RtspCodec, RtspCodecError};
use super::server_codec::{ParseError, RtspServerCodec};
use super::*;
use crate::error::RaopError;

// --- codec.rs tests ---

#[test]
fn test_decode_simple_response() {
    let mut codec = RtspCodec::new();

    codec.feed(b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\n").unwrap();

    let response = codec.decode().unwrap().unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.reason, "OK");
    assert_eq!(response.cseq(), Some(1));
    assert!(response.body.is_empty());
    assert_eq!(codec.buffered_len(), 0);
}

#[test]
fn test_decode_incremental_with_body() {
    let mut codec = RtspCodec::new();

    codec.feed(b"RTSP/1.0 200 OK\r\nCSeq: 4\r\nContent-Len").unwrap();
    assert!(codec.decode().unwrap().is_none());

    codec.feed(b"gth: 5\r\n\r\nhel").unwrap();
    assert!(codec.decode().unwrap().is_none());

    codec.feed(b"lo").unwrap();
    let response = codec.decode().unwrap().unwrap();
    assert_eq!(response.body, b"hello");
}

#[test]
fn test_decode_back_to_back_responses() {
    let mut codec = RtspCodec::new();
    codec
        .feed(b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\nRTSP/1.0 200 OK\r\nCSeq: 2\r\n\r\n")
        .unwrap();

    assert_eq!(codec.decode().unwrap().unwrap().cseq(), Some(1));
    assert_eq!(codec.decode().unwrap().unwrap().cseq(), Some(2));
    assert!(codec.decode().unwrap().is_none());
}

#[test]
fn test_decode_record_latency() {
    let mut codec = RtspCodec::new();
    codec
        .feed(b"RTSP/1.0 200 OK\r\nCSeq: 5\r\nAudio-Latency: 11025\r\nSession: 1;timeout=30\r\n\r\n")
        .unwrap();

    let response = codec.decode().unwrap().unwrap();
    assert_eq!(response.audio_latency(), Some(11025));
    assert_eq!(response.session(), Some("1"));
}

#[test]
fn test_decode_invalid_status_line() {
    let mut codec = RtspCodec::new();
    codec.feed(b"HTTP/1.1 200 OK\r\n\r\n").unwrap();

    assert!(matches!(
        codec.decode(),
        Err(RtspCodecError::InvalidStatusLine(_))
    ));
}

#[test]
fn test_decode_invalid_content_length() {
    let mut codec = RtspCodec::new();
    codec
        .feed(b"RTSP/1.0 200 OK\r\nContent-Length: lots\r\n\r\n")
        .unwrap();

    assert!(matches!(
        codec.decode(),
        Err(RtspCodecError::InvalidContentLength(_))
    ));
}

#[test]
fn test_feed_too_large() {
    let mut codec = RtspCodec::new().with_max_size(8);

    assert_eq!(
        codec.feed(b"RTSP/1.0 200 OK\r\n"),
        Err(RtspCodecError::ResponseTooLarge { size: 17 })
    );
}

#[test]
fn test_response_encode_decode() {
    let response = RtspResponse::new(StatusCode::OK)
        .with_header("CSeq", "9")
        .with_header("Transport", "RTP/AVP/UDP;server_port=1;control_port=2;timing_port=3");

    let mut codec = RtspCodec::new();
    codec.feed(&response.encode()).unwrap();
    let decoded = codec.decode().unwrap().unwrap();

    assert_eq!(decoded.headers, response.headers);
}

// --- server_codec.rs tests ---

#[test]
fn test_server_decode_announce() {
    let request = RtspRequest::builder(Method::Announce, "rtsp://10.0.0.1/123")
        .cseq(2)
        .content_type("application/sdp")
        .body(b"v=0\r\n".to_vec())
        .build();

    let mut codec = RtspServerCodec::new();
    let encoded = request.encode();
    codec.feed(&encoded[..10]);
    assert!(codec.decode().unwrap().is_none());
    codec.feed(&encoded[10..]);

    let decoded = codec.decode().unwrap().unwrap();
    assert_eq!(decoded.method, Method::Announce);
    assert_eq!(decoded.uri, "rtsp://10.0.0.1/123");
    assert_eq!(decoded.cseq(), Some(2));
    assert_eq!(decoded.body, b"v=0\r\n");
}

#[test]
fn test_server_decode_unknown_method() {
    let mut codec = RtspServerCodec::new();
    codec.feed(b"PLAY rtsp://h/1 RTSP/1.0\r\nCSeq: 1\r\n\r\n");

    assert!(matches!(
        codec.decode(),
        Err(ParseError::InvalidMethod(m)) if m == "PLAY"
    ));
}

#[test]
fn test_server_decode_bad_request_line() {
    let mut codec = RtspServerCodec::new();
    codec.feed(b"OPTIONS *\r\n\r\n");

    assert!(matches!(
        codec.decode(),
        Err(ParseError::InvalidRequestLine(_))
    ));
}

// --- headers.rs tests ---

#[test]
fn test_headers_case_insensitive() {
    let mut headers = Headers::new();
    headers.insert("Content-Type", "text/parameters");

    assert_eq!(headers.get("content-type"), Some("text/parameters"));
    assert_eq!(headers.content_type(), Some("text/parameters"));

    headers.insert("CONTENT-TYPE", "application/sdp");
    assert_eq!(headers.len(), 1);
    assert_eq!(headers.get("Content-Type"), Some("application/sdp"));
}

#[test]
fn test_headers_keep_order_and_remove() {
    let mut headers = Headers::new();
    headers.insert("CSeq", "1");
    headers.insert("User-Agent", "x");
    headers.insert("Session", "2");

    let names: Vec<&str> = headers.iter().map(|(k, _)| k).collect();
    assert_eq!(names, vec!["CSeq", "User-Agent", "Session"]);

    assert_eq!(headers.remove("user-agent"), Some("x".to_string()));
    assert_eq!(headers.remove("user-agent"), None);
    assert_eq!(headers.len(), 2);
}

#[test]
fn test_method_parse() {
    assert_eq!("set_parameter".parse::<Method>(), Ok(Method::SetParameter));
    assert_eq!("TEARDOWN".parse::<Method>(), Ok(Method::Teardown));
    assert_eq!("POST".parse::<Method>(), Err(()));
    assert_eq!(Method::Flush.as_str(), "FLUSH");
}

// --- client.rs tests ---

/// Answers every request with its own `CSeq`, holding the first reply back
fn late_first_reply_peer(delay: Duration) -> (SocketAddr, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut codec = RtspServerCodec::new();
        let mut buf = [0u8; 4096];
        let mut answered = 0;

        loop {
            while let Some(request) = codec.decode().unwrap() {
                if answered == 0 {
                    thread::sleep(delay);
                }
                let cseq = request.cseq().unwrap_or_default().to_string();
                let response = RtspResponse::new(StatusCode::OK).with_header("CSeq", cseq);
                stream.write_all(&response.encode()).unwrap();
                answered += 1;
            }
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => codec.feed(&buf[..n]),
            }
        }
    });

    (addr, handle)
}

#[test]
fn test_client_skips_late_reply_after_timeout() {
    let (addr, peer) = late_first_reply_peer(Duration::from_millis(300));
    let mut client = RtspClient::connect(addr, Duration::from_millis(200), "test/1.0").unwrap();

    let err = client.options().unwrap_err();
    assert!(matches!(err, RaopError::Timeout { method: Method::Options }));

    // Let the late reply land ahead of the next one
    thread::sleep(Duration::from_millis(200));

    let response = client.options().unwrap();
    assert_eq!(response.cseq(), Some(client.session().cseq()));
    client.set_parameter("volume: -15.000000\r\n").unwrap();
    assert!(client.is_alive());
    // Blocking reads are restored after the liveness check
    client.options().unwrap();

    client.close();
    peer.join().unwrap();
}

#[test]
fn test_client_rejects_reply_from_the_future() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let peer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf).unwrap();
        let response = RtspResponse::new(StatusCode::OK).with_header("CSeq", "99");
        stream.write_all(&response.encode()).unwrap();
    });

    let mut client = RtspClient::connect(addr, Duration::from_secs(2), "test/1.0").unwrap();
    let err = client.options().unwrap_err();
    assert!(matches!(err, RaopError::CseqMismatch { actual: Some(99), .. }));

    peer.join().unwrap();
}

proptest! {
    #[test]
    fn test_codec_any_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut codec = RtspCodec::new();
        if codec.feed(&bytes).is_ok() {
            // Should not panic
            let _ = codec.decode();
        }
    }

    #[test]
    fn test_codec_split_anywhere(split in 0usize..60) {
        let raw = b"RTSP/1.0 200 OK\r\nCSeq: 3\r\nContent-Length: 4\r\n\r\nbody";
        let split = split.min(raw.len());

        let mut codec = RtspCodec::new();
        codec.feed(&raw[..split]).unwrap();
        let early = codec.decode().unwrap();
        codec.feed(&raw[split..]).unwrap();

        let response = match early {
            Some(response) => response,
            None => codec.decode().unwrap().unwrap(),
        };
        prop_assert_eq!(response.cseq(), Some(3));
        prop_assert_eq!(response.body, b"body".to_vec());
    }
}
