//! RAOP RTSP request factory
//!
//! Builds every request the RAOP client sends and tracks the per-connection
//! identifiers (`CSeq`, session id, `Client-Instance`). It performs no I/O.

use std::net::IpAddr;

use rand::Rng;

use super::headers::{names, raop};
use super::transport::client_transport;
use super::{Headers, Method, RtspRequest, RtspRequestBuilder, RtspResponse};
use crate::error::RaopError;

/// Content type of `SET_PARAMETER` text bodies
pub const TEXT_PARAMETERS: &str = "text/parameters";
/// Content type of DMAP metadata bodies
pub const DMAP_TAGGED: &str = "application/x-dmap-tagged";
/// Content type of ANNOUNCE bodies
pub const APPLICATION_SDP: &str = "application/sdp";

/// RAOP RTSP request factory
#[derive(Debug)]
pub struct RaopRtspSession {
    cseq: u32,
    user_agent: String,
    /// Random decimal stream id, used as URI path and SDP origin id
    sid: String,
    /// Client instance ID (64-bit hex)
    client_instance: String,
    /// Session id returned by SETUP
    session_id: Option<String>,
    /// Headers added to every request
    extra_headers: Headers,
    uri: String,
}

impl RaopRtspSession {
    /// Create a new request factory for a receiver reached from `local_ip`
    #[must_use]
    pub fn new(local_ip: IpAddr, user_agent: impl Into<String>) -> Self {
        let mut session = Self {
            cseq: 0,
            user_agent: user_agent.into(),
            sid: String::new(),
            client_instance: String::new(),
            session_id: None,
            extra_headers: Headers::new(),
            uri: String::new(),
        };
        session.renew(local_ip);
        session
    }

    /// Draw fresh identifiers for a new stream
    ///
    /// The `CSeq` counter keeps running since the TCP link is unchanged.
    pub fn renew(&mut self, local_ip: IpAddr) {
        let mut rng = rand::thread_rng();

        self.sid = rng.r#gen::<u32>().to_string();
        self.client_instance = format!("{:016X}", rng.r#gen::<u64>());
        self.session_id = None;
        self.uri = format!("rtsp://{local_ip}/{}", self.sid);

        self.extra_headers = Headers::new();
        self.extra_headers
            .insert(raop::CLIENT_INSTANCE, self.client_instance.clone());
        self.extra_headers
            .insert(raop::DACP_ID, self.client_instance.clone());
    }

    /// Stream id
    #[must_use]
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Client instance id, also sent as `DACP-ID`
    #[must_use]
    pub fn client_instance(&self) -> &str {
        &self.client_instance
    }

    /// Session id returned by SETUP
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Last `CSeq` issued
    #[must_use]
    pub fn cseq(&self) -> u32 {
        self.cseq
    }

    /// Request URI for stream-scoped verbs
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Add a header to every following request
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        self.extra_headers.insert(name, value);
    }

    /// Stop adding a header
    pub fn remove_header(&mut self, name: &str) {
        self.extra_headers.remove(name);
    }

    /// Drop every per-stream header (before TEARDOWN)
    pub fn clear_headers(&mut self) {
        self.extra_headers = Headers::new();
    }

    fn next_cseq(&mut self) -> u32 {
        self.cseq += 1;
        self.cseq
    }

    fn builder(&mut self, method: Method, uri: &str) -> RtspRequestBuilder {
        let cseq = self.next_cseq();
        let mut builder = RtspRequest::builder(method, uri)
            .cseq(cseq)
            .user_agent(&self.user_agent)
            .headers(&self.extra_headers);

        if let Some(session) = &self.session_id {
            builder = builder.session(session);
        }

        builder
    }

    fn stream_builder(&mut self, method: Method) -> RtspRequestBuilder {
        let uri = self.uri.clone();
        self.builder(method, &uri)
    }

    /// Create OPTIONS request
    pub fn options_request(&mut self) -> RtspRequest {
        self.builder(Method::Options, "*").build()
    }

    /// Create ANNOUNCE request with SDP
    pub fn announce_request(&mut self, sdp: &str) -> RtspRequest {
        self.stream_builder(Method::Announce)
            .content_type(APPLICATION_SDP)
            .body(sdp.as_bytes().to_vec())
            .build()
    }

    /// Create SETUP request offering the local control and timing ports
    pub fn setup_request(&mut self, control_port: u16, timing_port: u16) -> RtspRequest {
        self.stream_builder(Method::Setup)
            .header(names::TRANSPORT, client_transport(control_port, timing_port))
            .build()
    }

    /// Create RECORD request
    pub fn record_request(&mut self, seq: u16, rtptime: u32) -> RtspRequest {
        self.stream_builder(Method::Record)
            .header(names::RANGE, "npt=0-")
            .header(names::RTP_INFO, format!("seq={seq};rtptime={rtptime}"))
            .build()
    }

    /// Create `SET_PARAMETER` request with a text body such as `volume: -15.0`
    pub fn set_parameter_request(&mut self, text: &str) -> RtspRequest {
        let mut body = text.to_string();
        if !body.ends_with("\r\n") {
            body.push_str("\r\n");
        }

        self.stream_builder(Method::SetParameter)
            .content_type(TEXT_PARAMETERS)
            .body(body.into_bytes())
            .build()
    }

    /// Create `SET_PARAMETER` request carrying DMAP metadata
    pub fn metadata_request(&mut self, dmap: Vec<u8>, rtptime: u32) -> RtspRequest {
        self.stream_builder(Method::SetParameter)
            .content_type(DMAP_TAGGED)
            .header(names::RTP_INFO, format!("rtptime={rtptime}"))
            .body(dmap)
            .build()
    }

    /// Create FLUSH request
    pub fn flush_request(&mut self, seq: u16, rtptime: u32) -> RtspRequest {
        self.stream_builder(Method::Flush)
            .header(names::RTP_INFO, format!("seq={seq};rtptime={rtptime}"))
            .build()
    }

    /// Create TEARDOWN request
    pub fn teardown_request(&mut self) -> RtspRequest {
        self.stream_builder(Method::Teardown).build()
    }

    /// Check a response against the request it answers
    ///
    /// # Errors
    ///
    /// Returns `RaopError::CseqMismatch` or `RaopError::RtspStatus` on a bad reply.
    pub fn process_response(
        &mut self,
        request: &RtspRequest,
        response: &RtspResponse,
    ) -> Result<(), RaopError> {
        let expected = request.cseq().unwrap_or(self.cseq);
        if response.cseq() != Some(expected) {
            return Err(RaopError::CseqMismatch {
                expected,
                actual: response.cseq(),
            });
        }

        if !response.is_success() {
            return Err(RaopError::RtspStatus {
                method: request.method,
                status_code: response.status.as_u16(),
                reason: response.reason.clone(),
            });
        }

        if request.method == Method::Setup {
            if let Some(session) = response.session() {
                self.session_id = Some(session.to_string());
            }
        }

        Ok(())
    }
}
