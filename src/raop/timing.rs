//! Timing channel responder

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use super::stream::RtpLink;
use super::worker::WorkerFlag;
use crate::net::{Clock, is_timeout};
use crate::protocol::rtp::constants::MAX_DATAGRAM;
use crate::protocol::rtp::{NtpTimestamp, RtpDecodeError, TimingProbe, TimingReply};

const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Answer one receiver probe, stamped with `now`
///
/// # Errors
///
/// Returns `RtpDecodeError` if the datagram is not a timing request.
pub fn answer_probe(datagram: &[u8], now: NtpTimestamp) -> Result<TimingReply, RtpDecodeError> {
    TimingProbe::decode(datagram).map(|probe| probe.reply(now))
}

/// Timing worker body
pub(crate) fn run_timing(link: Arc<RtpLink>, clock: Arc<dyn Clock>, flag: WorkerFlag) {
    let mut buf = [0u8; MAX_DATAGRAM];

    while flag.is_running() {
        let len = match link.timing.recv_from(&mut buf) {
            Ok((len, _)) => len,
            Err(e) if is_timeout(&e) => continue,
            Err(e) => {
                if flag.is_running() {
                    error!(error = %e, "timing socket error");
                    thread::sleep(ERROR_BACKOFF);
                }
                continue;
            }
        };

        let reply = match answer_probe(&buf[..len], clock.now_ntp()) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(error = %e, "ignoring timing datagram");
                continue;
            }
        };
        debug!(
            ntp.seconds = reply.send_time.seconds,
            reference.seconds = reply.reference_time.seconds,
            "timing reply"
        );

        match link.timing.send_to(&reply.encode(), link.timing_addr) {
            Ok(n) if n == TimingReply::SIZE => {}
            Ok(_) | Err(_) => error!("error responding to timing probe"),
        }
    }
}
