//! Control channel responder: retransmissions and periodic sync

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use super::stream::{RtpLink, Shared};
use super::worker::WorkerFlag;
use crate::net::is_timeout;
use crate::protocol::rtp::constants::MAX_DATAGRAM;
use crate::protocol::rtp::{RetransmitRequest, encode_retransmit};

/// Misses in one request beyond which the channel counts as failing
pub const MAX_MISSES: u16 = 100;

const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// What one retransmit request produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetransmitOutcome {
    /// Packets requested
    pub requested: u16,
    /// Packets resent from the backlog
    pub resent: u16,
    /// Packets no longer in the backlog
    pub missed: u16,
    /// Malformed request or failed resend
    pub error: bool,
}

pub(crate) fn serve_retransmit(
    shared: &Shared,
    link: &RtpLink,
    datagram: &[u8],
) -> RetransmitOutcome {
    let mut outcome = RetransmitOutcome::default();

    let request = match RetransmitRequest::decode(datagram) {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "malformed retransmit request");
            outcome.error = true;
            RetransmitRequest::new(0, 0)
        }
    };
    outcome.requested = request.count;

    for sequence in request.sequences() {
        // Copy out under the lock, send without it
        let resend = {
            let core = shared.stream.lock();
            core.backlog
                .get(sequence)
                .map(|stored| (core.backlog.timestamp(sequence), encode_retransmit(stored)))
        };

        let Some((timestamp, buf)) = resend else {
            outcome.missed += 1;
            debug!(sequence, "lost packet out of backlog");
            continue;
        };
        match link.control.send_to(&buf, link.control_addr) {
            Ok(_) => {
                outcome.resent += 1;
                trace!(sequence, ?timestamp, "packet resent");
            }
            Err(e) => {
                outcome.error = true;
                debug!(sequence, error = %e, "resend failed");
            }
        }
    }

    info!(
        seq_start = request.seq_start,
        count = request.count,
        missed = outcome.missed,
        error = outcome.error,
        "retransmit"
    );

    if outcome.error || outcome.missed > MAX_MISSES {
        warn!("control channel error");
        shared.add_sanity(5);
    }

    outcome
}

/// Control worker body
pub(crate) fn run_control(shared: Arc<Shared>, link: Arc<RtpLink>, flag: WorkerFlag) {
    let mut buf = [0u8; MAX_DATAGRAM];

    while flag.is_running() {
        match link.control.recv_from(&mut buf) {
            Ok((len, _)) => {
                serve_retransmit(&shared, &link, &buf[..len]);
                continue;
            }
            Err(e) if is_timeout(&e) => {}
            Err(e) => {
                if flag.is_running() {
                    error!(error = %e, "control socket error");
                    thread::sleep(ERROR_BACKOFF);
                }
                continue;
            }
        }

        shared.send_periodic_sync(&link);
    }
}
