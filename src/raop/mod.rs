//! RAOP streaming engine
//!
//! [`RaopSession`] drives the RTSP handshake, paces audio onto the RTP audio
//! channel and runs two background workers: one answering timing probes and
//! one serving retransmissions and periodic sync packets.
//!
//! One thread feeds audio through [`RaopSession::send_chunk`], while another
//! may issue flush, volume, progress or teardown at any time. Workers only
//! touch the shared stream state, never the RTSP connection.

mod backlog;
mod clock;
mod codec;
mod control;
mod device;
mod sender;
mod session;
mod state;
mod stream;
mod timing;
mod volume;
mod worker;


pub use backlog::Backlog;
pub use clock::{RtpClock, wrapping_before};
pub use codec::{AlacFrameEncoder, FrameEncoder};
pub use control::{MAX_MISSES, RetransmitOutcome};
pub use device::{DeviceController, DeviceRequest};
pub use sender::SentChunk;
pub use session::RaopSession;
pub use state::SessionState;
pub use stream::SANITY_THRESHOLD;
pub use timing::answer_probe;
pub use volume::{VOLUME_MAX_DB, VOLUME_MIN_DB, VOLUME_MUTE_DB, volume_parameter, volume_to_db};
pub use worker::{WorkerFlag, WorkerHandle};
