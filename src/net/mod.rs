//! Transport primitives
//!
//! Blocking UDP channels and the clocks the engine schedules against.

mod clock;
mod udp;

pub use clock::{Clock, ManualClock, SystemClock};
pub use udp::{AUDIO_WRITE_TIMEOUT, UdpChannel, WORKER_READ_TIMEOUT, is_timeout};
