use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// NTP timestamp (64-bit, seconds since 1900-01-01)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct NtpTimestamp {
    /// Seconds since NTP epoch
    pub seconds: u32,
    /// Fractional seconds (1/2^32 of a second)
    pub fraction: u32,
}

impl NtpTimestamp {
    /// NTP epoch offset from Unix epoch (70 years in seconds)
    pub const NTP_UNIX_OFFSET: u64 = 0x83AA_7E80;

    /// Encoded size in bytes
    pub const SIZE: usize = 8;

    /// Create from current wall-clock time
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::from_unix(since_epoch)
    }

    /// Convert a duration since the Unix epoch
    pub fn from_unix(since_epoch: Duration) -> Self {
        let ntp_secs = since_epoch.as_secs() + Self::NTP_UNIX_OFFSET;
        let fraction = (u64::from(since_epoch.subsec_nanos()) << 32) / 1_000_000_000;

        Self {
            seconds: ntp_secs as u32,
            fraction: fraction as u32,
        }
    }

    /// Encode to 8 bytes
    pub fn encode(&self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&self.seconds.to_be_bytes());
        buf[4..8].copy_from_slice(&self.fraction.to_be_bytes());
        buf
    }

    /// Decode from the first 8 bytes of `buf`
    ///
    /// Returns `None` if fewer than 8 bytes are available.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let bytes: [u8; 8] = buf.get(..Self::SIZE)?.try_into().ok()?;
        Some(Self {
            seconds: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            fraction: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }

    /// Convert to microseconds since NTP epoch
    pub fn to_micros(&self) -> u64 {
        let secs = u64::from(self.seconds);
        let frac_micros = (u64::from(self.fraction) * 1_000_000) >> 32;
        secs * 1_000_000 + frac_micros
    }
}
