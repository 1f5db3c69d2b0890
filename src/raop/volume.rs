//! Volume mapping for `SET_PARAMETER`

/// Attenuation at volume 1
pub const VOLUME_MIN_DB: i32 = -30;
/// Attenuation at volume 100
pub const VOLUME_MAX_DB: i32 = 0;
/// Sentinel sent for volume 0
pub const VOLUME_MUTE_DB: i32 = -144;

/// Map a 0-100 volume to whole decibels
#[must_use]
pub fn volume_to_db(volume: u8) -> i32 {
    match volume.min(100) {
        0 => VOLUME_MUTE_DB,
        v => VOLUME_MIN_DB + ((VOLUME_MAX_DB - VOLUME_MIN_DB) * i32::from(v)) / 100,
    }
}

/// `text/parameters` body for a volume change
#[must_use]
pub fn volume_parameter(volume: u8) -> String {
    format!("volume: {}.0", volume_to_db(volume))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_endpoints() {
        assert_eq!(volume_to_db(0), VOLUME_MUTE_DB);
        assert_eq!(volume_to_db(1), -30);
        assert_eq!(volume_to_db(50), -15);
        assert_eq!(volume_to_db(100), 0);
        assert_eq!(volume_to_db(255), 0);
    }

    #[test]
    fn test_parameter_text() {
        assert_eq!(volume_parameter(50), "volume: -15.0");
        assert_eq!(volume_parameter(0), "volume: -144.0");
    }

    proptest! {
        #[test]
        fn prop_monotonic(a in 0u8..=100, b in 0u8..=100) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(volume_to_db(lo) <= volume_to_db(hi));
            prop_assert!(volume_to_db(hi) <= VOLUME_MAX_DB);
        }
    }
}
