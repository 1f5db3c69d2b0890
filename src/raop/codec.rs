//! Codec adapter between the PCM pipeline and `send_chunk`

use bytes::Bytes;

use crate::error::RaopError;
use crate::types::StreamParameters;

/// Turns one block of PCM into a wire frame
pub trait FrameEncoder: Send {
    /// Encode `frames` frames of interleaved native-endian PCM
    ///
    /// # Errors
    ///
    /// Returns `RaopError::Encoder` if the block does not fit the encoder.
    fn encode(&mut self, pcm: &[u8], frames: usize) -> Result<Bytes, RaopError>;

    /// Frames the encoder expects per call
    fn frames_per_packet(&self) -> u32;
}

/// ALAC encoder backed by the `alac-encoder` crate
pub struct AlacFrameEncoder {
    encoder: alac_encoder::AlacEncoder,
    input_format: alac_encoder::FormatDescription,
    frames_per_packet: u32,
    bytes_per_frame: usize,
    output: Vec<u8>,
}

impl AlacFrameEncoder {
    /// Create an encoder for 16-bit PCM described by `params`
    ///
    /// # Errors
    ///
    /// Returns `RaopError::Encoder` for sample sizes other than 16 bits.
    pub fn new(params: &StreamParameters) -> Result<Self, RaopError> {
        if params.sample_size != 16 {
            return Err(RaopError::Encoder(format!(
                "{}-bit input is not supported",
                params.sample_size
            )));
        }

        let rate = f64::from(params.sample_rate);
        let channels = u32::from(params.channels);
        let format = alac_encoder::FormatDescription::alac(rate, params.frames_per_packet, channels);
        let input_format = alac_encoder::FormatDescription::pcm::<i16>(rate, channels);

        let bytes_per_frame = params.bytes_per_frame();
        // Worst case ALAC output is slightly larger than the raw input
        let max_output = params.frames_per_packet as usize * bytes_per_frame + 256;

        Ok(Self {
            encoder: alac_encoder::AlacEncoder::new(&format),
            input_format,
            frames_per_packet: params.frames_per_packet,
            bytes_per_frame,
            output: vec![0u8; max_output],
        })
    }
}

impl FrameEncoder for AlacFrameEncoder {
    fn encode(&mut self, pcm: &[u8], frames: usize) -> Result<Bytes, RaopError> {
        if frames > self.frames_per_packet as usize {
            return Err(RaopError::Encoder(format!(
                "{frames} frames exceed the packet size of {}",
                self.frames_per_packet
            )));
        }
        let needed = frames * self.bytes_per_frame;
        let input = pcm.get(..needed).ok_or_else(|| {
            RaopError::Encoder(format!("expected {needed} bytes of PCM, got {}", pcm.len()))
        })?;

        let size = self.encoder.encode(&self.input_format, input, &mut self.output);
        Ok(Bytes::copy_from_slice(&self.output[..size.min(self.output.len())]))
    }

    fn frames_per_packet(&self) -> u32 {
        self.frames_per_packet
    }
}

impl std::fmt::Debug for AlacFrameEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlacFrameEncoder")
            .field("frames_per_packet", &self.frames_per_packet)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_silence() {
        let params = StreamParameters::default();
        let mut encoder = AlacFrameEncoder::new(&params).unwrap();
        let pcm = vec![0u8; 352 * 4];

        let frame = encoder.encode(&pcm, 352).unwrap();

        assert!(!frame.is_empty());
        assert!(frame.len() < pcm.len());
        assert_eq!(encoder.frames_per_packet(), 352);
    }

    #[test]
    fn test_short_input_rejected() {
        let mut encoder = AlacFrameEncoder::new(&StreamParameters::default()).unwrap();

        let result = encoder.encode(&[0u8; 100], 352);

        assert!(matches!(result, Err(RaopError::Encoder(_))));
    }

    #[test]
    fn test_unsupported_sample_size() {
        let params = StreamParameters {
            sample_size: 24,
            ..StreamParameters::default()
        };

        assert!(AlacFrameEncoder::new(&params).is_err());
    }
}
