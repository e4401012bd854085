//! Stereo-to-mono PCM downmix.

/// Convert interleaved little-endian 16-bit stereo PCM to mono by keeping
/// only the left-channel sample of each frame.
///
/// This is deliberately a channel drop, not an average: the output must stay
/// bit-compatible with the capture format the realtime service expects. The
/// input length should be a multiple of 4 (one frame = left + right i16);
/// a trailing partial frame is ignored.
pub fn stereo_to_mono(stereo: &[u8]) -> Vec<u8> {
    let frames = stereo.len() / 4;
    let mut mono = Vec::with_capacity(frames * 2);

    for frame in 0..frames {
        let offset = frame * 4;
        mono.push(stereo[offset]);
        mono.push(stereo[offset + 1]);
    }

    mono
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interleave(left: &[i16], right: &[i16]) -> Vec<u8> {
        let mut out = Vec::new();
        for (l, r) in left.iter().zip(right) {
            out.extend_from_slice(&l.to_le_bytes());
            out.extend_from_slice(&r.to_le_bytes());
        }
        out
    }

    #[test]
    fn output_is_half_the_input_length() {
        let stereo = interleave(&[1, 2, 3, 4], &[5, 6, 7, 8]);
        assert_eq!(stereo_to_mono(&stereo).len(), stereo.len() / 2);
    }

    #[test]
    fn keeps_left_channel_samples_verbatim() {
        let left = [100, -200, 32767, -32768];
        let right = [9, 9, 9, 9];
        let mono = stereo_to_mono(&interleave(&left, &right));

        let samples: Vec<i16> = mono
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        assert_eq!(samples, left);
    }

    #[test]
    fn does_not_average_channels() {
        // Left 0, right 1000: an averaging mix would produce 500.
        let mono = stereo_to_mono(&interleave(&[0], &[1000]));
        assert_eq!(i16::from_le_bytes([mono[0], mono[1]]), 0);
    }

    #[test]
    fn trailing_partial_frame_is_dropped() {
        let mut stereo = interleave(&[7], &[8]);
        stereo.extend_from_slice(&[1, 2, 3]);
        assert_eq!(stereo_to_mono(&stereo).len(), 2);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(stereo_to_mono(&[]).is_empty());
    }
}
