use std::ops::Range;

// The smallest unit of audio; one stereo frame
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn zero() -> Self { // just giving `default` a better name for clarity
        Self::default()
    }

    pub fn mono(sample: f32) -> Self {
        Self { left: sample, right: sample }
    }

    #[inline]
    pub fn add_mono(&mut self, sample: f32) {
        self.left += sample;
        self.right += sample;
    }
}

pub fn seconds_to_frame(seconds: f64, sample_rate: f64) -> u64 {
    (seconds.max(0.0) * sample_rate).round() as u64
}

/// Local indices of a block (starting at absolute frame `block_start`, `len`
/// frames long) during which a sound spanning `[start, stop)` is audible.
pub fn active_range(block_start: u64, len: usize, start: u64, stop: u64) -> Option<Range<usize>> {
    let block_end = block_start + len as u64;
    if stop <= block_start || start >= block_end || stop <= start {
        return None;
    }
    let from = start.saturating_sub(block_start) as usize;
    let to = (stop.min(block_end) - block_start) as usize;
    Some(from..to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_clips_to_block() {
        assert_eq!(active_range(0, 128, 10, 50), Some(10..50));
        assert_eq!(active_range(128, 128, 10, 200), Some(0..72));
        assert_eq!(active_range(128, 128, 200, 1000), Some(72..128));
    }

    #[test]
    fn range_outside_block_is_none() {
        assert_eq!(active_range(0, 128, 128, 300), None);
        assert_eq!(active_range(256, 128, 0, 256), None);
        assert_eq!(active_range(0, 128, 40, 40), None);
    }
}
