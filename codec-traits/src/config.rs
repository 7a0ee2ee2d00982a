use crate::PixelFormat;
use alloc::{string::String, vec::Vec};

/// A rational number, used for time bases and frame rates.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }
}

/// Encoder parameters. Applied once when a session opens and immutable
/// afterwards.
#[derive(Clone, Debug)]
pub struct EncoderConfig {
    /// Target bit rate in bits per second.
    pub bit_rate: u64,
    pub width: u32,
    pub height: u32,
    /// The unit, in seconds, that frame timestamps are expressed in.
    pub time_base: Rational,
    pub frame_rate: Rational,
    /// Number of frames from one intra picture to the next.
    pub gop_size: u32,
    /// Maximum number of consecutive bidirectionally predicted frames.
    pub max_b_frames: u32,
    pub pixel_format: PixelFormat,
    /// Codec-specific tuning options, applied in order at configure time.
    pub options: Vec<(String, String)>,
}

impl EncoderConfig {
    pub fn set_option(&mut self, name: &str, value: &str) {
        self.options.push((name.into(), value.into()));
    }

    /// The most recently set value for `name`, if any.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.iter().rev().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_last_option_wins() {
        let mut config = EncoderConfig {
            bit_rate: 400_000,
            width: 64,
            height: 48,
            time_base: Rational::new(1, 25),
            frame_rate: Rational::new(25, 1),
            gop_size: 10,
            max_b_frames: 1,
            pixel_format: PixelFormat::Yuv420Planar,
            options: vec![],
        };
        assert_eq!(config.option("predict"), None);
        config.set_option("predict", "none");
        config.set_option("predict", "delta");
        assert_eq!(config.option("predict"), Some("delta"));
    }
}
