use codec_traits::{CodecBackend, DrainOutcome, EncoderConfig, FrameBuffer, PacketBuffer};
use snafu::Snafu;
use std::collections::VecDeque;

#[derive(Debug, Snafu)]
pub enum RawVideoEncoderError {
    #[snafu(display("unsupported configuration: {reason}"))]
    Unsupported { reason: &'static str },
    #[snafu(display("unknown option {name:?}"))]
    UnknownOption { name: String },
    #[snafu(display("handshake violation: {operation}"))]
    Handshake { operation: &'static str },
}

type Result<T> = core::result::Result<T, RawVideoEncoderError>;

struct RawChunk {
    pts: i64,
    data: Vec<u8>,
}

/// Zero-delay passthrough encoder: each packet is the stride-cropped planar
/// samples of one frame, in submission order. Every frame is a keyframe and
/// the stream has no syntax of its own.
pub struct RawVideoEncoder {
    configured: bool,
    opened: bool,
    did_flush: bool,
    ready: VecDeque<RawChunk>,
}

impl RawVideoEncoder {
    pub fn new() -> Self {
        Self {
            configured: false,
            opened: false,
            did_flush: false,
            ready: VecDeque::new(),
        }
    }
}

impl Default for RawVideoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecBackend for RawVideoEncoder {
    type Error = RawVideoEncoderError;

    fn configure(&mut self, config: &EncoderConfig) -> Result<()> {
        if self.opened {
            return Err(RawVideoEncoderError::Handshake {
                operation: "reconfiguring an open encoder",
            });
        }
        if config.width == 0 || config.height == 0 {
            return Err(RawVideoEncoderError::Unsupported {
                reason: "zero picture dimension",
            });
        }
        if let Some((name, _)) = config.options.first() {
            return Err(RawVideoEncoderError::UnknownOption { name: name.clone() });
        }
        self.configured = true;
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        if self.opened {
            return Err(RawVideoEncoderError::Handshake {
                operation: "opening an open encoder",
            });
        }
        if !self.configured {
            return Err(RawVideoEncoderError::Handshake {
                operation: "opening an unconfigured encoder",
            });
        }
        self.opened = true;
        Ok(())
    }

    fn submit(&mut self, frame: Option<&FrameBuffer>) -> Result<()> {
        if !self.opened {
            return Err(RawVideoEncoderError::Handshake {
                operation: "submitting to a closed encoder",
            });
        }
        if self.did_flush {
            return Err(RawVideoEncoderError::Handshake {
                operation: "submitting after end of stream",
            });
        }
        match frame {
            Some(frame) => {
                let mut data = Vec::new();
                for index in 0..frame.plane_count() {
                    let plane = frame.plane(index);
                    for y in 0..plane.height() {
                        data.extend_from_slice(plane.row(y));
                    }
                }
                self.ready.push_back(RawChunk {
                    pts: frame.pts(),
                    data,
                });
            }
            None => self.did_flush = true,
        }
        Ok(())
    }

    fn drain(&mut self, packet: &mut PacketBuffer) -> Result<DrainOutcome> {
        if !self.opened {
            return Err(RawVideoEncoderError::Handshake {
                operation: "draining a closed encoder",
            });
        }
        match self.ready.pop_front() {
            Some(chunk) => {
                packet.clear();
                packet.data.extend_from_slice(&chunk.data);
                packet.pts = chunk.pts;
                packet.key = true;
                Ok(DrainOutcome::Ready)
            }
            None if self.did_flush => Ok(DrainOutcome::EndOfStream),
            None => Ok(DrainOutcome::NotReady),
        }
    }

    fn close(&mut self) {
        self.configured = false;
        self.opened = false;
        self.did_flush = false;
        self.ready.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use codec_traits::{PixelFormat, Rational};

    fn test_config() -> EncoderConfig {
        EncoderConfig {
            bit_rate: 0,
            width: 8,
            height: 4,
            time_base: Rational::new(1, 25),
            frame_rate: Rational::new(25, 1),
            gop_size: 10,
            max_b_frames: 0,
            pixel_format: PixelFormat::Yuv420Planar,
            options: vec![],
        }
    }

    fn open_encoder(config: &EncoderConfig) -> RawVideoEncoder {
        let mut encoder = RawVideoEncoder::new();
        encoder.configure(config).unwrap();
        encoder.open().unwrap();
        encoder
    }

    #[test]
    fn test_passthrough() {
        let config = test_config();
        let mut encoder = open_encoder(&config);
        let mut packet = PacketBuffer::new();

        let mut frame = FrameBuffer::from_config(&config);
        for plane in 0..frame.plane_count() {
            let mut plane = frame.plane_mut(plane);
            for y in 0..plane.height() {
                plane.row_mut(y).fill(y as u8 + 1);
            }
        }
        frame.set_pts(3);

        encoder.submit(Some(&frame)).unwrap();
        assert_eq!(encoder.drain(&mut packet).unwrap(), DrainOutcome::Ready);

        // 8x4 luma plus two 4x2 chroma planes, stride padding stripped.
        assert_eq!(packet.data.len(), 8 * 4 + 2 * (4 * 2));
        assert_eq!(packet.pts, 3);
        assert!(packet.key);
        assert_eq!(&packet.data[..8], &[1; 8]);
        assert_eq!(&packet.data[8..16], &[2; 8]);

        assert_eq!(encoder.drain(&mut packet).unwrap(), DrainOutcome::NotReady);
    }

    #[test]
    fn test_emission_order_matches_submission() {
        let config = test_config();
        let mut encoder = open_encoder(&config);
        let mut packet = PacketBuffer::new();

        for pts in 0..4 {
            let mut frame = FrameBuffer::from_config(&config);
            frame.set_pts(pts);
            encoder.submit(Some(&frame)).unwrap();
        }
        encoder.submit(None).unwrap();

        let mut emitted = vec![];
        while let DrainOutcome::Ready = encoder.drain(&mut packet).unwrap() {
            emitted.push(packet.pts);
        }
        assert_eq!(emitted, vec![0, 1, 2, 3]);
        assert_eq!(encoder.drain(&mut packet).unwrap(), DrainOutcome::EndOfStream);
    }

    #[test]
    fn test_rejects_options() {
        let mut config = test_config();
        config.set_option("predict", "delta");
        let err = RawVideoEncoder::new().configure(&config).unwrap_err();
        assert!(matches!(err, RawVideoEncoderError::UnknownOption { .. }));
    }

    #[test]
    fn test_handshake_enforcement() {
        let config = test_config();
        let mut encoder = RawVideoEncoder::new();
        let err = encoder.open().unwrap_err();
        assert!(matches!(err, RawVideoEncoderError::Handshake { .. }));

        let mut encoder = open_encoder(&config);
        encoder.submit(None).unwrap();
        let frame = FrameBuffer::from_config(&config);
        let err = encoder.submit(Some(&frame)).unwrap_err();
        assert!(matches!(err, RawVideoEncoderError::Handshake { .. }));
    }
}
