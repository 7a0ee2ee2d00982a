use byteorder::{BigEndian, ByteOrder};
use codec_traits::{CodecBackend, DrainOutcome, EncoderConfig, FrameBuffer, PacketBuffer};
use snafu::Snafu;
use std::collections::VecDeque;

/// Magic bytes opening every packet.
pub const PACKET_MAGIC: [u8; 4] = *b"RLV1";

/// Fixed per-packet header: magic, frame-type tag, pts, payload length.
pub const PACKET_HEADER_LEN: usize = 17;

/// Highest supported number of consecutive bidirectional frames.
pub const MAX_B_FRAMES: u32 = 4;

#[derive(Debug, Snafu)]
pub enum RlvEncoderError {
    #[snafu(display("unsupported configuration: {reason}"))]
    Unsupported { reason: &'static str },
    #[snafu(display("unknown option {name:?}"))]
    UnknownOption { name: String },
    #[snafu(display("invalid value {value:?} for option {name:?}"))]
    InvalidOptionValue { name: String, value: String },
    #[snafu(display("handshake violation: {operation}"))]
    Handshake { operation: &'static str },
}

type Result<T> = core::result::Result<T, RlvEncoderError>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Prediction {
    None,
    Delta,
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum FrameKind {
    Intra,
    Forward,
    Bidirectional,
}

impl FrameKind {
    fn tag(self) -> u8 {
        match self {
            Self::Intra => b'I',
            Self::Forward => b'P',
            Self::Bidirectional => b'B',
        }
    }
}

struct EncodedChunk {
    pts: i64,
    key: bool,
    data: Vec<u8>,
}

/// Run-length toy video encoder.
///
/// Pictures are classified into a fixed GOP structure: an intra picture at
/// every GOP boundary, forward-predicted anchors every `max_b_frames + 1`
/// positions, and bidirectional pictures in between. Anchors are emitted as
/// soon as they arrive; bidirectional pictures are held until the next
/// anchor has been emitted, so the coded order diverges from the submission
/// order exactly the way a lookahead encoder's would.
pub struct RlvEncoder {
    config: Option<EncoderConfig>,
    prediction: Prediction,
    opened: bool,
    did_flush: bool,
    frames_in: u64,
    reference: Option<FrameBuffer>,
    held: VecDeque<EncodedChunk>,
    ready: VecDeque<EncodedChunk>,
}

impl RlvEncoder {
    pub fn new() -> Self {
        Self {
            config: None,
            prediction: Prediction::None,
            opened: false,
            did_flush: false,
            frames_in: 0,
            reference: None,
            held: VecDeque::new(),
            ready: VecDeque::new(),
        }
    }

    fn encode_frame(&self, frame: &FrameBuffer, kind: FrameKind) -> EncodedChunk {
        let reference = match (kind, self.prediction) {
            (FrameKind::Intra, _) | (_, Prediction::None) => None,
            _ => self.reference.as_ref(),
        };

        let mut payload = Vec::new();
        for index in 0..frame.plane_count() {
            let plane = frame.plane(index);
            let mut encoded = Vec::new();
            match reference {
                Some(reference) => {
                    let reference = reference.plane(index);
                    let mut difference = Vec::with_capacity(plane.width());
                    for y in 0..plane.height() {
                        difference.clear();
                        difference.extend(
                            plane
                                .row(y)
                                .iter()
                                .zip(reference.row(y))
                                .map(|(current, previous)| current.wrapping_sub(*previous)),
                        );
                        rle_row(&mut encoded, &difference);
                    }
                }
                None => {
                    for y in 0..plane.height() {
                        rle_row(&mut encoded, plane.row(y));
                    }
                }
            }
            let mut length = [0; 4];
            BigEndian::write_u32(&mut length, encoded.len() as u32);
            payload.extend_from_slice(&length);
            payload.extend_from_slice(&encoded);
        }

        let mut data = Vec::with_capacity(PACKET_HEADER_LEN + payload.len());
        data.extend_from_slice(&PACKET_MAGIC);
        data.push(kind.tag());
        let mut fixed = [0; 12];
        BigEndian::write_i64(&mut fixed[..8], frame.pts());
        BigEndian::write_u32(&mut fixed[8..], payload.len() as u32);
        data.extend_from_slice(&fixed);
        data.extend_from_slice(&payload);

        EncodedChunk {
            pts: frame.pts(),
            key: kind == FrameKind::Intra,
            data,
        }
    }
}

impl Default for RlvEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(config: &EncoderConfig, index: u64) -> FrameKind {
    let position = index % u64::from(config.gop_size);
    if position == 0 {
        FrameKind::Intra
    } else if config.max_b_frames == 0 || position % u64::from(config.max_b_frames + 1) == 0 {
        FrameKind::Forward
    } else {
        FrameKind::Bidirectional
    }
}

fn rle_row(out: &mut Vec<u8>, row: &[u8]) {
    let mut index = 0;
    while index < row.len() {
        let value = row[index];
        let mut run = 1;
        while run < 255 && index + run < row.len() && row[index + run] == value {
            run += 1;
        }
        out.push(run as u8);
        out.push(value);
        index += run;
    }
}

impl CodecBackend for RlvEncoder {
    type Error = RlvEncoderError;

    fn configure(&mut self, config: &EncoderConfig) -> Result<()> {
        if self.opened {
            return Err(RlvEncoderError::Handshake {
                operation: "reconfiguring an open encoder",
            });
        }
        if config.width == 0 || config.height == 0 {
            return Err(RlvEncoderError::Unsupported {
                reason: "zero picture dimension",
            });
        }
        if config.gop_size == 0 {
            return Err(RlvEncoderError::Unsupported {
                reason: "zero group-of-pictures size",
            });
        }
        if config.max_b_frames > MAX_B_FRAMES {
            return Err(RlvEncoderError::Unsupported {
                reason: "too many consecutive bidirectional frames",
            });
        }

        let mut prediction = Prediction::None;
        for (name, value) in &config.options {
            match name.as_str() {
                "predict" => {
                    prediction = match value.as_str() {
                        "none" => Prediction::None,
                        "delta" => Prediction::Delta,
                        _ => {
                            return Err(RlvEncoderError::InvalidOptionValue {
                                name: name.clone(),
                                value: value.clone(),
                            })
                        }
                    }
                }
                _ => return Err(RlvEncoderError::UnknownOption { name: name.clone() }),
            }
        }

        self.prediction = prediction;
        self.config = Some(config.clone());
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        if self.opened {
            return Err(RlvEncoderError::Handshake {
                operation: "opening an open encoder",
            });
        }
        if self.config.is_none() {
            return Err(RlvEncoderError::Handshake {
                operation: "opening an unconfigured encoder",
            });
        }
        self.opened = true;
        Ok(())
    }

    fn submit(&mut self, frame: Option<&FrameBuffer>) -> Result<()> {
        if !self.opened {
            return Err(RlvEncoderError::Handshake {
                operation: "submitting to a closed encoder",
            });
        }
        if self.did_flush {
            return Err(RlvEncoderError::Handshake {
                operation: "submitting after end of stream",
            });
        }
        match frame {
            Some(frame) => {
                let kind = match &self.config {
                    Some(config) => classify(config, self.frames_in),
                    None => {
                        return Err(RlvEncoderError::Handshake {
                            operation: "submitting to an unconfigured encoder",
                        })
                    }
                };
                let chunk = self.encode_frame(frame, kind);
                match kind {
                    FrameKind::Intra | FrameKind::Forward => {
                        self.ready.push_back(chunk);
                        self.ready.append(&mut self.held);
                        self.reference = Some(frame.clone());
                    }
                    FrameKind::Bidirectional => self.held.push_back(chunk),
                }
                self.frames_in += 1;
            }
            None => {
                self.ready.append(&mut self.held);
                self.did_flush = true;
            }
        }
        Ok(())
    }

    fn drain(&mut self, packet: &mut PacketBuffer) -> Result<DrainOutcome> {
        if !self.opened {
            return Err(RlvEncoderError::Handshake {
                operation: "draining a closed encoder",
            });
        }
        match self.ready.pop_front() {
            Some(chunk) => {
                packet.clear();
                packet.data.extend_from_slice(&chunk.data);
                packet.pts = chunk.pts;
                packet.key = chunk.key;
                Ok(DrainOutcome::Ready)
            }
            None if self.did_flush => Ok(DrainOutcome::EndOfStream),
            None => Ok(DrainOutcome::NotReady),
        }
    }

    fn close(&mut self) {
        self.config = None;
        self.prediction = Prediction::None;
        self.opened = false;
        self.did_flush = false;
        self.frames_in = 0;
        self.reference = None;
        self.held.clear();
        self.ready.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use codec_traits::{PixelFormat, Rational};

    fn test_config(max_b_frames: u32) -> EncoderConfig {
        EncoderConfig {
            bit_rate: 400_000,
            width: 64,
            height: 48,
            time_base: Rational::new(1, 25),
            frame_rate: Rational::new(25, 1),
            gop_size: 10,
            max_b_frames,
            pixel_format: PixelFormat::Yuv420Planar,
            options: vec![],
        }
    }

    fn test_frame(config: &EncoderConfig, index: u64) -> FrameBuffer {
        let mut frame = FrameBuffer::from_config(config);
        for plane in 0..frame.plane_count() {
            let mut plane = frame.plane_mut(plane);
            for y in 0..plane.height() {
                for (x, sample) in plane.row_mut(y).iter_mut().enumerate() {
                    *sample = (x + y + index as usize * 3) as u8;
                }
            }
        }
        frame.set_pts(index as i64);
        frame
    }

    fn open_encoder(config: &EncoderConfig) -> RlvEncoder {
        let mut encoder = RlvEncoder::new();
        encoder.configure(config).unwrap();
        encoder.open().unwrap();
        encoder
    }

    fn drain_ready(encoder: &mut RlvEncoder) -> Vec<PacketBuffer> {
        let mut packet = PacketBuffer::new();
        let mut out = vec![];
        while let DrainOutcome::Ready = encoder.drain(&mut packet).unwrap() {
            out.push(packet.clone());
        }
        out
    }

    #[test]
    fn test_reordered_emission() {
        let config = test_config(1);
        let mut encoder = open_encoder(&config);

        let mut emitted = vec![];
        for index in 0..6 {
            encoder.submit(Some(&test_frame(&config, index))).unwrap();
            emitted.extend(drain_ready(&mut encoder).into_iter().map(|p| p.pts));
        }
        encoder.submit(None).unwrap();
        emitted.extend(drain_ready(&mut encoder).into_iter().map(|p| p.pts));

        assert_eq!(emitted, vec![0, 2, 1, 4, 3, 5]);

        let mut packet = PacketBuffer::new();
        assert_eq!(encoder.drain(&mut packet).unwrap(), DrainOutcome::EndOfStream);
    }

    #[test]
    fn test_in_order_emission_without_b_frames() {
        let config = test_config(0);
        let mut encoder = open_encoder(&config);

        for index in 0..5 {
            encoder.submit(Some(&test_frame(&config, index))).unwrap();
            let packets = drain_ready(&mut encoder);
            assert_eq!(packets.len(), 1);
            assert_eq!(packets[0].pts, index as i64);
        }
    }

    #[test]
    fn test_not_ready_while_b_frame_is_held() {
        let config = test_config(1);
        let mut encoder = open_encoder(&config);
        let mut packet = PacketBuffer::new();

        assert_eq!(encoder.drain(&mut packet).unwrap(), DrainOutcome::NotReady);

        encoder.submit(Some(&test_frame(&config, 0))).unwrap();
        assert_eq!(encoder.drain(&mut packet).unwrap(), DrainOutcome::Ready);

        encoder.submit(Some(&test_frame(&config, 1))).unwrap();
        assert_eq!(encoder.drain(&mut packet).unwrap(), DrainOutcome::NotReady);
    }

    #[test]
    fn test_end_of_stream_only_after_sentinel() {
        let config = test_config(1);
        let mut encoder = open_encoder(&config);
        let mut packet = PacketBuffer::new();

        encoder.submit(Some(&test_frame(&config, 0))).unwrap();
        drain_ready(&mut encoder);
        encoder.submit(None).unwrap();

        assert_eq!(encoder.drain(&mut packet).unwrap(), DrainOutcome::EndOfStream);
        assert_eq!(encoder.drain(&mut packet).unwrap(), DrainOutcome::EndOfStream);

        let err = encoder.submit(Some(&test_frame(&config, 1))).unwrap_err();
        assert!(matches!(err, RlvEncoderError::Handshake { .. }));
    }

    #[test]
    fn test_handshake_enforcement() {
        let config = test_config(1);

        let mut encoder = RlvEncoder::new();
        let err = encoder.submit(Some(&test_frame(&config, 0))).unwrap_err();
        assert!(matches!(err, RlvEncoderError::Handshake { .. }));
        let err = encoder.open().unwrap_err();
        assert!(matches!(err, RlvEncoderError::Handshake { .. }));

        let mut encoder = open_encoder(&config);
        let err = encoder.configure(&config).unwrap_err();
        assert!(matches!(err, RlvEncoderError::Handshake { .. }));
        let err = encoder.open().unwrap_err();
        assert!(matches!(err, RlvEncoderError::Handshake { .. }));
    }

    #[test]
    fn test_option_parsing() {
        let mut config = test_config(1);
        config.set_option("bogus", "1");
        let err = RlvEncoder::new().configure(&config).unwrap_err();
        assert!(matches!(err, RlvEncoderError::UnknownOption { .. }));

        let mut config = test_config(1);
        config.set_option("predict", "sideways");
        let err = RlvEncoder::new().configure(&config).unwrap_err();
        assert!(matches!(err, RlvEncoderError::InvalidOptionValue { .. }));

        let mut config = test_config(1);
        config.set_option("predict", "delta");
        RlvEncoder::new().configure(&config).unwrap();
    }

    #[test]
    fn test_unsupported_configurations() {
        let mut config = test_config(MAX_B_FRAMES + 1);
        let err = RlvEncoder::new().configure(&config).unwrap_err();
        assert!(matches!(err, RlvEncoderError::Unsupported { .. }));

        config = test_config(1);
        config.width = 0;
        let err = RlvEncoder::new().configure(&config).unwrap_err();
        assert!(matches!(err, RlvEncoderError::Unsupported { .. }));
    }

    #[test]
    fn test_delta_prediction_changes_predicted_payloads() {
        let mut with_delta = vec![];
        let mut without_delta = vec![];
        for (predict, out) in [("delta", &mut with_delta), ("none", &mut without_delta)] {
            let mut config = test_config(0);
            config.set_option("predict", predict);
            let mut encoder = open_encoder(&config);
            for index in 0..2 {
                encoder.submit(Some(&test_frame(&config, index))).unwrap();
                out.extend(drain_ready(&mut encoder));
            }
        }

        // Intra packets ignore the prediction mode; forward packets do not.
        assert_eq!(with_delta[0].data, without_delta[0].data);
        assert_ne!(with_delta[1].data, without_delta[1].data);
        assert!(with_delta[0].key);
        assert!(!with_delta[1].key);
    }

    #[test]
    fn test_packet_layout() {
        let config = test_config(1);
        let mut encoder = open_encoder(&config);
        encoder.submit(Some(&test_frame(&config, 0))).unwrap();
        let packets = drain_ready(&mut encoder);

        let data = &packets[0].data;
        assert_eq!(data[..4], PACKET_MAGIC);
        assert_eq!(data[4], b'I');
        assert_eq!(BigEndian::read_i64(&data[5..13]), 0);
        let payload_len = BigEndian::read_u32(&data[13..17]) as usize;
        assert_eq!(data.len(), PACKET_HEADER_LEN + payload_len);

        // The payload is three length-prefixed plane sections.
        let mut offset = PACKET_HEADER_LEN;
        for _ in 0..3 {
            let section = BigEndian::read_u32(&data[offset..offset + 4]) as usize;
            offset += 4 + section;
        }
        assert_eq!(offset, data.len());
    }

    #[test]
    fn test_deterministic_output() {
        let mut runs = vec![];
        for _ in 0..2 {
            let mut config = test_config(2);
            config.set_option("predict", "delta");
            let mut encoder = open_encoder(&config);
            let mut stream = vec![];
            for index in 0..12 {
                encoder.submit(Some(&test_frame(&config, index))).unwrap();
                for packet in drain_ready(&mut encoder) {
                    stream.extend_from_slice(&packet.data);
                }
            }
            encoder.submit(None).unwrap();
            for packet in drain_ready(&mut encoder) {
                stream.extend_from_slice(&packet.data);
            }
            runs.push(stream);
        }
        assert_eq!(runs[0], runs[1]);
    }
}
