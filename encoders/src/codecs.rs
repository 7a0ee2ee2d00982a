use codec_traits::{CodecBackend, DrainOutcome, EncoderConfig, FrameBuffer, PacketBuffer};
use rawvideo::{RawVideoEncoder, RawVideoEncoderError};
use rlv::{RlvEncoder, RlvEncoderError};
use snafu::Snafu;

/// Trailer appended after the last packet of codecs that require legacy
/// sequence-end signaling.
pub const SEQUENCE_END_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xb7];

/// A codec backend implemented by any of this crate's bundled engines.
pub enum CodecEngine {
    Rlv(RlvEncoder),
    RawVideo(RawVideoEncoder),
}

#[derive(Debug, Snafu)]
pub enum CodecEngineError {
    #[snafu(context(false), display("rlv encoder error"))]
    Rlv { source: RlvEncoderError },
    #[snafu(context(false), display("rawvideo encoder error"))]
    RawVideo { source: RawVideoEncoderError },
}

impl CodecBackend for CodecEngine {
    type Error = CodecEngineError;

    fn configure(&mut self, config: &EncoderConfig) -> Result<(), CodecEngineError> {
        match self {
            Self::Rlv(e) => e.configure(config)?,
            Self::RawVideo(e) => e.configure(config)?,
        }
        Ok(())
    }

    fn open(&mut self) -> Result<(), CodecEngineError> {
        match self {
            Self::Rlv(e) => e.open()?,
            Self::RawVideo(e) => e.open()?,
        }
        Ok(())
    }

    fn submit(&mut self, frame: Option<&FrameBuffer>) -> Result<(), CodecEngineError> {
        match self {
            Self::Rlv(e) => e.submit(frame)?,
            Self::RawVideo(e) => e.submit(frame)?,
        }
        Ok(())
    }

    fn drain(&mut self, packet: &mut PacketBuffer) -> Result<DrainOutcome, CodecEngineError> {
        Ok(match self {
            Self::Rlv(e) => e.drain(packet)?,
            Self::RawVideo(e) => e.drain(packet)?,
        })
    }

    fn close(&mut self) {
        match self {
            Self::Rlv(e) => e.close(),
            Self::RawVideo(e) => e.close(),
        }
    }
}

/// Identity and capabilities of a registered codec.
pub struct CodecDescriptor {
    pub name: &'static str,
    pub long_name: &'static str,
    /// Trailer bytes the finished bitstream must end with, for codecs that
    /// require legacy sequence-end signaling.
    pub sequence_end_code: Option<&'static [u8]>,
    new_engine: fn() -> CodecEngine,
}

impl CodecDescriptor {
    pub fn new_engine(&self) -> CodecEngine {
        (self.new_engine)()
    }
}

fn new_rlv() -> CodecEngine {
    CodecEngine::Rlv(RlvEncoder::new())
}

fn new_rawvideo() -> CodecEngine {
    CodecEngine::RawVideo(RawVideoEncoder::new())
}

/// Registered codecs, in lookup order. The table is read-only; there is no
/// runtime registration.
pub const CODECS: &[CodecDescriptor] = &[
    CodecDescriptor {
        name: "rlv",
        long_name: "Run-length video",
        sequence_end_code: Some(&SEQUENCE_END_CODE),
        new_engine: new_rlv,
    },
    CodecDescriptor {
        name: "rawvideo",
        long_name: "Uncompressed planar video",
        sequence_end_code: None,
        new_engine: new_rawvideo,
    },
];

/// Finds a registered codec by name.
pub fn find(name: &str) -> Option<&'static CodecDescriptor> {
    CODECS.iter().find(|codec| codec.name == name)
}
