use crate::{EncoderConfig, FrameBuffer, PacketBuffer};

/// Result of one drain attempt.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DrainOutcome {
    /// The packet slot was filled with one compressed unit.
    Ready,
    /// The encoder needs more input before it can emit anything.
    NotReady,
    /// Every buffered frame has been emitted; the stream is complete.
    EndOfStream,
}

/// A stateful compression engine driven through a submit/drain handshake.
///
/// `submit(None)` is the end-of-stream sentinel: no further frames follow,
/// and subsequent drains run the encoder dry. Output may lag input (e.g.
/// bidirectional prediction buffers several frames before the first packet
/// appears) and may be reordered relative to submission, but each accepted
/// frame eventually yields its packet. Typical usage:
///
/// ```
/// # use codec_traits::{CodecBackend, DrainOutcome, EncoderConfig, FrameBuffer, PacketBuffer};
/// fn encode<B, I>(mut backend: B, frames: I, config: &EncoderConfig) -> Result<Vec<PacketBuffer>, B::Error>
///     where B: CodecBackend,
///     I: Iterator<Item = FrameBuffer>,
/// {
///     let mut packet = PacketBuffer::new();
///     let mut out = Vec::new();
///     backend.configure(config)?;
///     backend.open()?;
///     for frame in frames {
///         backend.submit(Some(&frame))?;
///         while let DrainOutcome::Ready = backend.drain(&mut packet)? {
///             out.push(packet.clone());
///         }
///     }
///     backend.submit(None)?;
///     loop {
///         match backend.drain(&mut packet)? {
///             DrainOutcome::Ready => out.push(packet.clone()),
///             DrainOutcome::NotReady => continue,
///             DrainOutcome::EndOfStream => break,
///         }
///     }
///     backend.close();
///     Ok(out)
/// }
/// ```
pub trait CodecBackend {
    type Error;

    /// Applies the configuration. Must precede `open`.
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), Self::Error>;

    /// Opens the engine with the previously applied configuration.
    fn open(&mut self) -> Result<(), Self::Error>;

    /// Sends one frame, or the end-of-stream sentinel, to the engine. The
    /// frame is read during the call and retained only by cloning.
    fn submit(&mut self, frame: Option<&FrameBuffer>) -> Result<(), Self::Error>;

    /// Asks the engine for one ready packet, overwriting `packet` on
    /// [`DrainOutcome::Ready`].
    fn drain(&mut self, packet: &mut PacketBuffer) -> Result<DrainOutcome, Self::Error>;

    /// Releases the engine context. Safe to call more than once.
    fn close(&mut self);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_codec_backend_object_safety() {
        let _e: *const dyn CodecBackend<Error = ()>;
    }
}
