use crate::codecs::{self, CodecEngine};
use codec_traits::{CodecBackend, DrainOutcome, EncoderConfig, FrameBuffer, PacketBuffer};
use scopeguard::{guard, ScopeGuard};
use snafu::Snafu;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionState {
    Unopened,
    Open,
    Flushing,
    /// Flush completed; nothing left to drain.
    Finished,
    Closed,
}

#[derive(Debug, Snafu)]
pub enum EncoderSessionError {
    #[snafu(display("unknown codec {name:?}"))]
    UnknownCodec { name: String },
    #[snafu(display("invalid configuration: {reason}"))]
    InvalidConfiguration { reason: &'static str },
    #[snafu(display("unable to {operation}: {source}"))]
    Resource { operation: &'static str, source: BoxError },
    #[snafu(display("error while trying to {operation}: {source}"))]
    Encode { operation: &'static str, source: BoxError },
    #[snafu(display("encoder signaled end of stream before a flush was requested"))]
    PrematureEndOfStream,
    #[snafu(display("encoder stalled during flush"))]
    FlushStalled,
    #[snafu(display("{operation} called on a session in the {state:?} state"))]
    InvalidState { operation: &'static str, state: SessionState },
    #[snafu(display("frame timestamp {pts} is not after the previous timestamp {last}"))]
    NonMonotonicTimestamp { pts: i64, last: i64 },
    #[snafu(display("frame geometry does not match the session configuration"))]
    FrameMismatch,
}

type Result<T> = core::result::Result<T, EncoderSessionError>;

/// One encode session: a codec backend driven through its submit/drain
/// handshake, with the protocol state tracked and enforced on every call.
///
/// The session exclusively owns its backend until closed; the backend is
/// released when `close` is first called, or on drop. Any backend failure is
/// fatal and closes the session immediately. A session is not safe for
/// concurrent use; callers running on multiple threads must serialize access
/// externally.
pub struct EncoderSession<B: CodecBackend> {
    backend: B,
    state: SessionState,
    config: Option<EncoderConfig>,
    packet: PacketBuffer,
    last_pts: i64,
}

impl<B: CodecBackend> EncoderSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: SessionState::Unopened,
            config: None,
            packet: PacketBuffer::new(),
            last_pts: -1,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> Option<&EncoderConfig> {
        self.config.as_ref()
    }

    /// Releases the backend. Calling this more than once is a no-op.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.backend.close();
            self.state = SessionState::Closed;
            log::debug!("encoder session closed");
        }
    }
}

impl<B> EncoderSession<B>
where
    B: CodecBackend,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    /// Validates the configuration, applies it to the backend, and opens the
    /// backend. On failure the backend is released and the session is left
    /// closed.
    pub fn open(&mut self, config: &EncoderConfig) -> Result<()> {
        if self.state != SessionState::Unopened {
            return Err(EncoderSessionError::InvalidState {
                operation: "open",
                state: self.state,
            });
        }
        // Every early exit below leaves the session closed.
        self.state = SessionState::Closed;
        validate(config)?;

        let mut backend = guard(&mut self.backend, |backend| backend.close());
        backend.configure(config).map_err(|e| EncoderSessionError::Resource {
            operation: "configure the encoder",
            source: Box::new(e),
        })?;
        backend.open().map_err(|e| EncoderSessionError::Resource {
            operation: "open the encoder",
            source: Box::new(e),
        })?;
        ScopeGuard::into_inner(backend);

        self.config = Some(config.clone());
        self.last_pts = -1;
        self.state = SessionState::Open;
        log::debug!(
            "encoder session opened: {}x{} {:?}, gop {}, max {} b-frames",
            config.width,
            config.height,
            config.pixel_format,
            config.gop_size,
            config.max_b_frames
        );
        Ok(())
    }

    /// Sends one frame to the backend. Timestamps must be nonnegative and
    /// strictly increasing across the session.
    pub fn submit(&mut self, frame: &FrameBuffer) -> Result<()> {
        if self.state != SessionState::Open {
            return Err(EncoderSessionError::InvalidState {
                operation: "submit",
                state: self.state,
            });
        }
        if let Some(config) = &self.config {
            if frame.format() != config.pixel_format
                || frame.width() != config.width
                || frame.height() != config.height
            {
                return Err(EncoderSessionError::FrameMismatch);
            }
        }
        if frame.pts() <= self.last_pts {
            return Err(EncoderSessionError::NonMonotonicTimestamp {
                pts: frame.pts(),
                last: self.last_pts,
            });
        }
        if let Err(e) = self.backend.submit(Some(frame)) {
            self.close();
            return Err(EncoderSessionError::Encode {
                operation: "submit a frame",
                source: Box::new(e),
            });
        }
        self.last_pts = frame.pts();
        Ok(())
    }

    /// One bounded drain attempt. Returns the next ready packet, or `None`
    /// when the backend wants more input before it can emit (or when a
    /// completed flush has drained the stream dry). The returned borrow is
    /// released by the next call on the session, which reuses the slot.
    pub fn drain(&mut self) -> Result<Option<&PacketBuffer>> {
        match self.state {
            SessionState::Open | SessionState::Flushing => {}
            SessionState::Finished => return Ok(None),
            state => {
                return Err(EncoderSessionError::InvalidState {
                    operation: "drain",
                    state,
                })
            }
        }
        match self.backend.drain(&mut self.packet) {
            Ok(DrainOutcome::Ready) => Ok(Some(&self.packet)),
            Ok(DrainOutcome::NotReady) => Ok(None),
            Ok(DrainOutcome::EndOfStream) => {
                if self.state == SessionState::Flushing {
                    self.state = SessionState::Finished;
                    Ok(None)
                } else {
                    self.close();
                    Err(EncoderSessionError::PrematureEndOfStream)
                }
            }
            Err(e) => {
                self.close();
                Err(EncoderSessionError::Encode {
                    operation: "drain a packet",
                    source: Box::new(e),
                })
            }
        }
    }

    /// Terminates the stream: the first call submits the end-of-stream
    /// sentinel, and each call yields one buffered packet until the backend
    /// reports end of stream. Call until `Ok(None)`, after which the session
    /// is finished and only `close` remains.
    pub fn flush(&mut self) -> Result<Option<&PacketBuffer>> {
        match self.state {
            SessionState::Open => {
                if let Err(e) = self.backend.submit(None) {
                    self.close();
                    return Err(EncoderSessionError::Encode {
                        operation: "submit the end-of-stream sentinel",
                        source: Box::new(e),
                    });
                }
                self.state = SessionState::Flushing;
                log::debug!("encoder session flushing after pts {}", self.last_pts);
            }
            SessionState::Flushing => {}
            SessionState::Finished => return Ok(None),
            state => {
                return Err(EncoderSessionError::InvalidState {
                    operation: "flush",
                    state,
                })
            }
        }
        match self.backend.drain(&mut self.packet) {
            Ok(DrainOutcome::Ready) => Ok(Some(&self.packet)),
            Ok(DrainOutcome::EndOfStream) => {
                self.state = SessionState::Finished;
                Ok(None)
            }
            // There is no further input to offer, so the backend cannot make
            // progress; a stall here would loop forever.
            Ok(DrainOutcome::NotReady) => {
                self.close();
                Err(EncoderSessionError::FlushStalled)
            }
            Err(e) => {
                self.close();
                Err(EncoderSessionError::Encode {
                    operation: "drain during flush",
                    source: Box::new(e),
                })
            }
        }
    }
}

impl EncoderSession<CodecEngine> {
    /// Looks up `codec` in the registry and opens a session for it.
    pub fn open_codec(codec: &str, config: &EncoderConfig) -> Result<Self> {
        let descriptor = match codecs::find(codec) {
            Some(descriptor) => descriptor,
            None => {
                return Err(EncoderSessionError::UnknownCodec { name: codec.into() });
            }
        };
        let mut session = Self::new(descriptor.new_engine());
        session.open(config)?;
        Ok(session)
    }
}

impl<B: CodecBackend> Drop for EncoderSession<B> {
    fn drop(&mut self) {
        self.close();
    }
}

fn validate(config: &EncoderConfig) -> Result<()> {
    let reason = if config.width == 0 || config.height == 0 {
        Some("picture dimensions must be nonzero")
    } else if config.time_base.den == 0 {
        Some("time base denominator must be nonzero")
    } else if config.frame_rate.den == 0 {
        Some("frame rate denominator must be nonzero")
    } else if config.gop_size == 0 {
        Some("group-of-pictures size must be nonzero")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(EncoderSessionError::InvalidConfiguration { reason }),
        None => Ok(()),
    }
}
