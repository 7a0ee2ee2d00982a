use codec_traits::{EncoderConfig, FrameBuffer, PacketBuffer};
use encoders::{EncoderSession, EncoderSessionError};
use snafu::Snafu;
use std::io::Write;

#[derive(Debug, Snafu)]
pub enum DriverError {
    #[snafu(display("unknown codec {name:?}"))]
    UnknownCodec { name: String },
    #[snafu(context(false), display("encoder session error"))]
    Session { source: EncoderSessionError },
    #[snafu(context(false), display("bitstream write failed"))]
    Io { source: std::io::Error },
}

type Result<T> = core::result::Result<T, DriverError>;

/// Supplies raw picture content for successive frame indices.
pub trait FrameSource {
    fn fill_frame(&mut self, frame: &mut FrameBuffer, index: u64);
}

/// Synthetic test pattern: the luma plane ramps diagonally and the chroma
/// planes drift at different per-frame rates, so every frame differs from
/// the last and motion is visible across the sequence.
pub struct MovingGradient;

impl FrameSource for MovingGradient {
    fn fill_frame(&mut self, frame: &mut FrameBuffer, index: u64) {
        let i = index as usize;
        let mut luma = frame.plane_mut(0);
        for y in 0..luma.height() {
            for (x, sample) in luma.row_mut(y).iter_mut().enumerate() {
                *sample = (x + y + i * 3) as u8;
            }
        }
        let mut cb = frame.plane_mut(1);
        for y in 0..cb.height() {
            for sample in cb.row_mut(y).iter_mut() {
                *sample = (128 + y + i * 2) as u8;
            }
        }
        let mut cr = frame.plane_mut(2);
        for y in 0..cr.height() {
            for (x, sample) in cr.row_mut(y).iter_mut().enumerate() {
                *sample = (64 + x + i * 5) as u8;
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EncodeStats {
    pub frames_submitted: u64,
    pub packets_written: u64,
    pub bytes_written: u64,
}

/// Encodes `frames` generated pictures with the named codec and writes the
/// resulting elementary bitstream to `sink`, terminated by the codec's
/// sequence-end code when it declares one. Writes are append-only and
/// sequential; one frame buffer is reused for the whole run.
pub fn run<S, W>(
    codec: &str,
    config: &EncoderConfig,
    frames: u64,
    source: &mut S,
    sink: &mut W,
) -> Result<EncodeStats>
where
    S: FrameSource,
    W: Write,
{
    let descriptor = match encoders::find(codec) {
        Some(descriptor) => descriptor,
        None => return Err(DriverError::UnknownCodec { name: codec.into() }),
    };
    let mut session = EncoderSession::open_codec(codec, config)?;
    let mut frame = FrameBuffer::from_config(config);
    let mut stats = EncodeStats::default();

    for index in 0..frames {
        source.fill_frame(&mut frame, index);
        frame.set_pts(index as i64);
        println!("send frame {:3}", frame.pts());
        session.submit(&frame)?;
        stats.frames_submitted += 1;
        while let Some(packet) = session.drain()? {
            write_packet(packet, sink, &mut stats)?;
        }
    }
    while let Some(packet) = session.flush()? {
        write_packet(packet, sink, &mut stats)?;
    }

    if let Some(end_code) = descriptor.sequence_end_code {
        sink.write_all(end_code)?;
        stats.bytes_written += end_code.len() as u64;
    }
    sink.flush()?;
    session.close();
    Ok(stats)
}

fn write_packet<W: Write>(packet: &PacketBuffer, sink: &mut W, stats: &mut EncodeStats) -> Result<()> {
    println!("write packet {:3} (size={:5})", packet.pts, packet.data.len());
    sink.write_all(&packet.data)?;
    stats.packets_written += 1;
    stats.bytes_written += packet.data.len() as u64;
    Ok(())
}
