//! Encodes a synthetic test sequence to a raw elementary bitstream.

use anyhow::Context as _;
use clap::Parser;
use codec_traits::{EncoderConfig, PixelFormat, Rational};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use vencode::MovingGradient;

#[derive(Parser)]
struct Args {
    /// Output file for the raw bitstream.
    output: PathBuf,

    /// Codec name, e.g. "rlv" or "rawvideo".
    codec: String,

    #[arg(long, default_value_t = 720)]
    width: u32,

    #[arg(long, default_value_t = 480)]
    height: u32,

    #[arg(long, default_value_t = 25)]
    fps: u32,

    #[arg(long, default_value_t = 25)]
    frames: u64,

    #[arg(long, default_value_t = 400_000)]
    bitrate: u64,

    /// Number of frames from one intra picture to the next.
    #[arg(long, default_value_t = 10)]
    gop_size: u32,

    #[arg(long, default_value_t = 1)]
    max_b_frames: u32,
}

fn main() -> anyhow::Result<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).init()?;
    let args = Args::parse();

    let mut config = EncoderConfig {
        bit_rate: args.bitrate,
        width: args.width,
        height: args.height,
        time_base: Rational::new(1, args.fps),
        frame_rate: Rational::new(args.fps, 1),
        gop_size: args.gop_size,
        max_b_frames: args.max_b_frames,
        pixel_format: PixelFormat::Yuv420Planar,
        options: vec![],
    };
    if args.codec == "rlv" {
        config.set_option("predict", "delta");
    }

    let file = File::create(&args.output)
        .with_context(|| format!("unable to create {}", args.output.display()))?;
    let mut sink = BufWriter::new(file);

    let stats = vencode::run(&args.codec, &config, args.frames, &mut MovingGradient, &mut sink)?;
    log::info!(
        "encoded {} frames into {} packets ({} bytes) at {}",
        stats.frames_submitted,
        stats.packets_written,
        stats.bytes_written,
        args.output.display()
    );
    Ok(())
}
