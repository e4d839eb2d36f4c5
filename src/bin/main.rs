//! CLI for the GAP codec.
//!
//! ```bash
//! gap-codec encode -i input.png -o output.gap -s 0.1 -t 0.5
//! gap-codec decode -i input.gap -o output.png
//! gap-codec info -i input.gap
//! ```

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::info;

use gap_codec::{GapDecoder, GapEncoder, GapHeader};

#[derive(Parser)]
#[command(
    name = "gap-codec",
    version,
    about = "GAP: gradient-aligned patch image codec"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a PNG/JPEG image into a .gap bitstream
    Encode {
        /// Input image path
        #[arg(short = 'i', long)]
        input: PathBuf,
        /// Output .gap path
        #[arg(short = 'o', long)]
        output: PathBuf,
        /// Polylog decay (spectral shaping strength)
        #[arg(short = 's', long, default_value_t = 0.1)]
        s: f32,
        /// Sparsifier threshold
        #[arg(short = 't', long, default_value_t = 0.5)]
        threshold: f32,
    },
    /// Decode a .gap bitstream to a PNG image
    Decode {
        /// Input .gap path
        #[arg(short = 'i', long)]
        input: PathBuf,
        /// Output image path (always written as PNG)
        #[arg(short = 'o', long)]
        output: PathBuf,
    },
    /// Show the header of a .gap bitstream
    Info {
        /// Input .gap path
        #[arg(short = 'i', long)]
        input: PathBuf,
    },
}

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Encode {
            input,
            output,
            s,
            threshold,
        } => cmd_encode(&input, &output, s, threshold),
        Commands::Decode { input, output } => cmd_decode(&input, &output),
        Commands::Info { input } => cmd_info(&input),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn cmd_encode(input: &PathBuf, output: &PathBuf, s: f32, threshold: f32) -> Result<(), String> {
    let img = image::open(input)
        .map_err(|e| format!("read {}: {e}", input.display()))?
        .to_rgb8();
    let (width, height) = img.dimensions();

    let encoder = GapEncoder::new(s, threshold).map_err(|e| e.to_string())?;
    let bytes = encoder
        .encode_rgb(img.as_raw(), width, height)
        .map_err(|e| e.to_string())?;

    fs::write(output, &bytes).map_err(|e| format!("write {}: {e}", output.display()))?;

    let raw_size = img.as_raw().len();
    let ratio = if raw_size == 0 {
        0.0
    } else {
        bytes.len() as f64 / raw_size as f64
    };
    info!(
        "encoded {}x{} ({} bytes) -> {} bytes ({:.1}% ratio, s={s}, t={threshold})",
        width,
        height,
        raw_size,
        bytes.len(),
        ratio * 100.0,
    );
    Ok(())
}

fn cmd_decode(input: &PathBuf, output: &PathBuf) -> Result<(), String> {
    let data = fs::read(input).map_err(|e| format!("read {}: {e}", input.display()))?;

    let decoded = GapDecoder::new().decode(&data).map_err(|e| e.to_string())?;

    image::save_buffer_with_format(
        output,
        &decoded.rgba,
        decoded.width,
        decoded.height,
        image::ExtendedColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .map_err(|e| format!("write {}: {e}", output.display()))?;

    info!(
        "decoded {}x{} -> {} (PNG)",
        decoded.width,
        decoded.height,
        output.display()
    );
    Ok(())
}

fn cmd_info(input: &PathBuf) -> Result<(), String> {
    let data = fs::read(input).map_err(|e| format!("read {}: {e}", input.display()))?;
    let header = GapHeader::from_bytes(&data).map_err(|e| e.to_string())?;

    println!("GAP Bitstream Info");
    println!("  File:       {}", input.display());
    println!("  File size:  {} bytes", data.len());
    println!("  Width:      {}", header.width);
    println!("  Height:     {}", header.height);
    println!("  S:          {}", header.s);
    println!("  Threshold:  {}", header.threshold);
    println!("  Flags:      {:#06b}", header.flags);
    println!("  Channels:   {}", header.channels);
    Ok(())
}
