//! framekit feeder: entry point.
//!
//! ```text
//! framekit-feeder run [--config <path>] [--frames N]   Play the configured sequence
//! framekit-feeder convert --input F --output F ...     RGB capture to raw YUV
//! framekit-feeder golomb <HEX> [--signed] [--count N]  Decode exp-Golomb fields
//! framekit-feeder gen-config                           Write default config to stdout
//! ```

use std::fs::OpenOptions;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use framekit_core::{ChromaSampling, PixelFormat};
use framekit_feeder::config::FeederConfig;
use framekit_feeder::service::FeederService;
use framekit_feeder::tools::{self, ConvertJob};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framekit-feeder", about = "Pooled YUV frame source and conversion tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play the configured YUV sequence through the frame pool.
    Run {
        /// Path to configuration TOML file.
        #[arg(short, long, default_value = "framekit-feeder.toml")]
        config: PathBuf,

        /// Stop after this many frames instead of running until Ctrl-C.
        #[arg(long)]
        frames: Option<u64>,
    },

    /// Convert a packed RGB image file into a raw planar YUV file.
    ///
    /// `[video]` sampling and ROI and `[color]` are read from the config.
    Convert {
        /// Path to configuration TOML file.
        #[arg(short, long, default_value = "framekit-feeder.toml")]
        config: PathBuf,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long, value_enum, default_value_t = RgbFormat::Bgra)]
        format: RgbFormat,
        /// Overrides the configured chroma sampling.
        #[arg(long, value_enum)]
        sampling: Option<Sampling>,
        /// Clamp chroma instead of wrapping it, whatever `[color]` says.
        #[arg(long)]
        saturate: bool,
    },

    /// Decode exp-Golomb fields from a hex string.
    Golomb {
        /// Bytes as hex, e.g. "a64280".
        hex: String,
        /// Decode signed se(v) fields.
        #[arg(long)]
        signed: bool,
        /// Number of fields to decode; all that fit when omitted.
        #[arg(long)]
        count: Option<usize>,
    },

    /// Print the default configuration to stdout and exit.
    GenConfig,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RgbFormat {
    Bgra,
    Rgba,
    Bgr,
    Rgb,
}

impl From<RgbFormat> for PixelFormat {
    fn from(f: RgbFormat) -> Self {
        match f {
            RgbFormat::Bgra => PixelFormat::Bgra8,
            RgbFormat::Rgba => PixelFormat::Rgba8,
            RgbFormat::Bgr => PixelFormat::Bgr8,
            RgbFormat::Rgb => PixelFormat::Rgb8,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Sampling {
    #[value(name = "420")]
    S420,
    #[value(name = "444")]
    S444,
}

impl From<Sampling> for ChromaSampling {
    fn from(s: Sampling) -> Self {
        match s {
            Sampling::S420 => ChromaSampling::Yuv420,
            Sampling::S444 => ChromaSampling::Yuv444,
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenConfig => {
            let text = toml::to_string_pretty(&FeederConfig::default())?;
            println!("{text}");
        }

        Command::Run { config, frames } => {
            let config_path = config;
            let config = FeederConfig::load(&config_path);
            init_tracing(&config.logging.level, &config.logging.file)?;

            info!("framekit-feeder v{}", env!("CARGO_PKG_VERSION"));
            info!("config: {}", config_path.display());
            info!(
                "source: {} ({}x{}, {})",
                config.video.source_pattern,
                config.video.width,
                config.video.height,
                config.video.sampling
            );
            info!("target FPS: {}", config.fps());

            let service = FeederService::new(config);
            let stop = service.stop_handle();

            // Ctrl-C handler.
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Ctrl-C received, shutting down");
                stop.store(false, std::sync::atomic::Ordering::SeqCst);
            });

            let stats = service.run(frames).await?;
            info!(
                "played {} frames, dumped {} ({} bytes)",
                stats.frames, stats.frames_dumped, stats.bytes_written
            );
        }

        Command::Convert {
            config,
            input,
            output,
            width,
            height,
            format,
            sampling,
            saturate,
        } => {
            let config = FeederConfig::load(&config);
            init_tracing(&config.logging.level, &config.logging.file)?;
            let job = ConvertJob {
                format: format.into(),
                source: config.to_convert_config(width, height, sampling.map(Into::into), saturate),
            };
            let report = tools::convert_file(&input, &output, &job)?;
            println!("{} bytes  blake3 {}", report.bytes_written, report.digest);
        }

        Command::Golomb { hex, signed, count } => {
            init_tracing("warn", "")?;
            let data = tools::parse_hex(&hex)?;
            let values = tools::decode_exp_golomb(&data, signed, count)?;
            let text: Vec<String> = values.iter().map(i64::to_string).collect();
            println!("{}", text.join(" "));
        }
    }

    Ok(())
}

/// Init tracing: `RUST_LOG` wins over the configured level; a non-empty
/// `file` sends output there instead of stderr.
fn init_tracing(level: &str, file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        let log = OpenOptions::new().create(true).append(true).open(file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(log))
            .init();
    }
    Ok(())
}
