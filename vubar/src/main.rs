mod capture;
mod config;
mod display;
mod error;
mod pipeline;
mod server;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, RwLock};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vubar_dsp::{BLOCK_SIZE, SPECTRUM_SIZE};
use vubar_viz::{BandAggregator, LedMatrix, LedSink};

use capture::BlockReader;
use config::{DisplayConfig, SharedConfig, DEFAULT_BAND_TABLE};
use display::{ConsoleDisplay, NullSink};
use pipeline::Pipeline;
use server::ServiceState;

#[derive(Parser, Debug)]
#[command(
    name = "vubar",
    about = "Audio spectrum analyzer for addressable LED matrices"
)]
struct Args {
    /// Port for the configuration service
    #[arg(long, default_value_t = 8090)]
    port: u16,

    /// Capture device name (substring match); system default when omitted
    #[arg(long)]
    device: Option<String>,

    /// Band boundaries in Hz, ascending; one display column per band
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    bands: Option<Vec<u32>>,

    /// Number of display rows
    #[arg(long, default_value_t = 10)]
    rows: u16,

    /// Aggregator noise cutoff on the raw magnitude scale
    #[arg(long, default_value_t = 1000.0)]
    noise_threshold: f32,

    /// Run without the console matrix view
    #[arg(long, default_value_t = false)]
    headless: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let bands = args.bands.unwrap_or_else(|| DEFAULT_BAND_TABLE.to_vec());
    if bands.is_empty() {
        bail!("--bands needs at least one boundary");
    }
    if !bands.windows(2).all(|pair| pair[1] > pair[0]) {
        bail!("--bands must be strictly ascending");
    }
    if args.rows == 0 {
        bail!("--rows must be at least 1");
    }

    let rows = args.rows;
    let cols = bands.len() as u16;
    let config: SharedConfig = Arc::new(RwLock::new(DisplayConfig::with_default_palette(
        rows, cols,
    )));
    let paused = Arc::new(AtomicBool::new(false));
    let shutdown = Arc::new(AtomicBool::new(false));

    // The capture stream is not Send, so the whole pipeline is assembled on
    // its own thread; setup failures are reported back before the loop
    // begins and abort startup.
    let (ready_tx, ready_rx) = mpsc::channel();
    {
        let config = config.clone();
        let paused = paused.clone();
        let shutdown = shutdown.clone();
        let bands = bands.clone();
        let device = args.device.clone();
        let noise_threshold = args.noise_threshold;
        let headless = args.headless;

        std::thread::Builder::new()
            .name("pipeline".into())
            .spawn(move || {
                let reader = match BlockReader::open(device.as_deref()) {
                    Ok(reader) => reader,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let sample_rate = reader.sample_rate();
                let _ = ready_tx.send(Ok(sample_rate));

                let aggregator = BandAggregator::new(
                    &bands,
                    sample_rate,
                    BLOCK_SIZE,
                    SPECTRUM_SIZE,
                    noise_threshold,
                );
                let matrix = LedMatrix::new(rows, cols);
                let sink: Box<dyn LedSink> = if headless {
                    Box::new(NullSink)
                } else {
                    Box::new(ConsoleDisplay::new(rows, cols))
                };

                Pipeline::new(reader, aggregator, matrix, sink, config, paused, shutdown).run();
            })
            .context("failed to spawn pipeline thread")?;
    }

    let sample_rate = ready_rx
        .recv()
        .context("pipeline thread exited before reporting readiness")?
        .context("audio capture setup failed")?;

    if let Some(&top) = bands.last() {
        if top > sample_rate / 2 {
            warn!(
                "top band boundary {} Hz exceeds Nyquist ({} Hz); upper bands will stay dark",
                top,
                sample_rate / 2
            );
        }
    }
    info!("analyzing {} bands x {} rows at {} Hz", cols, rows, sample_rate);

    let state = Arc::new(ServiceState {
        config,
        paused: paused.clone(),
        rows,
        cols,
    });

    tokio::select! {
        result = server::run(args.port, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            shutdown.store(true, Ordering::Relaxed);
            // Give the pipeline one capture timeout to clear the display.
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(())
        }
    }
}
