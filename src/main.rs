//! Long-running voice-cloning synthesis worker.
//!
//! Reads one JSON request per stdin line and answers each with exactly one
//! JSON line on stdout:
//!
//! ```text
//! {"text": "Hello there", "output_path": "/tmp/out.wav", "voice_dir": "/voices/alice"}
//! {"success": true, "output_path": "/tmp/out.wav", "duration_seconds": 1.42}
//! ```
//!
//! `{"command": "quit"}` (or closing stdin) shuts the worker down. All
//! diagnostics go to stderr, so stdout stays machine-readable.

use std::io;

use tracing_subscriber::EnvFilter;

mod error;
mod protocol;
mod tts;
mod worker;

use tts::{CommandBackend, Device, Synthesizer};
use worker::Worker;

const DEFAULT_MODEL: &str = "tts_models/multilingual/multi-dataset/xtts_v2";

fn main() {
    // Initialize logging on stderr; stdout carries only response lines
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    // Configuration from environment
    let executable = std::env::var("XTTS_COMMAND").unwrap_or_else(|_| "tts".to_string());
    let model = std::env::var("XTTS_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    let language = std::env::var("XTTS_LANGUAGE").unwrap_or_else(|_| "en".to_string());
    let device = std::env::var("XTTS_DEVICE")
        .ok()
        .map(|value| {
            value
                .parse::<Device>()
                .expect("XTTS_DEVICE must be 'cuda' or 'cpu'")
        });

    tracing::info!("XTTS worker v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Engine command: {} ({})", executable, model);

    let backend = CommandBackend::new(executable, model, device);
    let synth = Synthesizer::new(backend, language);
    let mut worker = Worker::new(synth);

    let stdin = io::stdin();
    let stdout = io::stdout();
    if let Err(e) = worker.run(stdin.lock(), stdout.lock()) {
        tracing::error!("Worker stopped: {}", e);
        std::process::exit(1);
    }
}
