//! Line protocol: one JSON request per stdin line, one JSON response per
//! stdout line.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::WorkerError;

/// Raw wire shape before validation. Every field is optional so that the
/// decoder, not serde, decides which absence to report first.
#[derive(Debug, Deserialize)]
struct RawRequest {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(default)]
    voice_dir: Option<String>,
}

#[derive(Debug)]
pub enum Request {
    Synthesize(SynthesisJob),
    Quit,
}

#[derive(Debug)]
pub struct SynthesisJob {
    pub text: String,
    pub output_path: PathBuf,
    pub voice_dir: PathBuf,
}

/// Decode one non-blank line into a typed request.
///
/// Field checks short-circuit in a fixed order (text, output_path,
/// voice_dir) so the first missing field determines the reported error.
pub fn decode(line: &str) -> Result<Request, WorkerError> {
    let raw: RawRequest = serde_json::from_str(line)?;

    // A quit command needs no other fields; any other command value falls
    // through to the field checks.
    if raw.command.as_deref() == Some("quit") {
        return Ok(Request::Quit);
    }

    let text = raw.text.as_deref().unwrap_or("").trim();
    if text.is_empty() {
        return Err(WorkerError::MissingField("text"));
    }
    let output_path = raw.output_path.unwrap_or_default();
    if output_path.is_empty() {
        return Err(WorkerError::MissingField("output_path"));
    }
    let voice_dir = raw.voice_dir.unwrap_or_default();
    if voice_dir.is_empty() {
        return Err(WorkerError::MissingField("voice_dir"));
    }

    Ok(Request::Synthesize(SynthesisJob {
        text: text.to_string(),
        output_path: output_path.into(),
        voice_dir: voice_dir.into(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Synthesized {
        success: bool,
        output_path: String,
        duration_seconds: f64,
    },
    QuitAck {
        success: bool,
        command: &'static str,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl Response {
    pub fn synthesized(output_path: &Path, duration_seconds: f64) -> Self {
        Response::Synthesized {
            success: true,
            output_path: output_path.display().to_string(),
            duration_seconds: (duration_seconds * 100.0).round() / 100.0,
        }
    }

    pub fn quit_ack() -> Self {
        Response::QuitAck {
            success: true,
            command: "quit",
        }
    }

    pub fn failure(error: &WorkerError) -> Self {
        Response::Failure {
            success: false,
            error: error.to_string(),
        }
    }
}

/// Write one response line and flush it, so a downstream consumer sees the
/// answer without buffering delay.
pub fn write_response(mut w: impl Write, response: &Response) -> Result<(), WorkerError> {
    let line = serde_json::to_string(response)?;
    writeln!(w, "{}", line)?;
    w.flush()?;
    Ok(())
}
