use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::WorkerError;

/// Compute device the engine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Cpu,
}

/// Devices to try during engine init, best first.
pub const DEVICE_PREFERENCE: &[Device] = &[Device::Cuda, Device::Cpu];

impl Device {
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }

    /// Whether this device can actually be used on the current host.
    pub fn is_available(self) -> bool {
        match self {
            Device::Cpu => true,
            Device::Cuda => Command::new("nvidia-smi")
                .arg("-L")
                .output()
                .map(|probe| probe.status.success())
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cuda" => Ok(Device::Cuda),
            "cpu" => Ok(Device::Cpu),
            other => Err(format!("unknown device '{}', expected 'cuda' or 'cpu'", other)),
        }
    }
}

/// One synthesis invocation, borrowed from the job being handled.
pub struct RenderRequest<'a> {
    pub text: &'a str,
    pub output_path: &'a Path,
    pub references: &'a [PathBuf],
    pub language: &'a str,
}

/// Factory for the expensive part: turning a backend description into a
/// ready-to-render engine.
pub trait SynthesisBackend {
    type Engine: SynthesisEngine;

    fn initialize(&self, preference: &[Device]) -> Result<Self::Engine, WorkerError>;
}

/// A loaded engine that can produce wav files.
pub trait SynthesisEngine {
    fn render(&mut self, request: RenderRequest<'_>) -> Result<(), WorkerError>;
}

/// Backend that shells out to the Coqui `tts` command line for each render.
///
/// The heavyweight model download and checkpoint load happen inside the CLI,
/// so `initialize` only verifies the executable exists and picks a device;
/// a missing installation is reported as an engine init failure instead of
/// surfacing mid-job.
pub struct CommandBackend {
    executable: PathBuf,
    model: String,
    forced_device: Option<Device>,
}

impl CommandBackend {
    pub fn new(
        executable: impl Into<PathBuf>,
        model: impl Into<String>,
        forced_device: Option<Device>,
    ) -> Self {
        CommandBackend {
            executable: executable.into(),
            model: model.into(),
            forced_device,
        }
    }

    fn select_device(&self, preference: &[Device]) -> Device {
        if let Some(device) = self.forced_device {
            return device;
        }
        preference
            .iter()
            .copied()
            .find(|device| device.is_available())
            .unwrap_or(Device::Cpu)
    }
}

impl SynthesisBackend for CommandBackend {
    type Engine = CommandEngine;

    fn initialize(&self, preference: &[Device]) -> Result<CommandEngine, WorkerError> {
        let device = self.select_device(preference);

        let probe = Command::new(&self.executable)
            .arg("--version")
            .output()
            .map_err(|e| {
                WorkerError::EngineError(format!(
                    "Failed to run {} (is it installed?): {}",
                    self.executable.display(),
                    e
                ))
            })?;
        if !probe.status.success() {
            return Err(WorkerError::EngineError(format!(
                "{} --version exited with {}",
                self.executable.display(),
                probe.status
            )));
        }

        tracing::info!("Using {} ({}) on {}", self.executable.display(), self.model, device);

        Ok(CommandEngine {
            executable: self.executable.clone(),
            model: self.model.clone(),
            device,
        })
    }
}

#[derive(Debug)]
pub struct CommandEngine {
    executable: PathBuf,
    model: String,
    device: Device,
}

impl SynthesisEngine for CommandEngine {
    fn render(&mut self, request: RenderRequest<'_>) -> Result<(), WorkerError> {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("--model_name")
            .arg(&self.model)
            .arg("--text")
            .arg(request.text)
            .arg("--language_idx")
            .arg(request.language)
            .arg("--out_path")
            .arg(request.output_path)
            .arg("--device")
            .arg(self.device.as_str());
        // The CLI takes all conditioning wavs after a single flag.
        cmd.arg("--speaker_wav");
        for reference in request.references {
            cmd.arg(reference);
        }
        prepare_env(&mut cmd);

        let output = cmd.output().map_err(|e| {
            WorkerError::SynthesisError(format!(
                "Failed to run {}: {}",
                self.executable.display(),
                e
            ))
        })?;
        if !output.status.success() {
            return Err(WorkerError::SynthesisError(format!(
                "engine exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}

/// Non-interactive runs need the licence prompt pre-answered, and a stable
/// model cache location when the caller has not chosen one.
fn prepare_env(cmd: &mut Command) {
    cmd.env("COQUI_TOS_AGREED", "1");
    if std::env::var_os("TTS_HOME").is_none() {
        if let Some(base) = directories::BaseDirs::new() {
            cmd.env("TTS_HOME", base.data_dir().join("tts"));
        }
    }
}
