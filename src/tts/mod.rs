pub mod backend;
pub mod voice;

use std::path::Path;
use std::time::Instant;

use crate::error::WorkerError;
use crate::protocol::SynthesisJob;

pub use backend::{CommandBackend, Device, SynthesisBackend, SynthesisEngine};

use backend::{RenderRequest, DEVICE_PREFERENCE};

/// Owns the (lazily created) engine and runs one job at a time.
pub struct Synthesizer<B: SynthesisBackend> {
    backend: B,
    engine: Option<B::Engine>,
    language: String,
}

impl<B: SynthesisBackend> Synthesizer<B> {
    pub fn new(backend: B, language: impl Into<String>) -> Self {
        Self {
            backend,
            engine: None,
            language: language.into(),
        }
    }

    /// Run one synthesis job and return the duration of the produced audio
    /// in seconds.
    pub fn synthesize(&mut self, job: &SynthesisJob) -> Result<f64, WorkerError> {
        let language = self.language.clone();

        // 1. Get or load the engine
        let engine = self.ensure_ready()?;

        // 2. Resolve the cloned voice
        let references = voice::find_reference_wavs(&job.voice_dir)?;
        tracing::debug!(
            "Conditioning on {} reference sample(s) from {}",
            references.len(),
            job.voice_dir.display()
        );

        // 3. Make room for the output file
        if let Some(parent) = job.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // 4. Render
        engine.render(RenderRequest {
            text: &job.text,
            output_path: &job.output_path,
            references: &references,
            language: &language,
        })?;

        // 5. Measure what actually landed on disk
        Ok(wav_duration(&job.output_path))
    }

    /// Initialize the engine on first use. A failed init leaves the slot
    /// empty, so the next job gets a fresh attempt.
    fn ensure_ready(&mut self) -> Result<&mut B::Engine, WorkerError> {
        match &mut self.engine {
            Some(engine) => Ok(engine),
            slot => {
                tracing::info!("Loading synthesis engine...");
                let started = Instant::now();
                let engine = self.backend.initialize(DEVICE_PREFERENCE)?;
                tracing::info!("Engine loaded in {:.1}s", started.elapsed().as_secs_f64());
                Ok(slot.insert(engine))
            }
        }
    }
}

/// Duration in seconds according to the produced file's header, or 0.0 when
/// the file cannot be read back as a wav.
fn wav_duration(path: &Path) -> f64 {
    let reader = match hound::WavReader::open(path) {
        Ok(reader) => reader,
        Err(e) => {
            tracing::warn!("Could not read {} back: {}", path.display(), e);
            return 0.0;
        }
    };
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return 0.0;
    }
    f64::from(reader.duration()) / f64::from(spec.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::backend::mock::{write_silence, MockBackend};
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn voice_dir_with_sample(dir: &Path) -> PathBuf {
        let voice_dir = dir.join("voice");
        fs::create_dir_all(&voice_dir).unwrap();
        write_silence(&voice_dir.join("reference_a.wav"), 0.1);
        voice_dir
    }

    fn job(voice_dir: PathBuf, output_path: PathBuf) -> SynthesisJob {
        SynthesisJob {
            text: "hello".to_string(),
            output_path,
            voice_dir,
        }
    }

    #[test]
    fn duration_comes_from_the_wav_header() {
        let dir = tempfile::tempdir().unwrap();
        let voice_dir = voice_dir_with_sample(dir.path());
        let mut synth = Synthesizer::new(MockBackend::writing(1.0), "en");

        let duration = synth
            .synthesize(&job(voice_dir, dir.path().join("out.wav")))
            .unwrap();
        assert!((duration - 1.0).abs() < 1e-6, "got {}", duration);
    }

    #[test]
    fn missing_output_counts_as_zero_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let voice_dir = voice_dir_with_sample(dir.path());
        let mut synth = Synthesizer::new(MockBackend::default(), "en");

        let duration = synth
            .synthesize(&job(voice_dir, dir.path().join("never_written.wav")))
            .unwrap();
        assert_eq!(duration, 0.0);
    }

    #[test]
    fn unparseable_output_counts_as_zero_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let voice_dir = voice_dir_with_sample(dir.path());
        let output_path = dir.path().join("out.wav");
        fs::write(&output_path, b"definitely not riff data").unwrap();
        let mut synth = Synthesizer::new(MockBackend::default(), "en");

        let duration = synth.synthesize(&job(voice_dir, output_path)).unwrap();
        assert_eq!(duration, 0.0);
    }

    #[test]
    fn engine_loads_once_across_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let voice_dir = voice_dir_with_sample(dir.path());
        let backend = MockBackend::writing(0.1);
        let mut synth = Synthesizer::new(backend.clone(), "en");

        synth
            .synthesize(&job(voice_dir.clone(), dir.path().join("a.wav")))
            .unwrap();
        synth
            .synthesize(&job(voice_dir, dir.path().join("b.wav")))
            .unwrap();

        assert_eq!(backend.init_count(), 1);
        assert_eq!(backend.render_count(), 2);
    }

    #[test]
    fn failed_init_is_retried_on_the_next_job() {
        let dir = tempfile::tempdir().unwrap();
        let voice_dir = voice_dir_with_sample(dir.path());
        let backend = MockBackend {
            fail_init: true,
            ..MockBackend::default()
        };
        let mut synth = Synthesizer::new(backend.clone(), "en");

        let first = synth.synthesize(&job(voice_dir.clone(), dir.path().join("a.wav")));
        let second = synth.synthesize(&job(voice_dir, dir.path().join("b.wav")));

        assert!(first.is_err());
        assert!(second.is_err());
        assert_eq!(backend.init_count(), 2);
    }

    #[test]
    fn missing_references_fail_after_engine_init() {
        let dir = tempfile::tempdir().unwrap();
        let empty_voice_dir = dir.path().join("voice");
        fs::create_dir_all(&empty_voice_dir).unwrap();
        let backend = MockBackend::writing(0.1);
        let mut synth = Synthesizer::new(backend.clone(), "en");

        let err = synth
            .synthesize(&job(empty_voice_dir, dir.path().join("out.wav")))
            .unwrap_err();

        assert!(matches!(err, WorkerError::NoReferences(_)));
        assert_eq!(backend.init_count(), 1);
        assert_eq!(backend.render_count(), 0);
    }

    #[test]
    fn creates_missing_parent_dirs_for_the_output() {
        let dir = tempfile::tempdir().unwrap();
        let voice_dir = voice_dir_with_sample(dir.path());
        let output_path = dir.path().join("deep/nested/out.wav");
        let mut synth = Synthesizer::new(MockBackend::writing(0.1), "en");

        synth.synthesize(&job(voice_dir, output_path.clone())).unwrap();
        assert!(output_path.exists());
    }

    #[test]
    fn render_failures_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let voice_dir = voice_dir_with_sample(dir.path());
        let backend = MockBackend {
            fail_render: true,
            ..MockBackend::default()
        };
        let mut synth = Synthesizer::new(backend, "en");

        let err = synth
            .synthesize(&job(voice_dir, dir.path().join("out.wav")))
            .unwrap_err();
        assert!(matches!(err, WorkerError::SynthesisError(_)));
    }
}
