use std::io::{BufRead, Write};
use std::time::Instant;

use crate::error::WorkerError;
use crate::protocol::{self, Request, Response, SynthesisJob};
use crate::tts::{SynthesisBackend, Synthesizer};

/// Reads requests line by line and answers each with exactly one response
/// line. Job failures are reported in-band and the loop keeps going; only a
/// broken stdio channel ends `run` with an error.
pub struct Worker<B: SynthesisBackend> {
    synth: Synthesizer<B>,
    jobs: u64,
}

impl<B: SynthesisBackend> Worker<B> {
    pub fn new(synth: Synthesizer<B>) -> Self {
        Self { synth, jobs: 0 }
    }

    pub fn run(&mut self, input: impl BufRead, mut output: impl Write) -> Result<(), WorkerError> {
        tracing::info!("Ready. Waiting for requests on stdin...");

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request = match protocol::decode(line) {
                Ok(request) => request,
                Err(e) => {
                    tracing::error!("Bad request: {}", e);
                    protocol::write_response(&mut output, &Response::failure(&e))?;
                    continue;
                }
            };

            match request {
                Request::Quit => {
                    protocol::write_response(&mut output, &Response::quit_ack())?;
                    tracing::info!("Shutting down.");
                    return Ok(());
                }
                Request::Synthesize(job) => {
                    let response = self.handle_job(&job);
                    protocol::write_response(&mut output, &response)?;
                }
            }
        }

        tracing::info!("Input closed. Exiting.");
        Ok(())
    }

    fn handle_job(&mut self, job: &SynthesisJob) -> Response {
        self.jobs += 1;
        let id = self.jobs;
        tracing::info!(
            "Job {}: synthesizing {} chars -> {}",
            id,
            job.text.chars().count(),
            job.output_path.display()
        );
        let started = Instant::now();

        match self.synth.synthesize(job) {
            Ok(duration) => {
                tracing::info!(
                    "Job {}: done in {:.1}s ({:.1}s audio)",
                    id,
                    started.elapsed().as_secs_f64(),
                    duration
                );
                Response::synthesized(&job.output_path, duration)
            }
            Err(e) => {
                tracing::error!("Job {}: {}", id, e);
                Response::failure(&e)
            }
        }
    }
}
