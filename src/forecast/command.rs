use std::io::Write;
use std::process::{Command, Stdio};

use serde::Serialize;
use tracing::debug;

use super::{ForecastModel, ModelOutput};
use crate::analyzers::types::SeriesRow;
use crate::error::ForecastError;

/// A model run as an external program.
///
/// The program receives `{"horizon": h, "series": [..]}` on stdin, where each
/// series entry is a weekly-series row, and must print a [`ModelOutput`] as
/// JSON on stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandModel {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Serialize)]
struct Request<'a> {
    horizon: usize,
    series: &'a [SeriesRow],
}

impl CommandModel {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits a shell-like `"program arg1 arg2"` on whitespace.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

impl ForecastModel for CommandModel {
    fn fit_forecast(
        &self,
        series: &[SeriesRow],
        horizon: usize,
    ) -> Result<ModelOutput, ForecastError> {
        let payload = serde_json::to_vec(&Request { horizon, series })?;
        debug!(program = %self.program, bytes = payload.len(), "Starting model process");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // The child may fill stdout before it has drained stdin.
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || stdin.write_all(&payload))
        });

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(ForecastError::Process(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if let Some(handle) = writer {
            handle
                .join()
                .map_err(|_| ForecastError::Process("stdin writer panicked".to_string()))??;
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}
