//! Binned-product decoder backed by the `ncdump` command-line tool.
//!
//! Requires the netCDF utilities on `PATH` (`apt install netcdf-bin`).

use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::decoder::{BinTable, ProductDecoder};
use crate::error::DecodeError;
use crate::parser::{CHANNELS, parse_binned_cdl};

pub struct NcdumpDecoder {
    program: String,
}

impl NcdumpDecoder {
    pub fn new() -> Self {
        Self {
            program: "ncdump".to_string(),
        }
    }

    /// Uses a specific `ncdump` binary instead of the one on `PATH`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn variables(group: &str) -> String {
        ["BinIndex", "BinList"]
            .into_iter()
            .chain(CHANNELS)
            .map(|v| format!("/{group}/{v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for NcdumpDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductDecoder for NcdumpDecoder {
    fn decode(&self, path: &Path, group: &str) -> Result<BinTable, DecodeError> {
        let output = Command::new(&self.program)
            .arg("-v")
            .arg(Self::variables(group))
            .arg("-p")
            .arg("9,17")
            .arg(path)
            .output()
            .map_err(|e| DecodeError::Command(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(DecodeError::Command(format!(
                "{} failed: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let group_start = text
            .find(&format!("group: {group}"))
            .ok_or_else(|| DecodeError::Missing(format!("group {group}")))?;

        let table = parse_binned_cdl(&text[group_start..])?;
        debug!(
            rows = table.total_rows(),
            bins = table.bins.len(),
            "Binned group decoded"
        );
        Ok(table)
    }
}
