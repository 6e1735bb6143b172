//! Tag reader backed by an external program
//!
//! The program is run once per poll. Its stdout decides the read:
//! - empty → no target
//! - hex digits (optional `0x` prefix, `:`/space separators) → ISO 14443-A uid
//! - anything else → unknown target
//!
//! A spawn failure or non-zero exit is a read error.

use super::{RawRead, RawTarget, TagReader};
use crate::error::{Error, Result};
use std::process::Command;
use tracing::debug;

/// Driver that shells out to a reader utility
#[derive(Debug)]
pub struct CommandTagReader {
    program: String,
    args: Vec<String>,
    closed: bool,
}

impl CommandTagReader {
    /// Build from a command line (`[program, args...]`)
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::Config("reader command is empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            closed: false,
        })
    }
}

impl TagReader for CommandTagReader {
    fn read(&mut self) -> Result<RawRead> {
        if self.closed {
            return Err(Error::HardwareRead("reader is closed".to_string()));
        }

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| Error::HardwareRead(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::HardwareRead(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_reader_output(&String::from_utf8_lossy(&output.stdout)))
    }

    fn close(&mut self) {
        if !self.closed {
            debug!(program = %self.program, "Closing command tag reader");
            self.closed = true;
        }
    }
}

/// Interpret one line of reader output
pub fn parse_reader_output(output: &str) -> RawRead {
    let line = output.trim();
    if line.is_empty() {
        return RawRead::NoTarget;
    }

    let digits: String = line
        .strip_prefix("0x")
        .or_else(|| line.strip_prefix("0X"))
        .unwrap_or(line)
        .chars()
        .filter(|c| *c != ':' && !c.is_whitespace())
        .collect();

    match decode_hex(&digits) {
        Some(uid) if !uid.is_empty() => RawRead::Target(RawTarget::Iso14443a { uid }),
        _ => RawRead::Target(RawTarget::Unknown {
            description: line.to_string(),
        }),
    }
}

fn decode_hex(digits: &str) -> Option<Vec<u8>> {
    if digits.len() % 2 != 0 || !digits.is_ascii() {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}
