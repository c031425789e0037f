// src/shunt.rs
// Auxiliary battery/generator shunt instruments run as independent
// sibling processes. Each child owns its CSV file outright; the only
// shared state with the bench is process lifetime.

use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Supervises one shunt-logger subprocess, spawned as
/// `<logger_cmd> --serial <id> --csv <path>` with stdout discarded.
pub struct ShuntLogger {
    label: String,
    child: Child,
}

impl ShuntLogger {
    pub fn spawn(logger_cmd: &Path, serial: &str, csv_path: &Path) -> io::Result<Self> {
        println!(
            "{} --serial {} --csv {}",
            logger_cmd.display(),
            serial,
            csv_path.display()
        );
        let child = Command::new(logger_cmd)
            .arg("--serial")
            .arg(serial)
            .arg("--csv")
            .arg(csv_path)
            .stdout(Stdio::null())
            .spawn()?;
        Ok(Self {
            label: serial.to_string(),
            child,
        })
    }

    /// Terminates the child and reaps it.
    pub fn stop(&mut self) {
        if let Err(e) = self.child.kill() {
            eprintln!("Warning: could not stop shunt logger {}: {}", self.label, e);
        }
        let _ = self.child.wait();
    }
}

impl Drop for ShuntLogger {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

// src/shunt.rs
