//! Running rendered scripts.
//!
//! A script is handed to `sh -c` either on this machine or on a remote one
//! through the system `ssh` client. Results stay in-band: whatever the
//! script prints is copied to the caller, and only its exit code comes back.

use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

use script_doc::shell_quote;
use thiserror::Error;
use tracing::debug;

/// Exit code reported when the shell was killed by a signal.
pub const SIGNALLED: i32 = 255;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: io::Error,
    },
    #[error("i/o with {program} failed: {source}")]
    Io {
        program: String,
        source: io::Error,
    },
}

/// Somewhere a script can run.
pub trait RemoteShell {
    /// Run `script`, feeding it `stdin` and copying its output to `stdout`.
    fn run(&self, script: &str, stdin: &[u8], stdout: &mut dyn Write) -> Result<i32, TransportError>;
}

/// `sh -c` on this machine.
#[derive(Debug, Clone, Default)]
pub struct LocalShell;

impl RemoteShell for LocalShell {
    fn run(&self, script: &str, stdin: &[u8], stdout: &mut dyn Write) -> Result<i32, TransportError> {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        pipe(command, "sh", stdin, stdout)
    }
}

/// `ssh <host> sh -c '<script>'` through the OpenSSH client.
#[derive(Debug, Clone)]
pub struct OpenSsh {
    pub host: String,
    pub user: Option<String>,
    pub port: Option<u16>,
    /// Extra `-o` options, passed through as given.
    pub options: Vec<String>,
}

impl OpenSsh {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: None,
            options: Vec::new(),
        }
    }

    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }

    /// Arguments after `ssh`. The remote side joins them into one command
    /// line, so the script is quoted once.
    pub fn args(&self, script: &str) -> Vec<String> {
        let mut args = vec!["-T".to_string(), "-o".to_string(), "BatchMode=yes".to_string()];
        for option in &self.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(self.destination());
        args.push("sh".to_string());
        args.push("-c".to_string());
        args.push(shell_quote(script));
        args
    }
}

impl RemoteShell for OpenSsh {
    fn run(&self, script: &str, stdin: &[u8], stdout: &mut dyn Write) -> Result<i32, TransportError> {
        debug!(host = %self.host, bytes = script.len(), "running script over ssh");
        let mut command = Command::new("ssh");
        command.args(self.args(script));
        pipe(command, "ssh", stdin, stdout)
    }
}

fn pipe(
    mut command: Command,
    program: &str,
    stdin: &[u8],
    stdout: &mut dyn Write,
) -> Result<i32, TransportError> {
    let io_err = |source| TransportError::Io {
        program: program.to_string(),
        source,
    };
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| TransportError::Spawn {
            program: program.to_string(),
            source,
        })?;

    // Feed stdin from a second thread so a chatty script cannot deadlock
    // against a full stdout pipe.
    let feeder = child.stdin.take().map(|mut pipe| {
        let input = stdin.to_vec();
        thread::spawn(move || pipe.write_all(&input))
    });
    if let Some(mut out) = child.stdout.take() {
        io::copy(&mut out, stdout).map_err(io_err)?;
    }
    if let Some(feeder) = feeder {
        if let Ok(Err(source)) = feeder.join() {
            if source.kind() != io::ErrorKind::BrokenPipe {
                return Err(io_err(source));
            }
        }
    }
    let status = child.wait().map_err(io_err)?;
    Ok(status.code().unwrap_or(SIGNALLED))
}
