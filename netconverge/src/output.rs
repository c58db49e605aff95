//! Where rendered scripts end up.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::compiler::MachineScript;

#[derive(Debug, Error)]
#[error("failed to write {path}: {source}")]
pub struct OutputError {
    pub path: String,
    pub source: io::Error,
}

/// Sink for the scripts of one network.
pub trait ScriptWriter {
    /// Store `script`, returning where it went.
    fn write(&mut self, network: &str, script: &MachineScript) -> Result<PathBuf, OutputError>;
}

/// Writes `<root>/<network>/<machine>.<mode>.sh`, executable.
#[derive(Debug, Clone)]
pub struct DirectoryWriter {
    root: PathBuf,
}

impl DirectoryWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn network_dir(&self, network: &str) -> PathBuf {
        self.root.join(network)
    }
}

impl ScriptWriter for DirectoryWriter {
    fn write(&mut self, network: &str, script: &MachineScript) -> Result<PathBuf, OutputError> {
        let dir = self.network_dir(network);
        fs::create_dir_all(&dir).map_err(|source| OutputError {
            path: dir.display().to_string(),
            source,
        })?;
        let path = dir.join(script.file_name());
        fs::write(&path, &script.text)
            .and_then(|()| make_executable(&path))
            .map_err(|source| OutputError {
                path: path.display().to_string(),
                source,
            })?;
        debug!(path = %path.display(), "wrote script");
        Ok(path)
    }
}

/// Write every script of `network`, stopping at the first failure.
pub fn write_all(
    writer: &mut dyn ScriptWriter,
    network: &str,
    scripts: &[MachineScript],
) -> Result<Vec<PathBuf>, OutputError> {
    scripts.iter().map(|s| writer.write(network, s)).collect()
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DirectoryWriter, ScriptWriter};
    use crate::compiler::{MachineScript, Mode};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn writes_under_the_network_directory() {
        let dir = tempdir().expect("tempdir");
        let mut writer = DirectoryWriter::new(dir.path());
        let script = MachineScript {
            machine: "router".to_string(),
            mode: Mode::Audit,
            units: 0,
            text: "#!/bin/sh\n".to_string(),
        };
        let path = writer.write("lab", &script).expect("write");
        assert_eq!(path, dir.path().join("lab").join("router.audit.sh"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "#!/bin/sh\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }
}
