use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use netconverge::compiler::MachineScript;

/// The output root and every script it will receive must not be the
/// network input. Checked once before anything is compiled.
pub fn guard_output_root(out: &Path, input: &Path) -> Result<()> {
    let input_at = resolve(input)?;
    if resolve(out)? == input_at {
        bail!(
            "refusing to write scripts over the input: --out {} is {}",
            out.display(),
            input.display()
        );
    }
    Ok(())
}

/// Checked per network, once the script file names are known.
pub fn guard_scripts(dir: &Path, scripts: &[MachineScript], input: &Path) -> Result<()> {
    let input_at = resolve(input)?;
    if resolve(dir)? == input_at {
        bail!(
            "refusing to write scripts over the input: network directory {} is {}",
            dir.display(),
            input.display()
        );
    }
    for script in scripts {
        let target = dir.join(script.file_name());
        if resolve(&target)? == input_at {
            bail!(
                "refusing to write scripts over the input: {} for '{}' is {}",
                target.display(),
                script.machine,
                input.display()
            );
        }
    }
    Ok(())
}

/// Absolute form of `path` with symlinks resolved as far as the path
/// exists on disk. The part that does not exist yet is appended with `.`
/// and `..` folded.
fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("failed to read the current directory")?
            .join(path)
    };

    let mut resolved = PathBuf::new();
    let mut on_disk = true;
    for component in absolute.components() {
        if on_disk {
            let next = resolved.join(component);
            if next.exists() {
                resolved = next;
                continue;
            }
            on_disk = false;
            resolved = canonical(&resolved)?;
        }
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            other => resolved.push(other),
        }
    }
    if on_disk {
        resolved = canonical(&resolved)?;
    }
    Ok(resolved)
}

fn canonical(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("failed to resolve {}", path.display()))
}
