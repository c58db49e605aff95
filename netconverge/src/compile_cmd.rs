use anyhow::{bail, Context, Result};
use netconverge::compiler::{compile_all, CompiledNetwork, MachineScript, Mode};
use netconverge::output::{write_all, DirectoryWriter};
use netconverge::report::render_compile_summary;
use tracing::info;

use crate::cli::{CompileArgs, OutputFormat};
use crate::inputs;
use crate::path_guard::{guard_output_root, guard_scripts};

pub fn run_compile(args: CompileArgs) -> Result<()> {
    let settings = inputs::settings(args.settings.as_deref())?;
    let secrets = inputs::secrets(args.secrets.as_deref())?;
    let networks = inputs::networks(&args.input, args.network.as_deref())?;
    let modes: Vec<Mode> = if args.mode.is_empty() {
        settings.output.modes.clone()
    } else {
        args.mode.iter().copied().map(Mode::from).collect()
    };

    guard_output_root(&args.out, &args.input)?;
    let mut writer = DirectoryWriter::new(&args.out);
    let mut written: Vec<MachineScript> = Vec::new();

    for (name, data) in &networks {
        let net = CompiledNetwork::build(name, data, settings.clone())
            .with_context(|| format!("network '{name}' in {}", args.input.display()))?;
        let scripts = compile_all(&net, &modes, secrets.as_ref(), args.machine.as_deref())
            .with_context(|| format!("network '{name}' in {}", args.input.display()))?;
        if scripts.is_empty() {
            continue;
        }

        let dir = writer.network_dir(name);
        guard_scripts(&dir, &scripts, &args.input)?;
        write_all(&mut writer, name, &scripts)
            .with_context(|| format!("network '{name}': failed to write scripts"))?;
        info!(network = %name, scripts = scripts.len(), dir = %dir.display(), "network written");
        written.extend(scripts);
    }

    if let Some(machine) = &args.machine {
        if written.is_empty() {
            bail!("'{machine}' is not a managed machine in any selected network");
        }
    }

    match args.format {
        OutputFormat::Text => println!("{}", render_compile_summary(&written)),
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = written
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "machine": s.machine,
                        "mode": s.mode,
                        "units": s.units,
                        "file": s.file_name(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}
