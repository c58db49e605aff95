use anyhow::{Context, Result};
use netconverge::compiler::CompiledNetwork;
use netconverge::report::render_topology;

use crate::cli::{OutputFormat, ShowArgs};
use crate::inputs;

pub fn run_show(args: ShowArgs) -> Result<()> {
    let settings = inputs::settings(args.settings.as_deref())?;
    let (name, data) = inputs::one_network(&args.input, args.network.as_deref())?;
    let net = CompiledNetwork::build(&name, &data, settings)
        .with_context(|| format!("network '{name}' in {}", args.input.display()))?;

    match args.format {
        OutputFormat::Text => print!("{}", render_topology(&name, &net)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&net)?),
    }
    Ok(())
}
