use anyhow::{bail, Result};
use netconverge::verify::{build_verify_report, render_verify_text, VerifyReport};

use crate::cli::{OutputFormat, VerifyArgs};
use crate::inputs;

pub fn run_verify(args: VerifyArgs) -> Result<()> {
    let settings = inputs::settings(args.settings.as_deref())?;
    let networks = inputs::networks(&args.input, args.network.as_deref())?;
    let reports: Vec<VerifyReport> = networks
        .iter()
        .map(|(name, data)| build_verify_report(name, data, &settings))
        .collect();

    match args.format {
        OutputFormat::Text => {
            let text: Vec<String> = reports.iter().map(render_verify_text).collect();
            println!("{}", text.join("\n\n"));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    let errors: usize = reports.iter().map(|r| r.errors).sum();
    let warnings: usize = reports.iter().map(|r| r.warnings).sum();
    if errors > 0 {
        bail!("verify failed: {errors} errors");
    }
    if args.strict && warnings > 0 {
        bail!("verify failed in strict mode: {warnings} warnings");
    }
    Ok(())
}
