use anyhow::{Context, Result};
use netconverge::report::{render_diff_summary, render_diff_text};
use script_doc::{diff_with_options, format_json, parse_file, DiffOptions, DiffSummary};

use crate::cli::{DiffArgs, OutputFormat};

pub fn run_diff(args: DiffArgs) -> Result<()> {
    let left = parse_file(&args.file1)
        .with_context(|| format!("failed to parse {}", args.file1.display()))?;
    let right = parse_file(&args.file2)
        .with_context(|| format!("failed to parse {}", args.file2.display()))?;

    let opts = DiffOptions {
        include_identical: args.all,
        ignore_sections: args.ignore,
    };
    let entries = diff_with_options(&left, &right, &opts);

    match args.format {
        OutputFormat::Text => {
            let clean = DiffSummary::of(&entries).is_clean();
            if !entries.is_empty() {
                println!("{}", render_diff_text(&entries));
            }
            if args.summary || clean {
                println!("{}", render_diff_summary(&entries));
            }
        }
        OutputFormat::Json => println!("{}", format_json(&entries)),
    }
    Ok(())
}
