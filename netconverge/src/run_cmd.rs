use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use netconverge::compiler::script::RunSummary;
use netconverge::compiler::{compile_machine, CompiledNetwork, Mode};
use netconverge::transport::{LocalShell, OpenSsh, RemoteShell};
use tracing::info;

use crate::cli::RunArgs;
use crate::inputs;

pub fn run_run(args: RunArgs) -> Result<()> {
    let settings = inputs::settings(args.settings.as_deref())?;
    let secrets = inputs::secrets(args.secrets.as_deref())?;
    let (name, data) = inputs::one_network(&args.input, args.network.as_deref())?;
    let net = CompiledNetwork::build(&name, &data, settings)
        .with_context(|| format!("network '{name}' in {}", args.input.display()))?;

    let Some(id) = net
        .graph
        .id(&args.machine)
        .filter(|id| net.managed().contains(id))
    else {
        bail!("'{}' is not a managed machine in network '{name}'", args.machine);
    };
    let mode = Mode::from(args.mode);
    let script = compile_machine(&net, id, &[mode], secrets.as_ref())
        .with_context(|| format!("network '{name}'"))?
        .pop()
        .context("no script was rendered")?;

    let shell: Box<dyn RemoteShell> = match &args.host {
        Some(host) if !args.local => {
            let mut ssh = OpenSsh::new(host);
            ssh.user = args.user.clone();
            ssh.port = args.port;
            ssh.options = args.ssh_options.clone();
            Box::new(ssh)
        }
        _ => Box::new(LocalShell),
    };

    info!(
        machine = %script.machine,
        mode = %mode,
        host = args.host.as_deref().unwrap_or("local"),
        "running script"
    );
    let mut tee = Tee {
        out: io::stdout().lock(),
        seen: Vec::new(),
    };
    let code = shell
        .run(&script.text, &[], &mut tee)
        .with_context(|| format!("failed to run {}", script.file_name()))?;
    if code != 0 {
        bail!("{} exited with status {code}", script.file_name());
    }
    check_summary(&script.file_name(), &String::from_utf8_lossy(&tee.seen))
}

/// Results travel in the script's output, not its exit status.
fn check_summary(file: &str, output: &str) -> Result<()> {
    let summary = RunSummary::parse(output)
        .with_context(|| format!("{file} printed no pass/fail summary"))?;
    info!(pass = summary.pass, fail = summary.fail, "script finished");
    if summary.fail > 0 {
        bail!(
            "{file}: {} of {} units failed: {}",
            summary.fail,
            summary.pass + summary.fail,
            summary.failed.join(" ")
        );
    }
    Ok(())
}

/// Pass output through while keeping a copy to read the summary from.
struct Tee<W> {
    out: W,
    seen: Vec<u8>,
}

impl<W: Write> Write for Tee<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.out.write(buf)?;
        self.seen.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::check_summary;

    #[test]
    fn failed_units_fail_the_run() {
        assert!(check_summary("web.audit.sh", "PASSED: a\npass=1 fail=0 failed:\n").is_ok());

        let err = check_summary("web.audit.sh", "pass=1 fail=1 failed: pkg_nginx\n").expect_err("failed");
        assert_eq!(err.to_string(), "web.audit.sh: 1 of 2 units failed: pkg_nginx");

        let err = check_summary("web.audit.sh", "Killed\n").expect_err("no summary");
        assert!(err.to_string().contains("no pass/fail summary"));
    }
}
