use anyhow::Context;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run a command from an array, collecting its output.
pub fn run_command<'a, Args: AsRef<[&'a str]>>(args: Args) -> anyhow::Result<String> {
    let args = args.as_ref();
    run_command_cfg(args[0], |c| c.args(&args[1..]))
}

/// Run a command from an array inside `dir`, collecting its output.
pub fn run_command_at<'a, Args: AsRef<[&'a str]>>(
    args: Args,
    dir: &Path,
) -> anyhow::Result<String> {
    let args = args.as_ref();
    run_command_cfg(args[0], |c| c.args(&args[1..]).current_dir(dir))
}

/// [`run_command`] with configuration. The command is logged before it runs, and a
/// non-zero exit turns into an error carrying the captured stderr.
pub fn run_command_cfg(
    prog: &str,
    f: impl FnOnce(&mut Command) -> &mut Command,
) -> anyhow::Result<String> {
    let mut cmd = Command::new(prog);
    cmd.stdin(Stdio::null());
    f(&mut cmd);
    log::debug!("+ {cmd:?}");
    let out = cmd
        .output()
        .with_context(|| format!("cannot run `{cmd:?}`"))?;
    let stdout = String::from_utf8_lossy(out.stdout.trim_ascii()).to_string();
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(out.stderr.trim_ascii());
        anyhow::bail!(
            "Command `{cmd:?}` failed with exit code {:?}. STDERR:\n{stderr}",
            out.status.code()
        );
    }
    Ok(stdout)
}
