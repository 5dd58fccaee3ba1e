//! Credential helper for `GIT_ASKPASS`.
//!
//! Prints `$GIT_USERNAME` or `$GIT_PASSWORD`, depending on the prompt Git passes
//! as the first argument. Exits with 1 when the prompt asks for neither.

use ohdsi_git_sync::askpass::answer;
use std::process::ExitCode;

fn main() -> ExitCode {
    let Some(prompt) = std::env::args().nth(1) else {
        eprintln!("usage: ohdsi-git-askpass <prompt>");
        return ExitCode::FAILURE;
    };
    match answer(&prompt, |name| std::env::var(name).ok()) {
        Some(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        None => ExitCode::FAILURE,
    }
}
