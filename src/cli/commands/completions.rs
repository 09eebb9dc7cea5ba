//! Shell completion generation.

use clap::CommandFactory;
use clap_complete::{generate, Shell as CompletionShell};

use crate::cli::args::{Cli, Shell};
use crate::error::Result;

pub fn execute(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let target = match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
    };
    generate(target, &mut cmd, "envsync", &mut std::io::stdout());
    Ok(())
}
