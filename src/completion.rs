//! # Shell Completion Module
//!
//! ```bash
//! pulsetempo completion bash > ~/.local/share/bash-completion/completions/pulsetempo
//! pulsetempo completion zsh > ~/.config/zsh/completions/_pulsetempo
//! ```

use crate::cli;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};

/// Write completions for `cmd` to `out`.
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command, out: &mut dyn Write) {
    let name = cmd.get_name().to_string();
    generate(gen, cmd, name, out);
}

/// Print completions for `shell` to stdout.
pub fn print_completions(shell: cli::Shell, cmd: &mut Command) {
    generate_completions(shell_to_completion_shell(shell), cmd, &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
pub fn shell_to_completion_shell(shell: cli::Shell) -> CompletionShell {
    match shell {
        cli::Shell::Bash => CompletionShell::Bash,
        cli::Shell::Zsh => CompletionShell::Zsh,
        cli::Shell::Fish => CompletionShell::Fish,
        cli::Shell::PowerShell => CompletionShell::PowerShell,
        cli::Shell::Elvish => CompletionShell::Elvish,
    }
}
