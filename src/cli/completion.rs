//! Shell completion generation for binexport
//!
//! Generates completion scripts for bash, zsh and fish from the clap
//! argument definitions.

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

use crate::cli::CliArgs;
use crate::error::{ConfigError, Result};

/// Generate a shell completion script on stdout
///
/// # Arguments
/// * `shell_name` - Shell type (bash, zsh, fish)
///
/// # Returns
/// * `Result<()>` - Success or error
pub fn generate_completion(shell_name: &str) -> Result<()> {
    let script = completion_script(parse_shell(shell_name)?);
    let mut stdout = io::stdout().lock();
    stdout.write_all(&script)?;
    stdout.flush()?;
    Ok(())
}

/// Render the completion script for `shell`
pub fn completion_script(shell: Shell) -> Vec<u8> {
    let mut cmd = CliArgs::command();
    let mut buffer = Vec::new();
    generate(shell, &mut cmd, "binexport", &mut buffer);
    buffer
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        _ => Err(ConfigError::Generic(format!(
            "Unsupported shell: {}. Supported shells: bash, zsh, fish",
            shell_name
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shell() {
        assert_eq!(parse_shell("bash").unwrap(), Shell::Bash);
        assert_eq!(parse_shell("ZSH").unwrap(), Shell::Zsh);
        assert_eq!(parse_shell("fish").unwrap(), Shell::Fish);
        assert!(parse_shell("powershell").is_err());
    }

    #[test]
    fn test_completion_mentions_options() {
        let script = String::from_utf8(completion_script(Shell::Bash)).unwrap();
        assert!(script.contains("binexport"));
        assert!(script.contains("--max-records"));
        assert!(script.contains("--plan-only"));
    }
}
