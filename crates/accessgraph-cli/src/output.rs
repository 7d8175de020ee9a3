//! Console output helpers.

use colored::Colorize;
use std::path::Path;

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", "!".yellow().bold(), message);
}

/// Write `content` to `out` when given, otherwise to stdout.
pub fn write_output(out: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, content)?;
            print_success(&format!("wrote {}", path.display()));
        }
        None => print!("{content}"),
    }
    Ok(())
}
