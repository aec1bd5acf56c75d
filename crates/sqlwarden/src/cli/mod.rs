//! CLI command implementations.

pub mod audit;
pub mod check;
pub mod config;
pub mod context;
pub mod init;
pub mod plan;
pub mod serve;

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
