//! Subcommand implementations.

mod mount;

pub use mount::run_mount;
