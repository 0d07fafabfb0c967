//! Formula compiler tools
//!
//! Command-line front ends for the formula compiler.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
/// Default is `info`, with `debug` for the compiler driver.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,frm_compiler=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Split a `FILE:NAME` formula reference.
///
/// The last `:` separates the two so that Windows drive letters survive.
pub fn split_formula_ref(reference: &str) -> Option<(&str, &str)> {
    let (file, name) = reference.rsplit_once(':')?;
    if file.is_empty() || name.is_empty() {
        return None;
    }
    Some((file, name))
}
