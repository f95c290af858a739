//! Program name and version.

/// Return the program name.
pub const fn name() -> &'static str {
    match option_env!("PROGRAM_NAME") {
        Some(s) => s,
        None => "gpxtag",
    }
}

/// Return the program version.
pub const fn version() -> &'static str {
    match option_env!("CARGO_PKG_VERSION") {
        Some(s) => s,
        None => "unknown",
    }
}
