//! Error handling utilities

use tracing::error;

use crate::config::ConfigError;

/// Exit code for configuration and argument errors
pub const CONFIG_ERROR_EXIT_CODE: i32 = 2;
/// Exit code for everything else
pub const GENERAL_ERROR_EXIT_CODE: i32 = 1;

/// Exit code for a fatal error
pub fn exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<ConfigError>().is_some() {
        CONFIG_ERROR_EXIT_CODE
    } else {
        GENERAL_ERROR_EXIT_CODE
    }
}

/// Handle fatal errors and exit with appropriate status code
///
/// Prints the error, and its cause chain when `verbose >= 1`.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);
    eprintln!("Error: {error}");

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    std::process::exit(exit_code(&error))
}
