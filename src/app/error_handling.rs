//! Error handling utilities
//!
//! Maps whatever ended the run to a message on stderr and a process exit code.

use crate::config::ConfigError;
use crate::error::SetupError;
use tracing::error;

/// Exit code for an error anywhere in an `anyhow` chain.
///
/// Setup failures carry their own class code; unusable inventories are
/// argument errors (2); everything else is a general failure (1).
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if let Some(setup) = cause.downcast_ref::<SetupError>() {
            return setup.exit_code();
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return 2;
        }
    }
    1
}

/// Handle fatal errors and exit with appropriate status code
///
/// # Verbose Mode Behavior
/// - `verbose = 0`: top-level message only
/// - `verbose >= 1`: full error chain
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {:#}", error);

    eprintln!("Error: {error}");
    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    if let Some(SetupError::JobFailure { failures, .. }) =
        error.chain().find_map(|c| c.downcast_ref::<SetupError>())
    {
        eprintln!("\nFailed nodes:");
        for failure in failures {
            eprintln!("  {failure}");
        }
    }

    std::process::exit(exit_code_for(&error))
}
