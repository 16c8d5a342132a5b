//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: batch jobs and schedulers
//! decide whether to publish a sweep based on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 60-69   | link             | Linkage run / validate codes             |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use caselink_linkage::LinkageError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing config file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Link (60-69)
// =============================================================================

/// Config failed to parse or validate. Nothing was loaded or run.
pub const EXIT_LINK_INVALID_CONFIG: u8 = 60;

/// Roster data is unusable: unreadable file, missing column, blank or
/// duplicate id, empty roster, or a structural failure during scoring.
/// No artifacts were published.
pub const EXIT_LINK_INPUT: u8 = 61;

/// Runtime failure outside the data: worker pool, artifact or JSON output.
/// No artifacts were published.
pub const EXIT_LINK_RUNTIME: u8 = 62;

/// Map an engine error to its exit code.
pub fn link_exit_code(err: &LinkageError) -> u8 {
    match err {
        LinkageError::ConfigParse(_) | LinkageError::ConfigValidation(_) => {
            EXIT_LINK_INVALID_CONFIG
        }
        LinkageError::EmptyRoster(_)
        | LinkageError::DuplicateId { .. }
        | LinkageError::MissingId { .. }
        | LinkageError::MissingColumn { .. }
        | LinkageError::UnknownRecord { .. }
        | LinkageError::ZeroTotalWeight { .. }
        | LinkageError::Csv(_) => EXIT_LINK_INPUT,
        LinkageError::ThreadPool(_) | LinkageError::Io(_) => EXIT_LINK_RUNTIME,
    }
}
