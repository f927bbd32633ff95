//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract. Scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | worksheet        | Reading, building and running worksheets |
//! | 10-19   | config           | Settings file codes                      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use appraise_config::ConfigError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Worksheet (3-9)
// =============================================================================

/// Worksheet file could not be read.
pub const EXIT_INPUT_READ: u8 = 3;

/// Worksheet file is not a valid worksheet description.
pub const EXIT_INPUT_PARSE: u8 = 4;

/// Worksheet could not be generated or edited (duplicate survey, bad row).
pub const EXIT_WORKSHEET: u8 = 5;

/// `lint` found problems in the rule set.
pub const EXIT_LINT_FINDINGS: u8 = 6;

/// The engine stopped at its pass limit with writes still pending.
pub const EXIT_NOT_CONVERGED: u8 = 7;

// =============================================================================
// Config (10-19)
// =============================================================================

/// Settings file could not be read.
pub const EXIT_CONFIG_READ: u8 = 10;

/// Settings file is malformed or out of range.
pub const EXIT_CONFIG_INVALID: u8 = 11;

/// Map a ConfigError to its exit code.
pub fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::Read { .. } | ConfigError::Write { .. } => EXIT_CONFIG_READ,
        ConfigError::Parse(_)
        | ConfigError::Serialize(_)
        | ConfigError::MaxPasses(_)
        | ConfigError::LogLevel(_) => EXIT_CONFIG_INVALID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_INPUT_READ,
            EXIT_INPUT_PARSE,
            EXIT_WORKSHEET,
            EXIT_LINT_FINDINGS,
            EXIT_NOT_CONVERGED,
            EXIT_CONFIG_READ,
            EXIT_CONFIG_INVALID,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn test_config_codes() {
        assert_eq!(config_exit_code(&ConfigError::MaxPasses(0)), EXIT_CONFIG_INVALID);
        assert_eq!(config_exit_code(&ConfigError::LogLevel("x".into())), EXIT_CONFIG_INVALID);
    }
}
