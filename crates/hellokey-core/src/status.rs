//! Exit-code contract shared by both command line tools.
//!
//! Codes start at 170 to stay clear of the exit codes shells and libc
//! reserve. Scripts key off these numbers, so they must not change.

use crate::Outcome;

/// Generic failure and argument errors. Never produced by the status table.
pub const EXIT_USAGE: u8 = 1;
/// Provisioning failed for any reason other than an existing credential.
pub const EXIT_PROVISION_FAILED: u8 = 1;
/// Provisioning returned an already existing key instead of creating one.
pub const EXIT_EXISTING_KEY: u8 = 170;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Status {
    pub code: u8,
    pub message: String,
}

pub const fn exit_code(outcome: Outcome) -> u8 {
    match outcome {
        Outcome::Success => 0,
        Outcome::NotSupported => 170,
        Outcome::AlreadyExists => 171,
        Outcome::NotFound => 172,
        Outcome::SecurityDeviceLocked => 173,
        Outcome::UnknownError => 175,
        Outcome::UserCanceled => 176,
        Outcome::UserPrefersPassword => 177,
    }
}

pub fn message(outcome: Outcome, key_name: &str) -> String {
    match outcome {
        Outcome::Success => "Success".to_string(),
        Outcome::NotSupported => "credential store not supported on this device".to_string(),
        Outcome::AlreadyExists => "the credential already exists; creation failed".to_string(),
        Outcome::NotFound => format!("the credential '{key_name}' does not exist"),
        Outcome::SecurityDeviceLocked => "the security device is locked".to_string(),
        Outcome::UnknownError => "unknown error".to_string(),
        Outcome::UserCanceled => "the user cancelled".to_string(),
        Outcome::UserPrefersPassword => {
            "the user prefers to enter a password; aborted".to_string()
        }
    }
}

pub fn status(outcome: Outcome, key_name: &str) -> Status {
    Status {
        code: exit_code(outcome),
        message: message(outcome, key_name),
    }
}
