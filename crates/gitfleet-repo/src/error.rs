//! Mapping of libgit2 failures onto the GitFleet error taxonomy.
//!
//! The fleet crate reports every failure as a [`gitfleet_core::Error`]; the
//! helpers here decide which kind a raw `git2::Error` belongs to. Transport
//! failures from the smart-HTTP protocol arrive as `Http`-class errors whose
//! status code only survives in the message text, so classification falls
//! back to message inspection for that class.

use gitfleet_core::Error;
use git2::{ErrorClass, ErrorCode};

pub use gitfleet_core::{ErrorKind, Result};

/// Classify a libgit2 error raised by the clone transport.
pub(crate) fn classify_transport(err: &git2::Error) -> Error {
    let message = err.message().to_string();
    match err.code() {
        ErrorCode::Auth => return Error::authentication(message),
        ErrorCode::NotFound => return Error::not_found(message),
        // Raised when one of our callbacks aborts the transfer.
        ErrorCode::User => return Error::cancelled(message),
        _ => {}
    }
    match err.class() {
        ErrorClass::Ssh => Error::authentication(message),
        ErrorClass::Http | ErrorClass::Net | ErrorClass::Ssl => classify_http_message(message),
        ErrorClass::Os | ErrorClass::Filesystem => Error::filesystem(message),
        ErrorClass::Repository | ErrorClass::Odb | ErrorClass::Object | ErrorClass::Reference => {
            Error::repository(message)
        }
        _ => Error::transport(message),
    }
}

/// Classify a libgit2 error raised by local repository access (blame,
/// revwalk, tree diffs).
pub(crate) fn classify_local(err: &git2::Error) -> Error {
    let message = err.message().to_string();
    match err.code() {
        ErrorCode::NotFound => return Error::not_found(message),
        ErrorCode::Auth => return Error::authentication(message),
        _ => {}
    }
    match err.class() {
        ErrorClass::Os | ErrorClass::Filesystem => Error::filesystem(message),
        _ => Error::repository(message),
    }
}

/// HTTP-class transport errors carry their status only in the message.
fn classify_http_message(message: String) -> Error {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("401") || lowered.contains("authentication") {
        Error::authentication(message)
    } else if lowered.contains("404") || lowered.contains("not found") {
        Error::not_found(message)
    } else {
        Error::transport(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_code_maps_to_authentication() {
        let err = git2::Error::new(ErrorCode::Auth, ErrorClass::Http, "denied");
        assert!(classify_transport(&err).is_auth());
    }

    #[test]
    fn http_404_maps_to_not_found() {
        let err = git2::Error::new(
            ErrorCode::GenericError,
            ErrorClass::Http,
            "unexpected http status code: 404",
        );
        assert!(classify_transport(&err).is_not_found());
    }

    #[test]
    fn user_abort_maps_to_cancelled() {
        let err = git2::Error::new(ErrorCode::User, ErrorClass::Callback, "cancelled by caller");
        assert!(classify_transport(&err).is_cancelled());
    }

    #[test]
    fn local_default_is_repository_failure() {
        let err = git2::Error::new(ErrorCode::GenericError, ErrorClass::Odb, "corrupt object");
        assert_eq!(
            classify_local(&err).kind(),
            gitfleet_core::ErrorKind::RepositoryFailure
        );
    }
}
