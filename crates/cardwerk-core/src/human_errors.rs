// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Every technical error is mapped to plain English with a clear suggestion
// the user can act on (pick another file, retry folder selection, rename the
// card, ...).

use crate::error::CardwerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Timeout or worker hiccup; retrying may help.
    Transient,
    /// User must do something (rename a card, re-select a folder).
    ActionRequired,
    /// Cannot be fixed by retrying: wrong format, damaged file.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retrying the same action might succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `CardwerkError` into a `HumanError`.
pub fn humanize_error(err: &CardwerkError) -> HumanError {
    match err {
        // -- Decode errors --
        CardwerkError::UnsupportedFormat { file, .. } => HumanError {
            message: format!("{file} isn't a supported photo."),
            suggestion: "Use a JPEG, PNG, HEIC, HEIF, or AVIF photo of the cards.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        CardwerkError::DecodeFailure { file, .. } => HumanError {
            message: format!("We couldn't open {file}."),
            suggestion: "The file may be damaged. Try exporting it again from your camera or phone as a JPEG.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        CardwerkError::ContextCreationFailure { file, .. } => HumanError {
            message: format!("{file} is too large to process."),
            suggestion: "Try a smaller photo, or close other programs to free memory.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Detection --
        CardwerkError::DetectionFailure { file, .. } => HumanError {
            message: format!("Card detection didn't work on {file}."),
            suggestion: "Photograph the cards on a plain, contrasting background, or draw the card outlines by hand.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Session / pairing --
        CardwerkError::MissingWorkingImage(file) => HumanError {
            message: format!("{file} hasn't finished loading."),
            suggestion: "Wait for the photo to finish loading, then export again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        CardwerkError::UnresolvedDetection { file, detection } => HumanError {
            message: "A paired card no longer exists.".into(),
            suggestion: format!(
                "Re-pair the card in the pairing step. ({detection} in {file})"
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // -- Export --
        CardwerkError::NameCollision(path) => HumanError {
            message: "A file with the same name is already in the export folder.".into(),
            suggestion: format!(
                "Rename the card or choose an empty folder, then export again. ({path})"
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        CardwerkError::PermissionRevoked(path) => HumanError {
            message: "We lost access to the export folder.".into(),
            suggestion: format!("Select the folder again and retry the export. ({path})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        CardwerkError::ExportFailure { pair, .. } => HumanError {
            message: format!("Images for {pair} couldn't be created."),
            suggestion: "Check the card outline in the detection step, then export again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        CardwerkError::Archive(_) => HumanError {
            message: "The ZIP download couldn't be created.".into(),
            suggestion: "Make sure there is enough disk space, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Worker --
        CardwerkError::Timeout { operation, .. } => HumanError {
            message: format!("The {operation} step took too long."),
            suggestion: "Try again with a smaller photo, or raise worker.request_timeout_secs.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        CardwerkError::WorkerUnavailable(_) => HumanError {
            message: "The image processor stopped unexpectedly.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        CardwerkError::InvalidConfig(detail) => HumanError {
            message: "The settings file has an invalid value.".into(),
            suggestion: format!("Fix or delete the configuration file. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // -- Storage --
        CardwerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Cardwerk doesn't have permission to use that location.".into(),
                    suggestion: "Check the folder permissions, or choose a different folder.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your disk may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        CardwerkError::Serialization(_) => HumanError {
            message: "Cardwerk had an internal data problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_is_action_required() {
        let human = humanize_error(&CardwerkError::NameCollision(
            "Base/Pikachu/FRONT_LISTING.jpg".into(),
        ));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
        assert!(human.suggestion.contains("Rename"));
    }

    #[test]
    fn revoked_permission_asks_to_reselect_folder() {
        let human = humanize_error(&CardwerkError::PermissionRevoked("/exports".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.suggestion.contains("Select the folder again"));
    }

    #[test]
    fn unsupported_format_is_permanent_and_names_file() {
        let human = humanize_error(&CardwerkError::UnsupportedFormat {
            file: "notes.txt".into(),
            detail: "text/plain".into(),
        });
        assert_eq!(human.severity, Severity::Permanent);
        assert!(human.message.contains("notes.txt"));
    }

    #[test]
    fn timeout_is_transient() {
        let human = humanize_error(&CardwerkError::Timeout {
            operation: "detect".into(),
            seconds: 120,
        });
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }
}
