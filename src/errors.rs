use std::fmt;

/// Failures raised anywhere in the generation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("nothing was submitted")]
    EmptyInput,
    #[error("failed to read {path}: {message}")]
    FileRead { path: String, message: String },
    #[error("Gemini request failed: {0}")]
    Transport(String),
    #[error("Gemini request failed with status {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Gemini rejected the credential: {0}")]
    Auth(String),
    #[error("unexpected Gemini response: {0}")]
    MalformedResponse(String),
    #[error("image generation prompt is empty")]
    EmptyPrompt,
    #[error("run was superseded by a newer request")]
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NothingSubmitted,
    CredentialInvalid,
    AccessForbidden,
    Network,
    UnexpectedResponse,
    ServiceError,
    FileUnreadable,
    Superseded,
}

impl ErrorCategory {
    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::NothingSubmitted => "nothing_submitted",
            ErrorCategory::CredentialInvalid => "credential_invalid",
            ErrorCategory::AccessForbidden => "access_forbidden",
            ErrorCategory::Network => "network",
            ErrorCategory::UnexpectedResponse => "unexpected_response",
            ErrorCategory::ServiceError => "service_error",
            ErrorCategory::FileUnreadable => "file_unreadable",
            ErrorCategory::Superseded => "superseded",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failure reduced to what the user should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub message: String,
    pub detail: String,
}

pub const NOTHING_SUBMITTED_MESSAGE: &str = "Please enter a question or upload a file.";
pub const CREDENTIAL_INVALID_MESSAGE: &str =
    "Your Google AI API key is not valid. Please check the GEMINI_API_KEY configuration.";
pub const ACCESS_FORBIDDEN_MESSAGE: &str = "API call failed (Error 403): access is forbidden. Please ensure your key is correct, active, and that the Gemini API and billing are enabled for your Google Cloud project.";
pub const NETWORK_MESSAGE: &str =
    "A network error occurred. Please check your internet connection and try again.";
pub const UNEXPECTED_RESPONSE_MESSAGE: &str =
    "Received an unexpected response from the AI service. Please try again later.";
pub const FILE_UNREADABLE_MESSAGE: &str =
    "The selected file could not be read. Please choose the file again.";
pub const SUPERSEDED_MESSAGE: &str = "This request was replaced by a newer one.";

pub fn classify_error(err: &GenerationError) -> ClassifiedError {
    let (category, message) = match err {
        GenerationError::EmptyInput => (
            ErrorCategory::NothingSubmitted,
            NOTHING_SUBMITTED_MESSAGE.to_string(),
        ),
        GenerationError::Auth(_) => (
            ErrorCategory::CredentialInvalid,
            CREDENTIAL_INVALID_MESSAGE.to_string(),
        ),
        GenerationError::Http { status: 403, .. } => (
            ErrorCategory::AccessForbidden,
            ACCESS_FORBIDDEN_MESSAGE.to_string(),
        ),
        GenerationError::Http { status, .. } => (
            ErrorCategory::ServiceError,
            format!("The AI service returned an error (status {status}). Please try again."),
        ),
        GenerationError::Transport(_) => (ErrorCategory::Network, NETWORK_MESSAGE.to_string()),
        GenerationError::MalformedResponse(_) | GenerationError::EmptyPrompt => (
            ErrorCategory::UnexpectedResponse,
            UNEXPECTED_RESPONSE_MESSAGE.to_string(),
        ),
        GenerationError::FileRead { .. } => (
            ErrorCategory::FileUnreadable,
            FILE_UNREADABLE_MESSAGE.to_string(),
        ),
        GenerationError::Superseded => {
            (ErrorCategory::Superseded, SUPERSEDED_MESSAGE.to_string())
        }
    };

    ClassifiedError {
        category,
        message,
        detail: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_status_gets_its_own_category() {
        let classified = classify_error(&GenerationError::Http {
            status: 403,
            message: "PERMISSION_DENIED".to_string(),
        });
        assert_eq!(classified.category, ErrorCategory::AccessForbidden);
        assert_eq!(classified.message, ACCESS_FORBIDDEN_MESSAGE);
        assert!(classified.detail.contains("PERMISSION_DENIED"));
    }

    #[test]
    fn other_statuses_are_generic_service_errors() {
        let classified = classify_error(&GenerationError::Http {
            status: 500,
            message: "internal".to_string(),
        });
        assert_eq!(classified.category, ErrorCategory::ServiceError);
        assert!(classified.message.contains("500"));
    }

    #[test]
    fn maps_each_failure_kind_to_a_stable_category() {
        let cases = [
            (GenerationError::EmptyInput, ErrorCategory::NothingSubmitted),
            (
                GenerationError::Auth("API key not valid".to_string()),
                ErrorCategory::CredentialInvalid,
            ),
            (
                GenerationError::Transport("dns error".to_string()),
                ErrorCategory::Network,
            ),
            (
                GenerationError::MalformedResponse("missing text".to_string()),
                ErrorCategory::UnexpectedResponse,
            ),
            (
                GenerationError::FileRead {
                    path: "a.pdf".to_string(),
                    message: "denied".to_string(),
                },
                ErrorCategory::FileUnreadable,
            ),
            (GenerationError::Superseded, ErrorCategory::Superseded),
        ];

        for (err, expected) in cases {
            assert_eq!(classify_error(&err).category, expected, "{err}");
        }
    }
}
