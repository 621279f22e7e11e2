use serde::{Deserialize, Serialize};

/// Structured error information extracted from MongoDB errors.
///
/// Used when logging failed counts and fetches so that throttling, timeouts
/// and server selection problems can be told apart in the diagnostics.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl ErrorInfo {
    /// Convert error info to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Whether the server reported that the operation hit its `maxTimeMS`.
    pub fn is_time_limit(&self) -> bool {
        self.code == Some(50)
    }
}

/// Render a MongoDB error as a single-line description for logs.
pub fn describe_mongodb_error(error: &mongodb::error::Error) -> String {
    let info = extract_error_info(error);
    info.to_json_compact()
        .unwrap_or_else(|_| error.to_string())
}

/// Extract structured information from a MongoDB error using the driver API.
pub fn extract_error_info(error: &mongodb::error::Error) -> ErrorInfo {
    use mongodb::error::ErrorKind;

    let mut info = ErrorInfo::default();

    match error.kind.as_ref() {
        ErrorKind::Command(command_error) => {
            info.error_type = Some("mongo.command_error".to_string());
            info.code = Some(command_error.code);
            info.message = Some(command_error.message.clone());
            info.name = get_error_name(command_error.code)
                .or_else(|| Some(command_error.code_name.clone()).filter(|n| !n.is_empty()));
        }
        ErrorKind::Authentication { message, .. } => {
            info.error_type = Some("mongo.authentication_error".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::InvalidArgument { message, .. } => {
            info.error_type = Some("mongo.invalid_argument".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::ServerSelection { message, .. } => {
            info.error_type = Some("mongo.server_selection_error".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::Io(io_error) => {
            info.error_type = Some("mongo.io_error".to_string());
            info.message = Some(io_error.to_string());
        }
        _ => {
            info.message = Some(error.to_string());
        }
    }

    info
}

/// Get a human-readable error name for the codes a read-only export hits.
fn get_error_name(code: i32) -> Option<String> {
    let name = match code {
        13 => "Unauthorized",
        18 => "AuthenticationFailed",
        26 => "NamespaceNotFound",
        50 => "MaxTimeMSExpired",
        91 => "ShutdownInProgress",
        189 => "PrimarySteppedDown",
        262 => "ExceededTimeLimit",
        462 => "IngressRequestRateLimitExceeded",
        _ => return None,
    };

    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names() {
        assert_eq!(get_error_name(50).as_deref(), Some("MaxTimeMSExpired"));
        assert_eq!(get_error_name(12345), None);
    }

    #[test]
    fn test_time_limit_detection() {
        let info = ErrorInfo {
            code: Some(50),
            ..ErrorInfo::default()
        };
        assert!(info.is_time_limit());
        assert!(!ErrorInfo::default().is_time_limit());
    }

    #[test]
    fn test_compact_json_skips_empty_fields() {
        let info = ErrorInfo {
            error_type: Some("mongo.io_error".to_string()),
            message: Some("reset".to_string()),
            ..ErrorInfo::default()
        };
        assert_eq!(
            info.to_json_compact().unwrap(),
            r#"{"type":"mongo.io_error","message":"reset"}"#
        );
    }
}
