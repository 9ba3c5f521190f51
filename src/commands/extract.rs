//! Extraction Commands
//!
//! Serializable request/response surface over the connection URI extractor.
//! Failures are reported inside the response instead of as `Err`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::SfuConfig;
use crate::engine::connection_uri::ConnectionUri;
use crate::engine::error::UriErrorCode;
use crate::engine::types::ConfigMap;

/// Extraction views a caller can ask for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Credentials,
    Configuration,
    Connection,
    Db,
    Warehouse,
    Table,
    ToString,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Credentials,
        Operation::Configuration,
        Operation::Connection,
        Operation::Db,
        Operation::Warehouse,
        Operation::Table,
        Operation::ToString,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credentials => "credentials",
            Self::Configuration => "configuration",
            Self::Connection => "connection",
            Self::Db => "db",
            Self::Warehouse => "warehouse",
            Self::Table => "table",
            Self::ToString => "to_string",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == name)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|op| op.as_str()).collect();
                format!("Unknown operation '{}'. Expected one of: {}", s, known.join(", "))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub uri: String,
    pub operation: Operation,
    /// Falls back to the configured default when absent
    #[serde(default)]
    pub safe: Option<bool>,
}

/// Response from an extraction request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractResponse {
    pub success: bool,
    /// Mapping for credentials/configuration/connection requests
    pub config: Option<ConfigMap>,
    /// Single value for db/warehouse/table/to_string requests
    pub value: Option<String>,
    /// Error message (only present on failure)
    pub error: Option<String>,
    /// Error code for programmatic handling
    pub error_code: Option<UriErrorCode>,
}

impl ExtractResponse {
    fn with_mapping(config: ConfigMap) -> Self {
        Self {
            success: true,
            config: Some(config),
            value: None,
            error: None,
            error_code: None,
        }
    }

    fn with_value(value: Option<String>) -> Self {
        Self {
            success: true,
            config: None,
            value,
            error: None,
            error_code: None,
        }
    }
}

/// Run one extraction against a connection URI.
#[instrument(skip(request, config), fields(operation = %request.operation, uri_scheme))]
pub fn extract(request: &ExtractRequest, config: &SfuConfig) -> ExtractResponse {
    // Don't log the full URI as it carries credentials
    let span = tracing::Span::current();

    let uri = match ConnectionUri::parse(&request.uri) {
        Ok(uri) => {
            span.record("uri_scheme", uri.scheme());
            uri
        }
        Err(err) => {
            span.record("uri_scheme", scheme_hint(&request.uri));
            tracing::warn!(
                error = %err,
                error_code = ?err.code(),
                "Failed to parse connection URI"
            );

            return ExtractResponse {
                success: false,
                config: None,
                value: None,
                error: Some(err.to_string()),
                error_code: Some(err.code()),
            };
        }
    };

    let safe = request.safe.unwrap_or(config.default_safe);
    tracing::debug!(uri = %uri.redacted(), safe, "Extracting");

    let response = match request.operation {
        Operation::Credentials => ExtractResponse::with_mapping(uri.credentials()),
        Operation::Configuration => ExtractResponse::with_mapping(uri.configuration(safe)),
        Operation::Connection => ExtractResponse::with_mapping(uri.for_connection(safe)),
        Operation::Db => ExtractResponse::with_value(uri.for_db().map(String::from)),
        Operation::Warehouse => ExtractResponse::with_value(uri.for_warehouse()),
        Operation::Table => ExtractResponse::with_value(uri.for_table().map(String::from)),
        Operation::ToString => ExtractResponse::with_value(Some(uri.to_string())),
    };

    tracing::info!(
        field_count = response.config.as_ref().map(|c| c.len()),
        has_value = response.value.is_some(),
        "Extraction succeeded"
    );

    response
}

/// Scheme of an unparseable URI, or `"unknown"` when the text before the
/// first `:` is not a valid scheme.
fn scheme_hint(uri: &str) -> &str {
    let candidate = uri.split_once(':').map(|(scheme, _)| scheme).unwrap_or_default();
    let mut chars = candidate.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    if valid {
        candidate
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// In-memory log sink shared with a test subscriber
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn extract_logged(request: &ExtractRequest) -> (ExtractResponse, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();

        let response = tracing::subscriber::with_default(subscriber, || {
            extract(request, &SfuConfig::default())
        });
        (response, logs.contents())
    }

    fn request(operation: Operation, uri: &str, safe: Option<bool>) -> ExtractRequest {
        ExtractRequest {
            uri: uri.to_string(),
            operation,
            safe,
        }
    }

    #[test]
    fn test_extract_configuration_uses_default_safe() {
        let uri = "snow://abc:xyz:123@db/tb?warehouse=wh&p=p";

        let response = extract(&request(Operation::Configuration, uri, None), &SfuConfig::default());
        assert!(response.success);
        let config = response.config.unwrap();
        assert_eq!(config.get("warehouse").map(String::as_str), Some("wh"));
        assert!(!config.contains_key("p"));

        let permissive = SfuConfig {
            default_safe: false,
            ..SfuConfig::default()
        };
        let response = extract(&request(Operation::Configuration, uri, None), &permissive);
        assert_eq!(
            response.config.unwrap().get("p").map(String::as_str),
            Some("p")
        );
    }

    #[test]
    fn test_extract_explicit_safe_wins() {
        let uri = "snow://abc@db/tb?p=p";
        let response = extract(
            &request(Operation::Connection, uri, Some(false)),
            &SfuConfig::default(),
        );
        assert!(response.config.unwrap().contains_key("p"));
    }

    #[test]
    fn test_extract_values() {
        let uri = "snow://abc:xyz@db/tb?warehouse=wh";
        let config = SfuConfig::default();

        let db = extract(&request(Operation::Db, uri, None), &config);
        assert_eq!(db.value.as_deref(), Some("db"));
        assert!(db.config.is_none());

        let wh = extract(&request(Operation::Warehouse, uri, None), &config);
        assert_eq!(wh.value.as_deref(), Some("wh"));

        let tb = extract(&request(Operation::Table, uri, None), &config);
        assert_eq!(tb.value.as_deref(), Some("tb"));

        let s = extract(&request(Operation::ToString, uri, None), &config);
        assert_eq!(s.value.as_deref(), Some(uri));
    }

    #[test]
    fn test_extract_absent_value_still_succeeds() {
        let response = extract(
            &request(Operation::Warehouse, "snow://abc@db/tb", None),
            &SfuConfig::default(),
        );
        assert!(response.success);
        assert_eq!(response.value, None);
    }

    #[test]
    fn test_extract_invalid_uri() {
        let response = extract(
            &request(Operation::Credentials, "not a uri", None),
            &SfuConfig::default(),
        );
        assert!(!response.success);
        assert!(response.error.is_some());
        assert_eq!(response.error_code, Some(UriErrorCode::InvalidUri));
    }

    #[test]
    fn test_logs_never_contain_password() {
        for uri in [
            "abc:hunter2@db/tb",
            "snow//abc:hunter2@db:99999/tb",
            "snow://abc:hunter2@db:443/tb",
            "snow://abc:hunter2:acct@db/tb?password=hunter2",
        ] {
            let (_, logs) = extract_logged(&request(Operation::Credentials, uri, None));
            assert!(!logs.is_empty(), "{uri}: nothing captured");
            assert!(!logs.contains("hunter2"), "{uri}: {logs}");
        }
    }

    #[test]
    fn test_logs_record_scheme() {
        let (response, logs) =
            extract_logged(&request(Operation::Db, "snow://abc:xyz@db/tb", None));
        assert!(response.success);
        assert!(logs.contains("uri_scheme=\"snow\""), "{logs}");

        let (response, logs) = extract_logged(&request(Operation::Db, "abc:xyz@db/tb", None));
        assert_eq!(response.error_code, Some(UriErrorCode::InvalidUri));
        assert!(logs.contains("uri_scheme=\"abc\""), "{logs}");
    }

    #[test]
    fn test_scheme_hint() {
        assert_eq!(scheme_hint("snow+tls:rest"), "snow+tls");
        assert_eq!(scheme_hint("snow//abc:hunter2@db"), "unknown");
        assert_eq!(scheme_hint("1abc:x"), "unknown");
        assert_eq!(scheme_hint("no colon here"), "unknown");
        assert_eq!(scheme_hint(":x"), "unknown");
    }

    #[test]
    fn test_operation_from_str() {
        assert_eq!("credentials".parse::<Operation>().unwrap(), Operation::Credentials);
        assert_eq!("to-string".parse::<Operation>().unwrap(), Operation::ToString);
        assert_eq!("DB".parse::<Operation>().unwrap(), Operation::Db);
        let err = "schema".parse::<Operation>().unwrap_err();
        assert!(err.contains("configuration"));
    }

    #[test]
    fn test_request_deserialize() {
        let request: ExtractRequest =
            serde_json::from_str(r#"{"uri": "snow://abc@db/tb", "operation": "to_string"}"#)
                .unwrap();
        assert_eq!(request.operation, Operation::ToString);
        assert_eq!(request.safe, None);
    }

    #[test]
    fn test_response_serialization_has_error_code() {
        let response = extract(
            &request(Operation::Db, "snow://abc@db:443/tb", None),
            &SfuConfig::default(),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], "port_not_supported");
    }
}
