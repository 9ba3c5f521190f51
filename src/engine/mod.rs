// Extraction Engine Module
// Connection-string parsing and formatting

pub mod connection_uri;
pub mod error;
pub mod types;

pub use connection_uri::ConnectionUri;
pub use error::{UriError, UriErrorCode, UriResult};
pub use types::*;
