// sfu - connection-string configuration extractor
// Core library

//! Turns a connection string such as
//! `snow://user:password:account@database/table?warehouse=wh` into the
//! field mapping a warehouse client session is constructed from.
//!
//! ```
//! let config = sfu::configuration("snow://abc:xyz:123@db/tb?warehouse=wh&p=p", true)?;
//! assert_eq!(config.get("account").map(String::as_str), Some("123"));
//! assert!(!config.contains_key("p"));
//!
//! let mut uri: sfu::ConnectionUri = "snow://abc:xyz:123@db/tb?warehouse=wh".parse()?;
//! uri.set_password("");
//! assert_eq!(uri.to_string(), "snow://abc::123@db/tb?warehouse=wh");
//! # Ok::<(), sfu::UriError>(())
//! ```

pub mod commands;
pub mod config;
pub mod engine;
pub mod observability;

pub use config::SfuConfig;
pub use engine::connection_uri::{
    configuration, credentials, for_connection, for_db, for_table, for_warehouse, ConnectionUri,
};
pub use engine::{ConfigMap, UriError, UriErrorCode, UriResult};
