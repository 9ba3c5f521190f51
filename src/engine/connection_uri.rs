// SPDX-License-Identifier: Apache-2.0

//! Connection URI parsing module
//!
//! Extracts client session configuration from a connection string of the form
//! `scheme://user:password[:account]@database/table?key=value&...`.
//!
//! One parse/format routine backs two call styles: free functions that take
//! the URI string on every call, and [`ConnectionUri`], an editable wrapper
//! that serializes back to a URI with its fields in their original positions.

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::str::FromStr;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::{form_urlencoded, Url};

use super::error::{UriError, UriResult};
use super::types::{
    is_reserved_key, ConfigMap, QueryParam, KEY_ACCOUNT, KEY_DATABASE, KEY_PASSWORD, KEY_USER,
    KEY_WAREHOUSE,
};
use crate::observability::Sensitive;

/// Escaped inside the userinfo segment. `:` must be escaped so a re-encoded
/// user or password cannot shift the account boundary.
const USERINFO: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Escaped inside the table path; `/` stays literal.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Escaped inside an edited query key or value. RFC 3986 allows `/`, `:`,
/// `@` and `?` literally in a query, so they are left alone.
const QUERY: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'`');

const REDACTED_PASSWORD: &str = "***";

/// Connection fields held as individually editable values.
///
/// After construction the fields are the single source of truth: every
/// accessor and the [`Display`](fmt::Display) output are computed from them.
/// The table and each query pair also remember their original text, which is
/// written back verbatim until that field is edited.
///
/// Empty strings are normalized to "absent" by the setters, so an emptied
/// field disappears from every extracted mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUri {
    scheme: String,
    user: Option<String>,
    password: Option<Sensitive<String>>,
    account: Option<String>,
    database: Option<String>,
    table: Option<String>,
    table_raw: Option<String>,
    params: Vec<QueryParam>,
}

impl ConnectionUri {
    /// Parse a connection string.
    ///
    /// Fails when the `url` parser rejects the input, when there is no `//`
    /// authority, when a component is not valid percent-encoded UTF-8, when
    /// the host carries a port, or when the password segment holds more than
    /// one account separator.
    pub fn parse(uri: &str) -> UriResult<Self> {
        let url = Url::parse(uri)?;

        // Without an authority the userinfo would end up in the path
        if !url.has_authority() {
            return Err(UriError::invalid_uri("missing '//' authority"));
        }

        if let Some(port) = url.port() {
            return Err(UriError::PortNotSupported {
                host: url.host_str().unwrap_or_default().to_string(),
                port,
            });
        }

        let user = non_empty(decode_component(url.username(), KEY_USER)?);

        // `url` keeps everything after the first ':' as the password and
        // escapes further ':' as %3A, so the split happens after decoding.
        let (password, account) = match url.password() {
            Some(raw) => split_account(&decode_component(raw, KEY_PASSWORD)?)?,
            None => (None, None),
        };

        let database = url
            .host_str()
            .filter(|host| !host.is_empty())
            .map(String::from);

        let path = url.path();
        let raw_table = path.strip_prefix('/').unwrap_or(path);
        let table = non_empty(decode_component(raw_table, "table")?);
        let table_raw = table.as_ref().map(|_| raw_table.to_string());

        let params = url
            .query()
            .unwrap_or_default()
            .split('&')
            .filter(|piece| !piece.is_empty())
            .filter_map(|piece| {
                form_urlencoded::parse(piece.as_bytes())
                    .next()
                    .map(|(key, value)| {
                        QueryParam::parsed(key.into_owned(), value.into_owned(), piece)
                    })
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            scheme = url.scheme(),
            has_user = user.is_some(),
            has_password = password.is_some(),
            has_account = account.is_some(),
            query_params = params.len(),
            "Parsed connection URI"
        );

        Ok(Self {
            scheme: url.scheme().to_string(),
            user,
            password: password.map(Sensitive::new),
            account,
            database,
            table,
            table_raw,
            params,
        })
    }

    // -------------------------------------------------------------------------
    // Extraction
    // -------------------------------------------------------------------------

    /// Credential fields only: `user`, `password` and `account` when set.
    pub fn credentials(&self) -> ConfigMap {
        let mut config = ConfigMap::new();

        if let Some(user) = self.user() {
            config.insert(KEY_USER.to_string(), user.to_string());
        }
        if let Some(password) = self.password() {
            config.insert(KEY_PASSWORD.to_string(), password.to_string());
        }
        if let Some(account) = self.account() {
            config.insert(KEY_ACCOUNT.to_string(), account.to_string());
        }

        config
    }

    /// Credentials plus single-valued query parameters and the database.
    ///
    /// With `safe` set only reserved query keys pass through. Query keys with
    /// no value or with several values are dropped in both modes. The host
    /// is applied last, so it wins over a `database` query parameter.
    pub fn configuration(&self, safe: bool) -> ConfigMap {
        let mut config = self.credentials();

        for (key, value) in self.single_valued_params() {
            if !safe || is_reserved_key(key) {
                config.insert(key.to_string(), value.to_string());
            }
        }

        if let Some(database) = self.for_db() {
            config.insert(KEY_DATABASE.to_string(), database.to_string());
        }

        config
    }

    /// Everything needed to open a connection. Same as [`Self::configuration`].
    pub fn for_connection(&self, safe: bool) -> ConfigMap {
        self.configuration(safe)
    }

    /// Database name for a `USE DATABASE` statement.
    pub fn for_db(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Warehouse name for a `USE WAREHOUSE` statement.
    ///
    /// Always read in unsafe mode, so the answer does not depend on a
    /// caller's safe-mode default.
    pub fn for_warehouse(&self) -> Option<String> {
        self.configuration(false).remove(KEY_WAREHOUSE)
    }

    /// Table name for a `SELECT ... FROM` statement.
    pub fn for_table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Render the URI with the password masked, for log lines.
    pub fn redacted(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_uri(&mut out, true);
        out
    }

    // -------------------------------------------------------------------------
    // Field access
    // -------------------------------------------------------------------------

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn set_user(&mut self, user: impl Into<String>) {
        self.user = non_empty(user.into());
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose().as_str())
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = non_empty(password.into()).map(Sensitive::new);
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn set_account(&mut self, account: impl Into<String>) {
        self.account = non_empty(account.into());
    }

    /// The database lives in the host position of the URI.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Replace the host. An empty string clears it.
    ///
    /// Fails with [`UriError::InvalidHost`] when the value would not parse
    /// back as the host of this URI, e.g. because it holds a space, a `/` or
    /// a port.
    pub fn set_database(&mut self, database: impl Into<String>) -> UriResult<()> {
        let database = database.into();
        if database.is_empty() {
            self.database = None;
            return Ok(());
        }

        validate_host(&self.scheme, &database)?;
        self.database = Some(database);
        Ok(())
    }

    /// The table lives in the path position of the URI.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn set_table(&mut self, table: impl Into<String>) {
        let table = table.into();
        self.table = non_empty(table.strip_prefix('/').unwrap_or(&table).to_string());
        self.table_raw = None;
    }

    /// First `warehouse` value in the query string, whether or not it is
    /// unique. See [`Self::for_warehouse`] for the extraction view.
    pub fn warehouse(&self) -> Option<&str> {
        self.param(KEY_WAREHOUSE)
    }

    pub fn set_warehouse(&mut self, warehouse: impl Into<String>) {
        self.set_param(KEY_WAREHOUSE, warehouse);
    }

    /// Query parameters in their original order.
    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    /// First value recorded for `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    /// Set a query parameter.
    ///
    /// An existing key keeps the position of its first occurrence and loses
    /// any further occurrences; a new key is appended.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        match self.params.iter().position(|p| p.key == key) {
            Some(first) => {
                self.params[first].value = value;
                self.params[first].raw = None;
                let mut index = 0;
                self.params.retain(|p| {
                    let keep = index <= first || p.key != key;
                    index += 1;
                    keep
                });
            }
            None => self.params.push(QueryParam::new(key, value)),
        }
    }

    /// Remove every occurrence of `key`. Returns whether anything was removed.
    pub fn remove_param(&mut self, key: &str) -> bool {
        let before = self.params.len();
        self.params.retain(|p| p.key != key);
        self.params.len() != before
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Query parameters carrying exactly one non-empty value, in order.
    fn single_valued_params(&self) -> Vec<(&str, &str)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for param in self.params.iter().filter(|p| !p.value.is_empty()) {
            *counts.entry(param.key.as_str()).or_default() += 1;
        }

        self.params
            .iter()
            .filter(|p| !p.value.is_empty() && counts.get(p.key.as_str()) == Some(&1))
            .map(|p| (p.key.as_str(), p.value.as_str()))
            .collect()
    }

    /// Empty fields are not written, so an input such as `abc:xyz:@db`
    /// (blank account) comes back as `abc:xyz@db`.
    fn write_uri<W: Write>(&self, out: &mut W, redact: bool) -> fmt::Result {
        write!(out, "{}://", self.scheme)?;

        let has_secret = self.password.is_some() || self.account.is_some();
        if self.user.is_some() || has_secret {
            if let Some(user) = &self.user {
                write!(out, "{}", utf8_percent_encode(user, USERINFO))?;
            }
            if has_secret {
                out.write_char(':')?;
            }
            if let Some(password) = &self.password {
                if redact {
                    out.write_str(REDACTED_PASSWORD)?;
                } else {
                    write!(out, "{}", utf8_percent_encode(password.expose(), USERINFO))?;
                }
            }
            if let Some(account) = &self.account {
                write!(out, ":{}", utf8_percent_encode(account, USERINFO))?;
            }
            out.write_char('@')?;
        }

        if let Some(database) = &self.database {
            out.write_str(database)?;
        }

        if let Some(table) = &self.table {
            out.write_char('/')?;
            match &self.table_raw {
                Some(raw) => out.write_str(raw)?,
                None => write!(out, "{}", utf8_percent_encode(table, PATH))?,
            }
        }

        for (index, param) in self.params.iter().enumerate() {
            out.write_char(if index == 0 { '?' } else { '&' })?;

            if redact && param.key == KEY_PASSWORD {
                write!(out, "{}={}", KEY_PASSWORD, REDACTED_PASSWORD)?;
                continue;
            }

            match &param.raw {
                Some(raw) => out.write_str(raw)?,
                None => write!(
                    out,
                    "{}={}",
                    utf8_percent_encode(&param.key, QUERY),
                    utf8_percent_encode(&param.value, QUERY)
                )?,
            }
        }

        Ok(())
    }
}

impl fmt::Display for ConnectionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_uri(f, false)
    }
}

impl FromStr for ConnectionUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// Stateless surface
// =============================================================================

/// Credential fields of `uri`.
pub fn credentials(uri: &str) -> UriResult<ConfigMap> {
    Ok(ConnectionUri::parse(uri)?.credentials())
}

/// Credentials, database and query parameters of `uri`.
pub fn configuration(uri: &str, safe: bool) -> UriResult<ConfigMap> {
    Ok(ConnectionUri::parse(uri)?.configuration(safe))
}

/// Parameters for a connection constructor. Same as [`configuration`].
pub fn for_connection(uri: &str, safe: bool) -> UriResult<ConfigMap> {
    configuration(uri, safe)
}

pub fn for_db(uri: &str) -> UriResult<Option<String>> {
    Ok(ConnectionUri::parse(uri)?.for_db().map(String::from))
}

pub fn for_warehouse(uri: &str) -> UriResult<Option<String>> {
    Ok(ConnectionUri::parse(uri)?.for_warehouse())
}

pub fn for_table(uri: &str) -> UriResult<Option<String>> {
    Ok(ConnectionUri::parse(uri)?.for_table().map(String::from))
}

// =============================================================================
// Helper Functions
// =============================================================================

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn decode_component(raw: &str, component: &str) -> UriResult<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| UriError::invalid_encoding(component, e.to_string()))
}

/// Check that `host` reads back unchanged as the bare host of a `scheme` URI.
fn validate_host(scheme: &str, host: &str) -> UriResult<()> {
    let url = Url::parse(&format!("{}://{}", scheme, host))
        .map_err(|e| UriError::invalid_host(host, e.to_string()))?;

    let bare = url.host_str() == Some(host)
        && url.port().is_none()
        && url.username().is_empty()
        && url.password().is_none()
        && url.path().is_empty()
        && url.query().is_none()
        && url.fragment().is_none();

    if bare {
        Ok(())
    } else {
        Err(UriError::invalid_host(host, "not a bare host name"))
    }
}

/// Split a decoded password segment into password and account.
fn split_account(segment: &str) -> UriResult<(Option<String>, Option<String>)> {
    match segment.split_once(':') {
        None => Ok((non_empty(segment.to_string()), None)),
        Some((password, account)) => {
            if account.contains(':') {
                return Err(UriError::AmbiguousAccount {
                    separators: segment.matches(':').count(),
                });
            }
            Ok((
                non_empty(password.to_string()),
                non_empty(account.to_string()),
            ))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
