//! Localizable string tables bundled with the crate.
//!
//! Tables are JSON objects mapping keys to strings, embedded at compile time.
//! The response extraction pattern lives here rather than in code.

use std::collections::HashMap;

use crate::error::ClientError;

/// Table holding SOAP-related strings.
pub const SOAP_TABLE: &str = "SOAP";

/// Key of the pattern that extracts `ProcessText` results.
pub const PROCESS_TEXT_PATTERN_KEY: &str = "soap.response.processText.regex.text";

const TABLES: &[(&str, &str)] = &[(SOAP_TABLE, include_str!("../resources/SOAP.json"))];

/// Look up `key` in the bundled table named `table`.
pub fn localized_string(table: &str, key: &str) -> Result<String, ClientError> {
    let missing = || ClientError::MissingResource {
        table: table.to_string(),
        key: key.to_string(),
    };

    let raw = TABLES
        .iter()
        .find(|(name, _)| *name == table)
        .map(|(_, raw)| *raw)
        .ok_or_else(missing)?;

    let mut strings: HashMap<String, String> =
        serde_json::from_str(raw).map_err(|source| ClientError::InvalidResourceTable {
            table: table.to_string(),
            source,
        })?;

    strings.remove(key).ok_or_else(missing)
}
