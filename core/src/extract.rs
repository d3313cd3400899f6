//! Locating the result text inside a raw response body.
//!
//! The service wraps its answer in a SOAP envelope. Instead of parsing XML,
//! the client applies a configured pattern with one capture group. The
//! `ResponseExtractor` trait keeps that choice replaceable.

use regex::Regex;

/// Pulls the processed text out of a decoded response body.
pub trait ResponseExtractor: Send + Sync {
    fn extract(&self, body: &str) -> Option<String>;
}

/// Extractor driven by a regular expression with exactly one capture group.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    regex: Regex,
}

impl PatternExtractor {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl ResponseExtractor for PatternExtractor {
    fn extract(&self, body: &str) -> Option<String> {
        let captures = self.regex.captures(body)?;
        // group 0 is the whole match
        if captures.len() != 2 {
            return None;
        }
        captures.get(1).map(|m| m.as_str().to_string())
    }
}
