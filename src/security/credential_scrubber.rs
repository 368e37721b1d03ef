//! Credential scrubbing utilities for preventing sensitive data exposure.
//!
//! This module provides functions to detect and scrub sensitive information
//! like access keys, secrets, and tokens from strings before they are logged.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex patterns for detecting various types of credentials
    static ref CREDENTIAL_PATTERNS: Vec<(Regex, &'static str)> = vec![
        // Access key assignments, including the pb_key env name
        (Regex::new(r"(?i)\b(aws[_-]?access[_-]?key[_-]?id|access[_-]?key[_-]?id|access[_-]?key|pb[_-]?key)\s*[:=]\s*([A-Za-z0-9]{16,128})").unwrap(),
         "$1=<REDACTED_ACCESS_KEY>"),

        // Secret key assignments, including the sh_key env name
        (Regex::new(r"(?i)\b(aws[_-]?secret[_-]?access[_-]?key|secret[_-]?access[_-]?key|secret[_-]?key|sh[_-]?key)\s*[:=]\s*([A-Za-z0-9/+=]{16,})").unwrap(),
         "$1=<REDACTED_SECRET>"),

        // SigV4 credential scope inside an Authorization header
        (Regex::new(r"Credential=[A-Za-z0-9]{16,128}/").unwrap(),
         "Credential=<REDACTED_ACCESS_KEY>/"),

        // Bare AWS access key IDs
        (Regex::new(r"\b(AKIA|ASIA)[A-Z0-9]{16}\b").unwrap(),
         "<REDACTED_ACCESS_KEY>"),

        // Bearer tokens
        (Regex::new(r"(?i)(bearer|authorization)\s*[:=]\s*(bearer\s+)?([A-Za-z0-9\-._~+/]+=*)").unwrap(),
         "$1=<REDACTED_TOKEN>"),

        // Security tokens in query strings
        (Regex::new(r"(?i)(x-amz-security-token|x-amz-signature)=([^&\s]+)").unwrap(),
         "$1=<REDACTED_TOKEN>"),

        // Basic auth in URLs
        (Regex::new(r"(https?://)([^:/@\s]+):([^@/\s]+)@").unwrap(),
         "$1<REDACTED_USER>:<REDACTED_PASS>@"),
    ];
}

/// Scrub credentials from a string.
///
/// This function detects and replaces various types of credentials with
/// safe placeholder values to prevent accidental exposure in logs or error
/// messages.
///
/// # Example
///
/// ```
/// use rust_backup::security::credential_scrubber::scrub_credentials;
///
/// let input = "session failed for sh_key=wJalrXUtnFEMIK7MDENGbPxRfiCYEXAMPLEKEY";
/// let scrubbed = scrub_credentials(input);
/// assert_eq!(scrubbed, "session failed for sh_key=<REDACTED_SECRET>");
/// ```
pub fn scrub_credentials(input: &str) -> String {
    let mut result = input.to_string();

    for (pattern, replacement) in CREDENTIAL_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }

    result
}

/// Replace every occurrence of known secret values.
///
/// Used for the configured credential pair, which can appear in error text
/// without any recognisable `key=value` shape around it. Values shorter than
/// four characters are ignored so short strings cannot blank out ordinary text.
pub fn redact_literals(input: &str, secrets: &[String]) -> String {
    let mut result = input.to_string();
    for secret in secrets.iter().filter(|s| s.len() >= 4) {
        if result.contains(secret.as_str()) {
            result = result.replace(secret.as_str(), "<REDACTED>");
        }
    }
    result
}

/// Create a safe error message that scrubs credentials.
pub fn safe_error_message(context: &str, error: &impl std::fmt::Display) -> String {
    let raw_message = format!("{}: {}", context, error);
    scrub_credentials(&raw_message)
}
