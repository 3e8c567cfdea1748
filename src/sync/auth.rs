//! Form checks for sign-in and sign-up, run before any request is made.

use std::sync::LazyLock;

use regex::Regex;

use crate::common::{ClientError, ClientResult};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email.trim())
}

pub fn validate_login(email: &str, password: &str) -> ClientResult<()> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ClientError::validation("Email and password are required"));
    }
    if !is_valid_email(email) {
        return Err(ClientError::validation("Please enter a valid email address"));
    }
    Ok(())
}

pub fn validate_registration(name: &str, email: &str, password: &str) -> ClientResult<()> {
    if name.trim().is_empty() {
        return Err(ClientError::validation("Name is required"));
    }
    validate_login(email, password)
}
