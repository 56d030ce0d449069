//! crates/devlingo_core/src/validation.rs
//!
//! Credential checks that run before any call reaches the auth backend.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

pub const MIN_NAME_LEN: usize = 2;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Field name -> message, one entry per rejected field.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("Invalid input in {} field(s)", .0.len())]
pub struct FieldErrors(pub BTreeMap<&'static str, String>);

impl FieldErrors {
    fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if !email_pattern().is_match(email.trim()) {
        errors.add("email", "Enter a valid email");
    }
}

fn check_password(errors: &mut FieldErrors, field: &'static str, password: &str, label: &str) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            field,
            format!("{} must have at least {} characters", label, MIN_PASSWORD_LEN),
        );
    }
}

/// Canonical form an email is stored and looked up in.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_sign_in(email: &str, password: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    check_email(&mut errors, email);
    check_password(&mut errors, "password", password, "The password");
    errors.into_result()
}

pub fn validate_sign_up(
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if name.trim().chars().count() < MIN_NAME_LEN {
        errors.add(
            "name",
            format!("The name must have at least {} characters", MIN_NAME_LEN),
        );
    }
    check_email(&mut errors, email);
    check_password(&mut errors, "password", password, "The password");
    check_password(
        &mut errors,
        "confirm_password",
        confirm_password,
        "The confirmation",
    );
    if password != confirm_password {
        errors.add("confirm_password", "Passwords do not match");
    }
    errors.into_result()
}
