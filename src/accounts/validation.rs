//! Registration and login input checks.
//!
//! Each check returns every failing field so a client can fix them all in one
//! round trip.

use std::collections::BTreeMap;

pub type FieldErrors = BTreeMap<&'static str, String>;

pub const MAX_NAME_BYTES: usize = 500;
pub const MAX_EMAIL_BYTES: usize = 500;
pub const MIN_PASSWORD_BYTES: usize = 8;
pub const MAX_PASSWORD_BYTES: usize = 72;

pub fn check_email(email: &str, errors: &mut FieldErrors) {
    if email.is_empty() {
        errors.insert("email", "must be provided".into());
    } else if email.len() > MAX_EMAIL_BYTES {
        errors.insert("email", format!("must not be more than {MAX_EMAIL_BYTES} bytes long"));
    } else if !looks_like_email(email) {
        errors.insert("email", "must be a valid email address".into());
    }
}

pub fn check_password(password: &str, errors: &mut FieldErrors) {
    if password.is_empty() {
        errors.insert("password", "must be provided".into());
    } else if password.len() < MIN_PASSWORD_BYTES {
        errors.insert(
            "password",
            format!("must be at least {MIN_PASSWORD_BYTES} bytes long"),
        );
    } else if password.len() > MAX_PASSWORD_BYTES {
        errors.insert(
            "password",
            format!("must not be more than {MAX_PASSWORD_BYTES} bytes long"),
        );
    }
}

pub fn check_registration(name: &str, email: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if name.trim().is_empty() {
        errors.insert("name", "must be provided".into());
    } else if name.len() > MAX_NAME_BYTES {
        errors.insert("name", format!("must not be more than {MAX_NAME_BYTES} bytes long"));
    }
    check_email(email, &mut errors);
    check_password(password, &mut errors);
    errors
}

pub fn check_login(email: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_email(email, &mut errors);
    check_password(password, &mut errors);
    errors
}

/// `local@domain.tld` with no whitespace; deliverability is not checked.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}
