//! Input checks run before any request reaches the backend.

use crate::api::AuthError;

/// Validates and normalizes an email address (trimmed, lowercased).
///
/// # Errors
/// Returns a validation error for empty or malformed addresses.
pub fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::validation("Email is required."));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(head, tail)| !head.is_empty() && !tail.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid {
        return Err(AuthError::validation("Please enter a valid email address."));
    }
    Ok(email.to_lowercase())
}

/// Validates a magic-link token taken from a URL or pasted by the user.
///
/// # Errors
/// Returns a validation error for an empty token.
pub fn magic_link_token(token: &str) -> Result<&str, AuthError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::validation("The magic link token is missing."));
    }
    Ok(token)
}
