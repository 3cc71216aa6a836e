//! Local input validation, run before anything touches the network.

use crate::{AuthError, AuthResult};

/// Minimum password length the backend enforces at registration.
const PASSWORD_MIN_LENGTH: usize = 8;

/// TOTP codes are exactly six digits.
pub const MFA_CODE_LENGTH: usize = 6;

/// Check that an email is plausibly an email.
///
/// Intentionally loose: the backend owns real validation, this only catches
/// obvious typos before a round trip.
pub fn validate_email(email: &str) -> AuthResult<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::validation("email", "Email is required"));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::validation("email", "Enter a valid email address"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(AuthError::validation("email", "Enter a valid email address"));
    }
    Ok(())
}

/// Check a new password meets the registration minimum. Login does not use
/// this; existing accounts may predate the rule.
pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.is_empty() {
        return Err(AuthError::validation("password", "Password is required"));
    }
    if password.len() < PASSWORD_MIN_LENGTH {
        return Err(AuthError::validation(
            "password",
            format!("Password must be at least {PASSWORD_MIN_LENGTH} characters"),
        ));
    }
    Ok(())
}

/// Strip everything but digits from an MFA code and cap it at six digits.
///
/// Codes are often pasted with spaces or dashes ("123 456"); the cleaned
/// form is what gets sent.
pub fn sanitize_mfa_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit())
        .take(MFA_CODE_LENGTH)
        .collect()
}
