use validator::ValidateEmail;

/// Validates that the input looks like a valid email address
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

/// Validates a coupon code.
/// Rules:
/// - 1-50 characters
/// - Only ASCII letters, numbers, hyphens, underscores
/// - No whitespace allowed
pub fn is_valid_coupon_code(code: &str) -> bool {
    if code.is_empty() || code.len() > 50 {
        return false;
    }

    code.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
