use subtle::ConstantTimeEq;

/// Constant-time string comparison to prevent timing attacks
/// Use this for comparing API tokens and other sensitive values
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Check a request's Authorization header against the configured token.
///
/// With no token configured every request is allowed.
pub fn is_authorized(expected: Option<&str>, header_value: Option<&str>) -> bool {
    match expected {
        None => true,
        Some(expected) => header_value
            .and_then(bearer_token)
            .is_some_and(|token| constant_time_compare(token, expected)),
    }
}
