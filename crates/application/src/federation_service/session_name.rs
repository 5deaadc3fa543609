const MAX_SESSION_NAME_LENGTH: usize = 64;

/// Derives the issuer session name `<subject>-<role>`.
///
/// Characters outside `[A-Za-z0-9+=,.@_-]` become `_`, and the result is cut to 64 characters.
#[must_use]
pub fn session_name(subject: &str, role: &str) -> String {
    format!("{subject}-{role}")
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() || "+=,.@_-".contains(character) {
                character
            } else {
                '_'
            }
        })
        .take(MAX_SESSION_NAME_LENGTH)
        .collect()
}
