//! Admission rules for logins, passwords and profile names.
//!
//! These run before any hashing or persistence; a violation is always a
//! `BadRequest` and never touches the credential store.

use crate::error::{BazaarError, Result};

pub const LOGIN_MIN_LENGTH: usize = 3;
pub const LOGIN_MAX_LENGTH: usize = 30;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 32;
pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 30;

const PASSWORD_SYMBOLS: &str = "!@#$%^&*_";
const LOGIN_SYMBOLS: &str = "._-";

/// Which password rule a candidate broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordPolicyRule {
    TooShort,
    TooLong,
    ForbiddenCharacter,
}

impl PasswordPolicyRule {
    fn message(self) -> String {
        match self {
            Self::TooShort => format!(
                "password must be at least {PASSWORD_MIN_LENGTH} characters"
            ),
            Self::TooLong => format!(
                "password must be at most {PASSWORD_MAX_LENGTH} characters"
            ),
            Self::ForbiddenCharacter => format!(
                "password may contain only latin letters, digits and {PASSWORD_SYMBOLS}"
            ),
        }
    }
}

/// Evaluate a password against the admission policy.
pub fn check_password(password: &str) -> Option<PasswordPolicyRule> {
    if password.len() < PASSWORD_MIN_LENGTH {
        return Some(PasswordPolicyRule::TooShort);
    }
    if password.len() > PASSWORD_MAX_LENGTH {
        return Some(PasswordPolicyRule::TooLong);
    }
    if !password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c))
    {
        return Some(PasswordPolicyRule::ForbiddenCharacter);
    }
    None
}

pub fn validate_password(password: &str) -> Result<()> {
    match check_password(password) {
        Some(rule) => Err(BazaarError::bad_request(rule.message())),
        None => Ok(()),
    }
}

pub fn validate_login(login: &str) -> Result<()> {
    let shape_ok = (LOGIN_MIN_LENGTH..=LOGIN_MAX_LENGTH).contains(&login.len())
        && login
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || LOGIN_SYMBOLS.contains(c));

    if shape_ok {
        Ok(())
    } else {
        Err(BazaarError::bad_request("invalid login"))
    }
}

/// First and last names are counted in characters, not bytes.
pub fn validate_name(field: &str, value: &str) -> Result<()> {
    let chars = value.trim().chars().count();
    if (NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        Ok(())
    } else {
        Err(BazaarError::bad_request(format!(
            "{field} must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_length_bounds() {
        assert_eq!(check_password("short1!"), Some(PasswordPolicyRule::TooShort));
        assert_eq!(check_password("abcdefgh"), None);
        assert_eq!(check_password(&"a".repeat(32)), None);
        assert_eq!(
            check_password(&"a".repeat(33)),
            Some(PasswordPolicyRule::TooLong)
        );
    }

    #[test]
    fn password_alphabet() {
        assert_eq!(check_password("Pa$$w0rd_^&*"), None);
        assert_eq!(
            check_password("pass word1"),
            Some(PasswordPolicyRule::ForbiddenCharacter)
        );
        assert_eq!(
            check_password("пароль123"),
            Some(PasswordPolicyRule::ForbiddenCharacter)
        );
        assert!(matches!(
            validate_password("with-dash1"),
            Err(BazaarError::BadRequest(_))
        ));
    }

    #[test]
    fn login_shape() {
        assert!(validate_login("bob").is_ok());
        assert!(validate_login("john.doe_99-x").is_ok());
        assert!(validate_login("ab").is_err());
        assert!(validate_login(&"a".repeat(31)).is_err());
        assert!(validate_login("bad login").is_err());
        assert!(validate_login("mail@host").is_err());
    }

    #[test]
    fn names_count_characters() {
        assert!(validate_name("first_name", "Иван").is_ok());
        assert!(validate_name("first_name", "A").is_err());
        assert!(validate_name("last_name", &"я".repeat(30)).is_ok());
        assert!(validate_name("last_name", &"я".repeat(31)).is_err());
    }
}
