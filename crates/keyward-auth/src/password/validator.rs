//! Password policy for new passwords.
//!
//! Applied on register, change and reset. Login never checks policy, so
//! tightening the rules does not lock existing users out.

use keyward_core::config::AuthConfig;
use keyward_core::error::AppError;

/// A single character-class requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Uppercase,
    Lowercase,
    Digit,
    Symbol,
}

impl Rule {
    const ALL: [Rule; 4] = [Rule::Uppercase, Rule::Lowercase, Rule::Digit, Rule::Symbol];

    fn satisfied_by(self, c: char) -> bool {
        match self {
            Self::Uppercase => c.is_uppercase(),
            Self::Lowercase => c.is_lowercase(),
            Self::Digit => c.is_ascii_digit(),
            Self::Symbol => !c.is_alphanumeric(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Uppercase => "an uppercase letter",
            Self::Lowercase => "a lowercase letter",
            Self::Digit => "a digit",
            Self::Symbol => "a special character",
        }
    }
}

/// Checks new passwords against the configured policy.
#[derive(Debug, Clone)]
pub struct PasswordValidator {
    min_length: usize,
}

impl PasswordValidator {
    /// Builds the policy from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            min_length: config.password_min_length,
        }
    }

    /// Returns a single validation error naming every unmet requirement.
    pub fn validate(&self, password: &str) -> Result<(), AppError> {
        let mut problems = Vec::new();

        if password.chars().count() < self.min_length {
            problems.push(format!("at least {} characters", self.min_length));
        }
        problems.extend(
            Rule::ALL
                .into_iter()
                .filter(|rule| !password.chars().any(|c| rule.satisfied_by(c)))
                .map(|rule| rule.describe().to_string()),
        );

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(format!(
                "Password must contain {}",
                problems.join(", ")
            )))
        }
    }

    /// Rejects a new password equal to the current one.
    pub fn validate_not_same(&self, current: &str, new: &str) -> Result<(), AppError> {
        if current == new {
            return Err(AppError::validation(
                "New password must be different from the current password",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PasswordValidator {
        PasswordValidator::new(&AuthConfig::default())
    }

    #[test]
    fn test_accepts_compliant_password() {
        assert!(policy().validate("Secret1!").is_ok());
    }

    #[test]
    fn test_each_rule_is_enforced() {
        let v = policy();
        for weak in ["Sec1!", "secret1!", "SECRET1!", "Secrets!", "Secret12"] {
            let err = v.validate(weak).unwrap_err();
            assert_eq!(err.kind, keyward_core::ErrorKind::Validation, "{weak}");
        }
    }

    #[test]
    fn test_reports_all_violations() {
        let err = policy().validate("abc").unwrap_err();
        assert!(err.message.contains("at least 8 characters"));
        assert!(err.message.contains("an uppercase letter"));
        assert!(err.message.contains("a digit"));
        assert!(err.message.contains("a special character"));
        assert!(!err.message.contains("a lowercase letter"));
    }

    #[test]
    fn test_length_counts_characters() {
        let v = PasswordValidator::new(&AuthConfig {
            password_min_length: 4,
            ..AuthConfig::default()
        });
        assert!(v.validate("Éé1!").is_ok());
    }

    #[test]
    fn test_not_same() {
        let v = policy();
        assert!(v.validate_not_same("Secret1!", "Secret1!").is_err());
        assert!(v.validate_not_same("Secret1!", "Secret2!").is_ok());
    }
}
