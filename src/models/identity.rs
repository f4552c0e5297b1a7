use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Strip the punctuation people paste along with agency/account numbers.
///
/// Only `-`, `.` and surrounding whitespace are removed; inner spacing is
/// left alone. Applying it twice is a no-op.
pub fn normalize_identifier(input: &str) -> String {
    input.trim().replace(['-', '.'], "")
}

/// A normalized agency/account/password triple.
///
/// Construction validates the password shape; an identity that exists is
/// always well-formed. The password is the 6-digit internet-banking PIN
/// typed on the portal's secure keypad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    agency: String,
    account: String,
    password: String,
}

impl AccountIdentity {
    pub fn new(
        agency: impl AsRef<str>,
        account: impl AsRef<str>,
        password: impl AsRef<str>,
    ) -> Result<Self> {
        let agency = normalize_identifier(agency.as_ref());
        let account = normalize_identifier(account.as_ref());
        let password = normalize_identifier(password.as_ref());

        if agency.is_empty() {
            return Err(Error::Validation("agency number is empty".into()));
        }
        if account.is_empty() {
            return Err(Error::Validation("account number is empty".into()));
        }
        if password.len() != 6 || !password.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Validation(
                "password must be exactly 6 digits".into(),
            ));
        }

        Ok(Self {
            agency,
            account,
            password,
        })
    }

    pub fn agency(&self) -> &str {
        &self.agency
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Filesystem-safe key used by the session store.
    pub fn storage_key(&self) -> String {
        format!("{}_{}", self.agency, self.account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_hyphens_periods_and_surrounding_whitespace() {
        assert_eq!(normalize_identifier(" 12345-6 "), "123456");
        assert_eq!(normalize_identifier("1.234"), "1234");
        assert_eq!(normalize_identifier("12 34"), "12 34");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [" 12345-6 ", "1.2-3.4", "plain", "  spaced out  "] {
            let once = normalize_identifier(raw);
            assert_eq!(normalize_identifier(&once), once);
        }
    }

    #[test]
    fn identity_normalizes_each_field() {
        let identity = AccountIdentity::new("1234", "12345-6", "123456").unwrap();
        assert_eq!(identity.agency(), "1234");
        assert_eq!(identity.account(), "123456");
        assert_eq!(identity.password(), "123456");
        assert_eq!(identity.storage_key(), "1234_123456");
    }

    #[test]
    fn password_must_be_six_digits() {
        assert!(matches!(
            AccountIdentity::new("1234", "123456", "12345"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            AccountIdentity::new("1234", "123456", "12345a"),
            Err(Error::Validation(_))
        ));
        // Punctuation is stripped before the digit check.
        assert!(AccountIdentity::new("1234", "123456", "123-456").is_ok());
    }
}
