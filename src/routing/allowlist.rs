//! Email allowlist for sign-in style endpoints.

use std::collections::HashSet;

/// One allowlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EmailRule {
    /// A full address, stored lowercase.
    Exact(String),
    /// Every address at exactly this domain (`@company.com`), stored lowercase.
    Domain(String),
}

impl EmailRule {
    /// Parse a config entry. Returns `None` for anything that is neither an
    /// address nor an `@domain` suffix.
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim().to_ascii_lowercase();
        if let Some(domain) = entry.strip_prefix('@') {
            return is_valid_domain(domain).then(|| EmailRule::Domain(domain.to_string()));
        }
        split_address(&entry)?;
        Some(EmailRule::Exact(entry))
    }
}

/// Splits `local@domain`, requiring exactly one `@` and non-empty parts.
fn split_address(address: &str) -> Option<(&str, &str)> {
    let (local, domain) = address.split_once('@')?;
    if local.is_empty() || local.chars().any(char::is_whitespace) || !is_valid_domain(domain) {
        return None;
    }
    Some((local, domain))
}

fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.chars().any(char::is_whitespace)
}

/// Compiled allowlist.
#[derive(Debug, Clone, Default)]
pub struct EmailAllowlist {
    exact: HashSet<String>,
    domains: HashSet<String>,
}

impl EmailAllowlist {
    /// Build from config entries; unparseable entries are skipped with a warning.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for entry in entries {
            match EmailRule::parse(entry.as_ref()) {
                Some(EmailRule::Exact(address)) => {
                    list.exact.insert(address);
                }
                Some(EmailRule::Domain(domain)) => {
                    list.domains.insert(domain);
                }
                None => {
                    tracing::warn!(entry = entry.as_ref(), "Skipping invalid email allowlist entry");
                }
            }
        }
        list
    }

    /// Returns true if the address is listed exactly or its domain is listed.
    pub fn is_allowed(&self, email: &str) -> bool {
        let email = email.trim().to_ascii_lowercase();
        match split_address(&email) {
            Some((_, domain)) => self.exact.contains(&email) || self.domains.contains(domain),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.domains.is_empty()
    }
}
