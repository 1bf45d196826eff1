//! Route pattern matching.
//!
//! # Responsibilities
//! - Parse route patterns from config (exact or `/*` wildcard)
//! - Match request paths (case-sensitive)
//! - Rank patterns so the most specific one wins
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Wildcards only at the end, on a segment boundary
//! - No regex to guarantee O(n) matching

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathPattern {
    /// Matches exactly one path.
    Exact(String),
    /// Matches `base` itself and everything below `base/`. Empty base matches all paths.
    Prefix(String),
}

impl PathPattern {
    /// Parse a pattern such as `/api/data`, `/api/*` or `/*`.
    pub fn parse(pattern: &str) -> Option<Self> {
        if !pattern.starts_with('/') {
            return None;
        }

        match pattern.strip_suffix("/*") {
            Some(base) if !base.contains('*') => Some(PathPattern::Prefix(base.to_string())),
            Some(_) => None,
            None if pattern.contains('*') => None,
            None => Some(PathPattern::Exact(pattern.to_string())),
        }
    }

    /// Returns true if the request path matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(exact) => exact == path,
            PathPattern::Prefix(base) => match path.strip_prefix(base.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }

    /// Length of the literal part; longer is more specific.
    pub fn specificity(&self) -> usize {
        match self {
            PathPattern::Exact(p) | PathPattern::Prefix(p) => p.len(),
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, PathPattern::Exact(_))
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathPattern::Exact(p) => f.write_str(p),
            PathPattern::Prefix(base) => write!(f, "{base}/*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(
            PathPattern::parse("/api/data"),
            Some(PathPattern::Exact("/api/data".into()))
        );
        assert_eq!(
            PathPattern::parse("/api/*"),
            Some(PathPattern::Prefix("/api".into()))
        );
        assert_eq!(PathPattern::parse("/*"), Some(PathPattern::Prefix(String::new())));
        assert_eq!(PathPattern::parse("api/data"), None);
        assert_eq!(PathPattern::parse("/api/*/x"), None);
        assert_eq!(PathPattern::parse("/api*"), None);
    }

    #[test]
    fn test_exact_matcher() {
        let pattern = PathPattern::parse("/api/data").unwrap();
        assert!(pattern.matches("/api/data"));
        assert!(!pattern.matches("/api/data/1"));
        assert!(!pattern.matches("/API/data")); // Case sensitive
    }

    #[test]
    fn test_prefix_matcher() {
        let pattern = PathPattern::parse("/api/*").unwrap();
        assert!(pattern.matches("/api"));
        assert!(pattern.matches("/api/v1/users"));
        assert!(!pattern.matches("/apix"));
        assert!(!pattern.matches("/images"));

        let root = PathPattern::parse("/*").unwrap();
        assert!(root.matches("/"));
        assert!(root.matches("/anything/at/all"));
    }

    #[test]
    fn test_display_round_trips_config_form() {
        assert_eq!(PathPattern::parse("/api/*").unwrap().to_string(), "/api/*");
        assert_eq!(PathPattern::parse("/*").unwrap().to_string(), "/*");
    }
}
