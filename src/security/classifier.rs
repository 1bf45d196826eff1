//! Automated client classification.
//!
//! A cheap user-agent heuristic that sheds obvious crawler and scripted
//! traffic before any token verification work. Not a security boundary.

use serde::{Deserialize, Serialize};

use crate::config::BotConfig;

/// Known crawler signatures, plus operator-supplied needles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum BotSignature {
    Googlebot,
    Bingbot,
    Slurp,
    DuckDuckBot,
    Baiduspider,
    YandexBot,
    Sogou,
    Exabot,
    FacebookExternalHit,
    IaArchiver,
    AhrefsBot,
    SemrushBot,
    Mj12Bot,
    DotBot,
    PetalBot,
    Bytespider,
    GptBot,
    CcBot,
    HeadlessChrome,
    /// Lowercased substring supplied in config.
    Custom(String),
}

static KNOWN: [BotSignature; 19] = [
    BotSignature::Googlebot,
    BotSignature::Bingbot,
    BotSignature::Slurp,
    BotSignature::DuckDuckBot,
    BotSignature::Baiduspider,
    BotSignature::YandexBot,
    BotSignature::Sogou,
    BotSignature::Exabot,
    BotSignature::FacebookExternalHit,
    BotSignature::IaArchiver,
    BotSignature::AhrefsBot,
    BotSignature::SemrushBot,
    BotSignature::Mj12Bot,
    BotSignature::DotBot,
    BotSignature::PetalBot,
    BotSignature::Bytespider,
    BotSignature::GptBot,
    BotSignature::CcBot,
    BotSignature::HeadlessChrome,
];

impl BotSignature {
    /// Every built-in signature.
    pub fn known() -> &'static [BotSignature] {
        &KNOWN
    }

    /// Lowercase substring searched for in the user-agent.
    pub fn needle(&self) -> &str {
        match self {
            BotSignature::Googlebot => "googlebot",
            BotSignature::Bingbot => "bingbot",
            BotSignature::Slurp => "slurp",
            BotSignature::DuckDuckBot => "duckduckbot",
            BotSignature::Baiduspider => "baiduspider",
            BotSignature::YandexBot => "yandexbot",
            BotSignature::Sogou => "sogou",
            BotSignature::Exabot => "exabot",
            BotSignature::FacebookExternalHit => "facebookexternalhit",
            BotSignature::IaArchiver => "ia_archiver",
            BotSignature::AhrefsBot => "ahrefsbot",
            BotSignature::SemrushBot => "semrushbot",
            BotSignature::Mj12Bot => "mj12bot",
            BotSignature::DotBot => "dotbot",
            BotSignature::PetalBot => "petalbot",
            BotSignature::Bytespider => "bytespider",
            BotSignature::GptBot => "gptbot",
            BotSignature::CcBot => "ccbot",
            BotSignature::HeadlessChrome => "headlesschrome",
            BotSignature::Custom(needle) => needle,
        }
    }

    /// `user_agent_lower` must already be lowercased.
    pub fn matches(&self, user_agent_lower: &str) -> bool {
        let needle = self.needle();
        !needle.is_empty() && user_agent_lower.contains(needle)
    }
}

impl From<String> for BotSignature {
    fn from(name: String) -> Self {
        let name = name.trim().to_ascii_lowercase();
        KNOWN
            .iter()
            .find(|sig| sig.needle() == name)
            .cloned()
            .unwrap_or(BotSignature::Custom(name))
    }
}

impl From<BotSignature> for String {
    fn from(sig: BotSignature) -> Self {
        sig.needle().to_string()
    }
}

/// Why a client was blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    MissingUserAgent,
    UserAgentTooShort,
    SignatureMatch(BotSignature),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Allow,
    Block(BlockReason),
}

/// User-agent based bot filter.
#[derive(Debug, Clone)]
pub struct ClientClassifier {
    signatures: Vec<BotSignature>,
    min_user_agent_len: usize,
}

impl ClientClassifier {
    pub fn new(signatures: Vec<BotSignature>, min_user_agent_len: usize) -> Self {
        Self {
            signatures,
            min_user_agent_len,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.signatures.clone(), config.min_user_agent_len)
    }

    pub fn classify(&self, user_agent: Option<&str>) -> Classification {
        let ua = match user_agent.map(str::trim) {
            None | Some("") => return Classification::Block(BlockReason::MissingUserAgent),
            Some(ua) => ua,
        };

        if ua.chars().count() < self.min_user_agent_len {
            return Classification::Block(BlockReason::UserAgentTooShort);
        }

        let lower = ua.to_lowercase();
        match self.signatures.iter().find(|sig| sig.matches(&lower)) {
            Some(sig) => Classification::Block(BlockReason::SignatureMatch(sig.clone())),
            None => Classification::Allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

    fn classifier() -> ClientClassifier {
        ClientClassifier::from_config(&BotConfig::default())
    }

    #[test]
    fn test_browser_allowed() {
        assert_eq!(classifier().classify(Some(FIREFOX)), Classification::Allow);
    }

    #[test]
    fn test_signature_case_insensitive() {
        let ua = "Mozilla/5.0 (compatible; GoogleBot/2.1; +http://www.google.com/bot.html)";
        assert_eq!(
            classifier().classify(Some(ua)),
            Classification::Block(BlockReason::SignatureMatch(BotSignature::Googlebot))
        );
    }

    #[test]
    fn test_missing_and_short_user_agents() {
        let c = classifier();
        assert_eq!(
            c.classify(None),
            Classification::Block(BlockReason::MissingUserAgent)
        );
        assert_eq!(
            c.classify(Some("   ")),
            Classification::Block(BlockReason::MissingUserAgent)
        );
        assert_eq!(
            c.classify(Some("curl/8")),
            Classification::Block(BlockReason::UserAgentTooShort)
        );
        assert_eq!(c.classify(Some("0123456789")), Classification::Allow);
    }

    #[test]
    fn test_custom_signature_from_config() {
        let sig = BotSignature::from("Python-Requests".to_string());
        assert_eq!(sig, BotSignature::Custom("python-requests".into()));

        let c = ClientClassifier::new(vec![sig.clone()], 10);
        assert_eq!(
            c.classify(Some("python-requests/2.31.0")),
            Classification::Block(BlockReason::SignatureMatch(sig))
        );
    }

    #[test]
    fn test_known_names_round_trip() {
        for sig in BotSignature::known() {
            assert_eq!(&BotSignature::from(String::from(sig.clone())), sig);
        }
    }

    #[test]
    fn test_empty_custom_needle_never_matches() {
        let c = ClientClassifier::new(vec![BotSignature::Custom(String::new())], 1);
        assert_eq!(c.classify(Some(FIREFOX)), Classification::Allow);
    }
}
