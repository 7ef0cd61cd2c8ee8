// src/bot/filters.rs - Content predicates evaluated by the dispatcher

use anyhow::{anyhow, Context, Result};
use log::debug;
use regex::Regex;

use crate::config::FilterConfig;
use crate::types::{InboundMessage, WordPattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Forwarded,
    Link,
    Profanity,
    RestrictedFile,
}

impl FilterKind {
    /// Forwarded messages are removed silently; everything else gets a notice
    pub fn notifies(&self) -> bool {
        !matches!(self, FilterKind::Forwarded)
    }

    pub fn notice(&self, sender: &str) -> String {
        match self {
            FilterKind::Forwarded => String::new(),
            FilterKind::Link => format!("{}, links are not allowed here.", sender),
            FilterKind::Profanity => format!("{}, watch your language.", sender),
            FilterKind::RestrictedFile => format!("{}, that file type is not allowed here.", sender),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMatch {
    pub kind: FilterKind,
    pub reason: String,
}

/// A single content predicate. Filters never act; they only report a match.
pub trait ContentFilter: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, message: &InboundMessage) -> Option<FilterMatch>;
}

pub struct ForwardFilter;

impl ContentFilter for ForwardFilter {
    fn name(&self) -> &'static str {
        "forwarded"
    }

    fn check(&self, message: &InboundMessage) -> Option<FilterMatch> {
        message.is_forwarded.then(|| FilterMatch {
            kind: FilterKind::Forwarded,
            reason: "forwarded message".to_string(),
        })
    }
}

pub struct LinkFilter {
    pattern: Regex,
    whitelist: Vec<String>,
}

impl LinkFilter {
    pub fn new(pattern: &str, whitelist: &[String]) -> Result<Self> {
        let pattern = Regex::new(pattern).with_context(|| format!("Invalid link pattern '{}'", pattern))?;
        Ok(Self {
            pattern,
            whitelist: whitelist.iter().map(|d| d.to_lowercase()).collect(),
        })
    }

    /// The host must be a whitelisted domain or one of its subdomains
    fn is_whitelisted(&self, link: &str) -> bool {
        let host = link_host(link);
        self.whitelist
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
    }
}

/// Lowercased host of a matched link, without scheme, credentials, port or path
fn link_host(link: &str) -> String {
    let rest = link.split_once("://").map_or(link, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host.split_once(':').map_or(host, |(host, _)| host);
    host.trim_end_matches('.').to_lowercase()
}

impl ContentFilter for LinkFilter {
    fn name(&self) -> &'static str {
        "links"
    }

    /// A message passes only if every link in it points at a whitelisted domain
    fn check(&self, message: &InboundMessage) -> Option<FilterMatch> {
        let blocked = self
            .pattern
            .find_iter(message.content())
            .find(|m| !self.is_whitelisted(m.as_str()))?;

        Some(FilterMatch {
            kind: FilterKind::Link,
            reason: format!("link {}", blocked.as_str()),
        })
    }
}

pub struct ProfanityFilter {
    patterns: Vec<WordPattern>,
    whole_words_only: bool,
}

impl ProfanityFilter {
    pub fn new(entries: &[String], whole_words_only: bool) -> Result<Self> {
        let patterns = entries
            .iter()
            .map(|entry| WordPattern::parse(entry).map_err(|e| anyhow!("profanity entry '{}': {}", entry, e)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            patterns,
            whole_words_only,
        })
    }
}

impl ContentFilter for ProfanityFilter {
    fn name(&self) -> &'static str {
        "profanity"
    }

    fn check(&self, message: &InboundMessage) -> Option<FilterMatch> {
        let original = message.content();
        if original.is_empty() {
            return None;
        }
        let lowered = original.to_lowercase();

        self.patterns
            .iter()
            .any(|p| p.matches(&lowered, original, self.whole_words_only))
            .then(|| FilterMatch {
                kind: FilterKind::Profanity,
                reason: "blocked word".to_string(),
            })
    }
}

pub struct ExtensionFilter {
    blocked: Vec<String>,
}

impl ExtensionFilter {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            blocked: extensions.iter().map(|e| normalize_extension(e)).collect(),
        }
    }
}

impl ContentFilter for ExtensionFilter {
    fn name(&self) -> &'static str {
        "extensions"
    }

    fn check(&self, message: &InboundMessage) -> Option<FilterMatch> {
        let extension = normalize_extension(message.attachment_extension.as_deref()?);
        self.blocked.contains(&extension).then(|| FilterMatch {
            kind: FilterKind::RestrictedFile,
            reason: format!(".{} attachment", extension),
        })
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Ordered filters; the first match wins
pub struct FilterChain {
    filters: Vec<Box<dyn ContentFilter>>,
}

impl FilterChain {
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        let mut filters: Vec<Box<dyn ContentFilter>> = Vec::new();

        if config.delete_forwarded {
            filters.push(Box::new(ForwardFilter));
        }
        if config.block_links {
            filters.push(Box::new(LinkFilter::new(&config.link_pattern, &config.link_whitelist)?));
        }
        if !config.profanity.is_empty() {
            filters.push(Box::new(ProfanityFilter::new(&config.profanity, config.whole_words_only)?));
        }
        if !config.blocked_extensions.is_empty() {
            filters.push(Box::new(ExtensionFilter::new(&config.blocked_extensions)));
        }

        debug!("Content filter chain: {:?}", filters.iter().map(|f| f.name()).collect::<Vec<_>>());
        Ok(Self { filters })
    }

    pub fn first_match(&self, message: &InboundMessage) -> Option<FilterMatch> {
        self.filters.iter().find_map(|filter| filter.check(message))
    }
}
