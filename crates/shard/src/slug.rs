//! Key -> slug -> shard id.
//!
//! The slug is the most significant label of a host name: `reddit` for
//! `www.reddit.com`, `bbc` for `news.bbc.co.uk`. Every host of one site maps
//! to the same slug, so a site lands in a single shard.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use url::Url;

use crate::SlugError;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1 (multiply, then xor).
///
/// Shard ids are persisted as directory names, so this must never change.
#[must_use]
pub fn fnv1_64(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in data {
        hash = hash.wrapping_mul(FNV_PRIME);
        hash ^= u64::from(b);
    }
    hash
}

fn host_pattern() -> &'static Regex {
    static HOST: OnceLock<Regex> = OnceLock::new();
    HOST.get_or_init(|| {
        Regex::new(r"^([a-zA-Z0-9](?:[a-zA-Z0-9.-]*[a-zA-Z0-9])?)").expect("host pattern compiles")
    })
}

/// Public suffix rules used to find a host's registrable label.
///
/// Always backed by the compiled-in public suffix list. Extra rules (for
/// hosting platforms the list does not know about, say) are merged with it
/// the way the list merges its own entries: the longest matching suffix
/// wins. A wildcard rule `*.platform.example` makes every label directly
/// under `platform.example` a suffix of its own. Build one at startup and
/// pass it by reference.
#[derive(Debug, Clone, Default)]
pub struct SuffixRules {
    /// Normalized plain suffixes.
    exact: Vec<String>,
    /// Wildcard rules, stored without their leading `*.`.
    wildcard: Vec<String>,
}

impl SuffixRules {
    /// Only the compiled-in list.
    #[must_use]
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Compiled-in list plus `rules`.
    pub fn with_extra<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut r = Self::default();
        for rule in rules {
            r.add_rule(rule.as_ref());
        }
        r
    }

    /// Reads extra rules from a file in public suffix list format: one rule
    /// per line, `//` comments and blank lines ignored.
    pub fn load_extra<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read suffix rules from {}", path.display()))?;
        Ok(Self::with_extra(text.lines()))
    }

    /// Adds one rule. Returns `false` for comments, blanks, exceptions and
    /// duplicates.
    pub fn add_rule(&mut self, rule: &str) -> bool {
        let rule = rule.trim();
        // exceptions only carve holes into wildcards, which we do not model
        if rule.is_empty() || rule.starts_with("//") || rule.starts_with('!') {
            return false;
        }
        let (list, rule) = match rule.strip_prefix("*.") {
            Some(base) => (&mut self.wildcard, base),
            None => (&mut self.exact, rule),
        };
        let rule = rule.trim_matches('.').to_ascii_lowercase();
        if rule.is_empty() || list.contains(&rule) {
            return false;
        }
        list.push(rule);
        true
    }

    /// Number of extra rules on top of the builtin list.
    #[must_use]
    pub fn extra_len(&self) -> usize {
        self.exact.len() + self.wildcard.len()
    }

    /// Byte length of the longest extra suffix of `host`, if any rule applies.
    fn extra_suffix_len(&self, host: &str) -> Option<usize> {
        let exact = self
            .exact
            .iter()
            .filter(|rule| host == rule.as_str() || labels_above(host, rule).is_some())
            .map(String::len);
        let wildcard = self.wildcard.iter().filter_map(|rule| {
            let label = labels_above(host, rule)?.rsplit('.').next()?;
            (!label.is_empty()).then(|| label.len() + 1 + rule.len())
        });
        exact.chain(wildcard).max()
    }

    /// Returns the label directly left of the public suffix, or `None` when
    /// `host` is itself a suffix or cannot be parsed.
    ///
    /// `host` must already be lower case without a trailing dot.
    pub fn second_level_label(&self, host: &str) -> Option<String> {
        let builtin = psl::suffix(host.as_bytes()).map(|s| s.as_bytes().len());
        let suffix_len = builtin.max(self.extra_suffix_len(host))?;
        if host.len() <= suffix_len + 1 {
            return None;
        }
        host[..host.len() - suffix_len - 1]
            .rsplit('.')
            .next()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
    }
}

/// The part of `host` left of `.suffix`, when `suffix` ends `host` on a
/// label boundary.
fn labels_above<'a>(host: &'a str, suffix: &str) -> Option<&'a str> {
    host.strip_suffix(suffix)?.strip_suffix('.')
}

/// Pulls a normalized host out of `key`.
///
/// Absolute URLs use their host, with punycode labels decoded back to
/// Unicode so `http://bücher.de/` hashes as `bücher`. Anything else
/// (`example.com/path`, a bare host name) falls back to the leading run of
/// host characters.
fn extract_host(key: &str) -> Result<String, SlugError> {
    if let Ok(url) = Url::parse(key) {
        if let Some(host) = url.host_str() {
            let host = host.trim_end_matches('.');
            if !host.is_empty() {
                return Ok(to_unicode(host));
            }
        }
    }

    let caps = host_pattern()
        .captures(key)
        .ok_or_else(|| SlugError::NoHost {
            key: key.to_string(),
        })?;
    Ok(caps[1].trim_end_matches('.').to_ascii_lowercase())
}

/// Lower-cased Unicode form of an ASCII (possibly punycode) host. Labels
/// that fail to decode keep their ASCII form.
fn to_unicode(host: &str) -> String {
    let punycode = |l: &str| l.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("xn--"));
    if !host.split('.').any(punycode) {
        return host.to_ascii_lowercase();
    }
    let (unicode, result) = idna::domain_to_unicode(host);
    match result {
        Ok(()) => unicode,
        Err(_) => host.to_ascii_lowercase(),
    }
}

/// Computes the slug of `key`.
///
/// Falls back to the whole host when the suffix rules cannot find a
/// registrable label (single-label hosts, IP addresses).
///
/// # Errors
///
/// [`SlugError::NoHost`] when no host-like token can be found at all.
pub fn slug(key: &str, rules: &SuffixRules) -> Result<String, SlugError> {
    let host = extract_host(key)?;
    Ok(rules.second_level_label(&host).unwrap_or(host))
}

/// Maps `key` to a shard in `[0, 2^bits)`.
pub fn shard_id(key: &str, bits: u32, rules: &SuffixRules) -> Result<u64, SlugError> {
    let slug = slug(key, rules)?;
    Ok(reduce(fnv1_64(slug.as_bytes()), bits))
}

fn reduce(hash: u64, bits: u32) -> u64 {
    if bits >= u64::BITS {
        hash
    } else {
        hash % (1u64 << bits)
    }
}
