//! Common Name synthesis for ingresses whose hosts are all too long to be used
//! as a certificate's Common Name.
//!
//! Two strategies are supported. When operators configure a list of fallback
//! names, the first one that fits is always used. Otherwise a short name is
//! derived from the host itself: its first few alphanumeric characters, a
//! random suffix and a fixed parent domain.

use crate::CN_LIMIT;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::str::FromStr;
use thiserror::Error;

/// Parent domain of derived Common Names.
pub const DEFAULT_DOMAIN: &str = "tls-host-controller.local";

const PREFIX_LEN: usize = 6;
const SUFFIX_LEN: usize = 6;

// `<prefix>.<suffix>.` precedes the parent domain.
const MAX_DOMAIN_LEN: usize = CN_LIMIT - PREFIX_LEN - SUFFIX_LEN - 2;

const DNS_NAME_REGEX: &str =
    r"^(\*\.)?[A-Za-z0-9]([-A-Za-z0-9]*[A-Za-z0-9])?(\.[A-Za-z0-9]([-A-Za-z0-9]*[A-Za-z0-9])?)*$";

static DNS_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(DNS_NAME_REGEX).expect("DNS name regex must compile"));

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("common name must not be empty")]
    Empty,

    #[error("common name {0:?} is longer than 63 bytes")]
    TooLong(String),

    #[error("common name {0:?} is not a valid DNS name")]
    InvalidName(String),

    #[error("domain {0:?} leaves no room for a derived common name")]
    DomainTooLong(String),

    #[error("host {0:?} does not start with any alphanumeric characters")]
    NoPrefix(String),

    #[error("none of the configured common names fit within 63 bytes")]
    NoneFit,
}

/// Operator-configured fallback Common Names, in the order they were given.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommonNames(Vec<String>);

/// Produces the random part of derived Common Names.
pub trait Suffix {
    /// Returns `len` lowercase ASCII letters.
    fn suffix(&self, len: usize) -> String;
}

/// Draws suffixes from the calling thread's random number generator.
#[derive(Copy, Clone, Debug, Default)]
pub struct RandomSuffix;

#[derive(Clone, Debug)]
pub struct Synthesizer<S = RandomSuffix> {
    configured: CommonNames,
    domain: String,
    suffix: S,
}

/// Checks that `name` is usable as a certificate's Common Name.
pub fn validate(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::Empty);
    }
    if name.len() > CN_LIMIT {
        return Err(Error::TooLong(name.to_string()));
    }
    if !DNS_NAME.is_match(name) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

// === impl CommonNames ===

impl CommonNames {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }

    fn first_fitting(&self) -> Option<&str> {
        self.iter().find(|cn| cn.len() <= CN_LIMIT)
    }
}

impl FromStr for CommonNames {
    type Err = Error;

    /// Parses a comma-separated list of names. An empty (or blank) string is
    /// an empty list.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }

        s.split(',')
            .map(|cn| {
                let cn = cn.trim();
                validate(cn)?;
                Ok(cn.to_string())
            })
            .collect::<Result<Vec<_>, Error>>()
            .map(Self)
    }
}

impl<S: Into<String>> FromIterator<S> for CommonNames {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// === impl RandomSuffix ===

impl Suffix for RandomSuffix {
    fn suffix(&self, len: usize) -> String {
        let rng = &mut rand::thread_rng();
        (0..len).map(|_| rng.gen_range('a'..='z')).collect()
    }
}

// === impl Synthesizer ===

impl Synthesizer {
    pub fn new(configured: CommonNames, domain: impl Into<String>) -> Result<Self, Error> {
        Self::with_suffix(configured, domain, RandomSuffix)
    }
}

impl<S: Suffix> Synthesizer<S> {
    pub fn with_suffix(
        configured: CommonNames,
        domain: impl Into<String>,
        suffix: S,
    ) -> Result<Self, Error> {
        let domain = domain.into();
        validate(&domain)?;
        if domain.len() > MAX_DOMAIN_LEN {
            return Err(Error::DomainTooLong(domain));
        }

        Ok(Self {
            configured,
            domain,
            suffix,
        })
    }

    /// Returns a Common Name to stand in for `host`, which is too long to be
    /// used itself.
    ///
    /// When names are configured the result only depends on the
    /// configuration.
    pub fn synthesize(&self, host: &str) -> Result<String, Error> {
        if !self.configured.is_empty() {
            return self
                .configured
                .first_fitting()
                .map(str::to_string)
                .ok_or(Error::NoneFit);
        }

        let prefix = host
            .chars()
            .take(PREFIX_LEN)
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>();
        if prefix.is_empty() {
            return Err(Error::NoPrefix(host.to_string()));
        }

        let cn = format!(
            "{prefix}.{}.{}",
            self.suffix.suffix(SUFFIX_LEN),
            self.domain
        );
        validate(&cn)?;
        Ok(cn)
    }
}
