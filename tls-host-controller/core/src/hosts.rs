use std::{cmp::Ordering, collections::BTreeSet};

/// A deduplicated set of ingress hostnames.
///
/// Empty hostnames are never stored: a rule without a host matches all
/// traffic and cannot be covered by a certificate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostSet(BTreeSet<String>);

// === impl HostSet ===

impl HostSet {
    pub fn insert(&mut self, host: impl Into<String>) -> bool {
        let host = host.into();
        if host.is_empty() {
            return false;
        }
        self.0.insert(host)
    }

    pub fn contains(&self, host: &str) -> bool {
        self.0.contains(host)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }

    /// Returns the hosts in `self` that are not in `covered`.
    ///
    /// `self` holds the hosts declared by routing rules and `covered` the
    /// hosts already listed by TLS blocks.
    pub fn uncovered(&self, covered: &HostSet) -> HostSet {
        self.0.difference(&covered.0).cloned().collect()
    }

    /// Consumes the set, returning its hosts ordered shortest first.
    ///
    /// Hosts of equal length are ordered lexicographically, so the first
    /// element is always the same Common Name candidate for a given set.
    pub fn into_ordered(self) -> Vec<String> {
        let mut hosts = self.0.into_iter().collect::<Vec<_>>();
        hosts.sort_by(|a, b| by_length(a, b));
        hosts
    }
}

fn by_length(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl<S: Into<String>> FromIterator<S> for HostSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<S: Into<String>> Extend<S> for HostSet {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        for host in iter {
            self.insert(host);
        }
    }
}

impl IntoIterator for HostSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
