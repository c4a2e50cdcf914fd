use crate::{
    annotations,
    cn::{RandomSuffix, Suffix, Synthesizer},
    secret_name, HostSet, CN_LIMIT, SOLVER_INGRESS_PREFIX,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The capabilities the mutator needs from an Ingress, independent of the
/// schema version it was decoded from.
pub trait IngressResource {
    /// The ingress's name, or its `generateName` prefix when the API server
    /// has not yet assigned a name.
    fn name(&self) -> String;

    fn annotations_mut(&mut self) -> &mut BTreeMap<String, String>;

    /// Hosts declared by the ingress's routing rules.
    fn rule_hosts(&self) -> HostSet;

    /// Hosts listed by the ingress's existing TLS blocks.
    fn tls_hosts(&self) -> HostSet;

    /// Returns true if the ingress declares a TLS block list, even an empty
    /// one.
    fn has_explicit_tls(&self) -> bool;

    /// Appends `tls` to the ingress's TLS blocks.
    fn push_tls(&mut self, tls: TlsBlock);
}

/// A TLS block to be added to an ingress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsBlock {
    /// Never empty. The first host is used as the certificate's Common Name.
    pub hosts: Vec<String>,
    pub secret_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation<T> {
    Unchanged(Skip),
    Mutated(T),
}

/// Why an ingress was left unchanged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Skip {
    /// The ingress was created by cert-manager to solve a challenge.
    SolverIngress,
    ExplicitTls,
    NoHosts,
    /// None of the hosts can be used as a Common Name and no substitute could
    /// be synthesized.
    CommonName,
}

#[derive(Clone, Debug)]
pub struct Mutator<S = RandomSuffix> {
    synthesizer: Synthesizer<S>,
}

// === impl Mutation ===

impl<T> Mutation<T> {
    pub fn is_mutated(&self) -> bool {
        matches!(self, Self::Mutated(_))
    }
}

// === impl Skip ===

impl Skip {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SolverIngress => "solver_ingress",
            Self::ExplicitTls => "explicit_tls",
            Self::NoHosts => "no_hosts",
            Self::CommonName => "common_name",
        }
    }
}

impl std::fmt::Display for Skip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Mutator ===

impl<S: Suffix> Mutator<S> {
    pub fn new(synthesizer: Synthesizer<S>) -> Self {
        Self { synthesizer }
    }

    /// Adds a TLS block covering all of the ingress's hosts, and an issuer
    /// annotation, unless the ingress must be left alone.
    ///
    /// Mutating an already-mutated ingress leaves it unchanged, since it then
    /// declares TLS explicitly.
    pub fn mutate<T: IngressResource>(&self, mut ingress: T) -> Mutation<T> {
        let name = ingress.name();
        debug!(%name, "Checking ingress");

        // cert-manager's HTTP-01 solver ingresses are never mutated.
        if name.starts_with(SOLVER_INGRESS_PREFIX) {
            debug!(%name, "Skipping cert-manager solver ingress");
            return Mutation::Unchanged(Skip::SolverIngress);
        }

        if ingress.has_explicit_tls() {
            debug!(%name, "Skipping ingress with TLS configured");
            return Mutation::Unchanged(Skip::ExplicitTls);
        }

        let hosts = ingress.rule_hosts().uncovered(&ingress.tls_hosts());
        if hosts.is_empty() {
            debug!(%name, "Skipping ingress without host rules");
            return Mutation::Unchanged(Skip::NoHosts);
        }

        let mut hosts = hosts.into_ordered();
        if let Some(candidate) = hosts.first().filter(|h| h.len() > CN_LIMIT) {
            match self.synthesizer.synthesize(candidate) {
                Ok(cn) => {
                    debug!(%name, %cn, "Synthesized common name");
                    hosts.insert(0, cn);
                }
                Err(error) => {
                    warn!(%error, %name, "Unable to add TLS block");
                    return Mutation::Unchanged(Skip::CommonName);
                }
            }
        }

        let tls = TlsBlock {
            hosts,
            secret_name: secret_name(&name),
        };
        debug!(%name, ?tls, "Appending TLS block");
        ingress.push_tls(tls);

        if annotations::inject(ingress.annotations_mut()) {
            debug!(
                %name,
                annotation = annotations::ISSUER_ANNOTATIONS[0],
                "Added issuer annotation"
            );
        }

        Mutation::Mutated(ingress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cn::{CommonNames, DEFAULT_DOMAIN};

    #[derive(Clone, Debug, Default, PartialEq)]
    struct TestIngress {
        name: Option<String>,
        generate_name: Option<String>,
        annotations: BTreeMap<String, String>,
        rules: Vec<String>,
        tls: Option<Vec<TlsBlock>>,
    }

    impl IngressResource for TestIngress {
        fn name(&self) -> String {
            self.name
                .clone()
                .or_else(|| self.generate_name.clone())
                .unwrap_or_default()
        }

        fn annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
            &mut self.annotations
        }

        fn rule_hosts(&self) -> HostSet {
            self.rules.iter().cloned().collect()
        }

        fn tls_hosts(&self) -> HostSet {
            self.tls
                .iter()
                .flatten()
                .flat_map(|tls| tls.hosts.iter().cloned())
                .collect()
        }

        fn has_explicit_tls(&self) -> bool {
            self.tls.is_some()
        }

        fn push_tls(&mut self, tls: TlsBlock) {
            self.tls.get_or_insert_with(Vec::new).push(tls);
        }
    }

    struct Fixed;

    impl Suffix for Fixed {
        fn suffix(&self, len: usize) -> String {
            "z".repeat(len)
        }
    }

    fn ingress(name: &str, hosts: &[&str]) -> TestIngress {
        TestIngress {
            name: Some(name.to_string()),
            rules: hosts.iter().map(|h| h.to_string()).collect(),
            ..Default::default()
        }
    }

    fn mutator() -> Mutator {
        Mutator::new(Synthesizer::new(CommonNames::default(), DEFAULT_DOMAIN).unwrap())
    }

    fn mutated<T>(mutation: Mutation<T>) -> T {
        match mutation {
            Mutation::Mutated(ingress) => ingress,
            Mutation::Unchanged(skip) => panic!("ingress unchanged: {skip}"),
        }
    }

    fn long_host() -> String {
        format!("{}.example.com", "h".repeat(58))
    }

    #[test]
    fn adds_tls_block_and_annotation() {
        let ing = mutated(mutator().mutate(ingress("foo", &["a.example.com"])));
        assert_eq!(
            ing.tls,
            Some(vec![TlsBlock {
                hosts: vec!["a.example.com".to_string()],
                secret_name: "auto-foo-tls".to_string(),
            }])
        );
        assert_eq!(ing.annotations["kubernetes.io/tls-acme"], "true");
        assert_eq!(ing.annotations.len(), 1);
    }

    #[test]
    fn orders_and_dedups_hosts() {
        let ing = mutated(mutator().mutate(ingress(
            "foo",
            &["www.example.com", "", "b.example.com", "www.example.com", "a.example.com"],
        )));
        let tls = ing.tls.unwrap();
        assert_eq!(tls.len(), 1);
        assert_eq!(
            tls[0].hosts,
            vec!["a.example.com", "b.example.com", "www.example.com"]
        );
    }

    #[test]
    fn uses_generate_name() {
        let ing = TestIngress {
            generate_name: Some("web-".to_string()),
            rules: vec!["a.example.com".to_string()],
            ..Default::default()
        };
        let ing = mutated(mutator().mutate(ing));
        assert_eq!(ing.tls.unwrap()[0].secret_name, "auto-web--tls");
    }

    #[test]
    fn skips_solver_ingress() {
        let ing = ingress("cm-acme-http-solver-xyz", &["a.example.com"]);
        assert_eq!(
            mutator().mutate(ing),
            Mutation::Unchanged(Skip::SolverIngress)
        );

        let ing = TestIngress {
            generate_name: Some("cm-acme-http-solver-".to_string()),
            rules: vec!["a.example.com".to_string()],
            ..Default::default()
        };
        assert_eq!(
            mutator().mutate(ing),
            Mutation::Unchanged(Skip::SolverIngress)
        );
    }

    #[test]
    fn skips_explicit_tls() {
        let mut ing = ingress("foo", &["a.example.com", "b.example.com"]);
        ing.tls = Some(vec![TlsBlock {
            hosts: vec!["a.example.com".to_string()],
            secret_name: "mine".to_string(),
        }]);
        assert_eq!(mutator().mutate(ing), Mutation::Unchanged(Skip::ExplicitTls));

        let mut ing = ingress("foo", &["a.example.com"]);
        ing.tls = Some(vec![]);
        assert_eq!(mutator().mutate(ing), Mutation::Unchanged(Skip::ExplicitTls));
    }

    #[test]
    fn skips_ingress_without_hosts() {
        assert_eq!(
            mutator().mutate(ingress("foo", &[])),
            Mutation::Unchanged(Skip::NoHosts)
        );
        assert_eq!(
            mutator().mutate(ingress("foo", &["", ""])),
            Mutation::Unchanged(Skip::NoHosts)
        );
    }

    #[test]
    fn idempotent() {
        let m = mutator();
        for hosts in [vec!["a.example.com".to_string()], vec![long_host()]] {
            let ing = TestIngress {
                name: Some("foo".to_string()),
                rules: hosts,
                ..Default::default()
            };
            let once = mutated(m.mutate(ing));
            assert_eq!(m.mutate(once), Mutation::Unchanged(Skip::ExplicitTls));
        }
    }

    #[test]
    fn synthesizes_common_name_for_long_hosts() {
        let m = Mutator::new(
            Synthesizer::with_suffix(CommonNames::default(), "example.org", Fixed).unwrap(),
        );
        let ing = mutated(m.mutate(ingress("foo", &[long_host().as_str()])));
        let tls = ing.tls.unwrap();
        assert_eq!(
            tls[0].hosts,
            vec!["hhhhhh.zzzzzz.example.org".to_string(), long_host()]
        );
    }

    #[test]
    fn random_common_name_fits() {
        let ing = mutated(mutator().mutate(ingress("foo", &[long_host().as_str()])));
        let tls = ing.tls.unwrap();
        assert_eq!(tls[0].hosts.len(), 2);
        assert!(tls[0].hosts[0].len() <= CN_LIMIT);
        assert!(tls[0].hosts[0].ends_with(".tls-host-controller.local"));
        assert_eq!(tls[0].hosts[1], long_host());
    }

    #[test]
    fn uses_configured_common_name() {
        let cns = "short.example.com".parse().unwrap();
        let m = Mutator::new(Synthesizer::new(cns, DEFAULT_DOMAIN).unwrap());
        for _ in 0..3 {
            let ing = mutated(m.mutate(ingress("foo", &[long_host().as_str()])));
            assert_eq!(
                ing.tls.unwrap()[0].hosts,
                vec!["short.example.com".to_string(), long_host()]
            );
        }
    }

    #[test]
    fn no_common_name_when_a_host_fits() {
        let cns = "short.example.com".parse().unwrap();
        let m = Mutator::new(Synthesizer::new(cns, DEFAULT_DOMAIN).unwrap());
        let ing = mutated(m.mutate(ingress("foo", &[long_host().as_str(), "a.example.com"])));
        assert_eq!(
            ing.tls.unwrap()[0].hosts,
            vec!["a.example.com".to_string(), long_host()]
        );
    }

    #[test]
    fn common_name_limit_is_inclusive() {
        let m = Mutator::new(
            Synthesizer::with_suffix(CommonNames::default(), "example.org", Fixed).unwrap(),
        );

        let fits = format!("{}.example.com", "h".repeat(51));
        assert_eq!(fits.len(), CN_LIMIT);
        let ing = mutated(m.mutate(ingress("foo", &[fits.as_str()])));
        assert_eq!(ing.tls.unwrap()[0].hosts, vec![fits]);

        let too_long = format!("{}.example.com", "h".repeat(52));
        assert_eq!(too_long.len(), CN_LIMIT + 1);
        let ing = mutated(m.mutate(ingress("foo", &[too_long.as_str()])));
        assert_eq!(
            ing.tls.unwrap()[0].hosts,
            vec!["hhhhhh.zzzzzz.example.org".to_string(), too_long]
        );
    }

    #[test]
    fn skips_when_common_name_cannot_be_synthesized() {
        let host = format!("--.--.{}.example.com", "h".repeat(60));
        let ing = ingress("foo", &[host.as_str()]);
        assert_eq!(
            mutator().mutate(ing),
            Mutation::Unchanged(Skip::CommonName)
        );
    }

    #[test]
    fn keeps_operator_issuer_annotation() {
        let mut ing = ingress("foo", &["a.example.com"]);
        ing.annotations.insert(
            "cert-manager.io/cluster-issuer".to_string(),
            "letsencrypt".to_string(),
        );
        let before = ing.annotations.clone();
        let ing = mutated(mutator().mutate(ing));
        assert_eq!(ing.annotations, before);
        assert!(ing.tls.is_some());
    }
}
