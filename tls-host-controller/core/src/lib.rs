#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod annotations;
pub mod cn;
pub mod hosts;
pub mod mutate;

pub use self::{
    cn::{CommonNames, RandomSuffix, Suffix, Synthesizer},
    hosts::HostSet,
    mutate::{IngressResource, Mutation, Mutator, Skip, TlsBlock},
};

/// Name prefix of the ingresses cert-manager creates to solve HTTP-01
/// challenges.
pub const SOLVER_INGRESS_PREFIX: &str = "cm-acme-http-solver";

/// Maximum length, in bytes, of a certificate Common Name accepted by
/// cert-manager and Let's Encrypt.
pub const CN_LIMIT: usize = 63;

/// Returns the name of the secret that holds the certificate provisioned for
/// the named ingress.
pub fn secret_name(ingress: &str) -> String {
    format!("auto-{ingress}-tls")
}
