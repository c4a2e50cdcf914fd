use std::collections::BTreeMap;

/// Annotations that ask cert-manager to issue a certificate for an ingress.
///
/// See <https://cert-manager.io/docs/usage/ingress/>. The first key is the one
/// added when an ingress carries none of them.
pub const ISSUER_ANNOTATIONS: [&str; 3] = [
    "kubernetes.io/tls-acme",
    "cert-manager.io/issuer",
    "cert-manager.io/cluster-issuer",
];

pub const ISSUER_ANNOTATION_VALUE: &str = "true";

/// Returns true if any issuer annotation is set.
pub fn requests_certificate(annotations: &BTreeMap<String, String>) -> bool {
    ISSUER_ANNOTATIONS
        .iter()
        .any(|key| annotations.contains_key(*key))
}

/// Ensures that `annotations` requests a certificate, returning true if the
/// canonical issuer annotation was added.
///
/// An issuer annotation set by an operator is never overwritten.
pub fn inject(annotations: &mut BTreeMap<String, String>) -> bool {
    if requests_certificate(annotations) {
        return false;
    }
    annotations.insert(
        ISSUER_ANNOTATIONS[0].to_string(),
        ISSUER_ANNOTATION_VALUE.to_string(),
    );
    true
}
