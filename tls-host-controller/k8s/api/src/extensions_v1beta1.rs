//! `extensions/v1beta1` Ingress, the first Ingress API group.
//!
//! It shares its rule and TLS shapes with `networking.k8s.io/v1beta1`.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

pub use crate::networking_v1beta1::{
    HTTPIngressPath, HTTPIngressRuleValue, IngressBackend, IngressRule, IngressTLS,
};

#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "extensions",
    version = "v1beta1",
    kind = "Ingress",
    namespaced,
    schema = "disabled",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<IngressBackend>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress_class_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<IngressRule>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<Vec<IngressTLS>>,
}
