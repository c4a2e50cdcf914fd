use crate::{extensions_v1beta1, networking_v1, networking_v1beta1};
use kube::{
    api::ObjectMeta,
    core::{DynamicObject, GroupVersionKind},
    Resource,
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tls_host_controller_core::{HostSet, IngressResource, TlsBlock};

/// An Ingress of any of the schema versions the controller mutates.
///
/// The variant is chosen by the kind under review and is preserved through
/// mutation, so the patched object always matches the version the API server
/// sent.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyIngress {
    V1(networking_v1::Ingress),
    V1beta1(networking_v1beta1::Ingress),
    ExtensionsV1beta1(extensions_v1beta1::Ingress),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported resource type: {0}")]
    Unsupported(String),

    #[error("failed to decode {kind}: {source}")]
    Decode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

// === impl AnyIngress ===

impl AnyIngress {
    /// Decodes `obj`, which the API server describes as a `gvk`.
    pub fn from_object(gvk: &GroupVersionKind, obj: DynamicObject) -> Result<Self, Error> {
        if is_kind::<networking_v1::Ingress>(gvk) {
            return decode(gvk, obj).map(Self::V1);
        }

        if is_kind::<networking_v1beta1::Ingress>(gvk) {
            return decode(gvk, obj).map(Self::V1beta1);
        }

        if is_kind::<extensions_v1beta1::Ingress>(gvk) {
            return decode(gvk, obj).map(Self::ExtensionsV1beta1);
        }

        Err(Error::Unsupported(kind_name(gvk)))
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Self::V1(ing) => &ing.metadata,
            Self::V1beta1(ing) => &ing.metadata,
            Self::ExtensionsV1beta1(ing) => &ing.metadata,
        }
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::V1(ing) => &mut ing.metadata,
            Self::V1beta1(ing) => &mut ing.metadata,
            Self::ExtensionsV1beta1(ing) => &mut ing.metadata,
        }
    }
}

impl IngressResource for AnyIngress {
    fn name(&self) -> String {
        ingress_name(self.meta())
    }

    fn annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.meta_mut()
            .annotations
            .get_or_insert_with(BTreeMap::new)
    }

    fn rule_hosts(&self) -> HostSet {
        match self {
            Self::V1(ing) => v1_rule_hosts(ing),
            Self::V1beta1(ing) => ing.rule_hosts(),
            Self::ExtensionsV1beta1(ing) => ing.rule_hosts(),
        }
    }

    fn tls_hosts(&self) -> HostSet {
        match self {
            Self::V1(ing) => v1_tls_hosts(ing),
            Self::V1beta1(ing) => ing.tls_hosts(),
            Self::ExtensionsV1beta1(ing) => ing.tls_hosts(),
        }
    }

    fn has_explicit_tls(&self) -> bool {
        match self {
            Self::V1(ing) => v1_has_explicit_tls(ing),
            Self::V1beta1(ing) => ing.has_explicit_tls(),
            Self::ExtensionsV1beta1(ing) => ing.has_explicit_tls(),
        }
    }

    fn push_tls(&mut self, tls: TlsBlock) {
        match self {
            Self::V1(ing) => v1_push_tls(ing, tls),
            Self::V1beta1(ing) => ing.push_tls(tls),
            Self::ExtensionsV1beta1(ing) => ing.push_tls(tls),
        }
    }
}

// === networking.k8s.io/v1beta1 ===

impl IngressResource for networking_v1beta1::Ingress {
    fn name(&self) -> String {
        ingress_name(&self.metadata)
    }

    fn annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.metadata.annotations.get_or_insert_with(BTreeMap::new)
    }

    fn rule_hosts(&self) -> HostSet {
        v1beta1_rule_hosts(self.spec.rules.as_deref())
    }

    fn tls_hosts(&self) -> HostSet {
        v1beta1_tls_hosts(self.spec.tls.as_deref())
    }

    fn has_explicit_tls(&self) -> bool {
        self.spec.tls.is_some()
    }

    fn push_tls(&mut self, tls: TlsBlock) {
        v1beta1_push_tls(&mut self.spec.tls, tls)
    }
}

// === extensions/v1beta1 ===

impl IngressResource for extensions_v1beta1::Ingress {
    fn name(&self) -> String {
        ingress_name(&self.metadata)
    }

    fn annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.metadata.annotations.get_or_insert_with(BTreeMap::new)
    }

    fn rule_hosts(&self) -> HostSet {
        v1beta1_rule_hosts(self.spec.rules.as_deref())
    }

    fn tls_hosts(&self) -> HostSet {
        v1beta1_tls_hosts(self.spec.tls.as_deref())
    }

    fn has_explicit_tls(&self) -> bool {
        self.spec.tls.is_some()
    }

    fn push_tls(&mut self, tls: TlsBlock) {
        v1beta1_push_tls(&mut self.spec.tls, tls)
    }
}

fn v1_rule_hosts(ing: &networking_v1::Ingress) -> HostSet {
    ing.spec
        .iter()
        .flat_map(|spec| spec.rules.iter().flatten())
        .filter_map(|rule| rule.host.clone())
        .collect()
}

fn v1_tls_hosts(ing: &networking_v1::Ingress) -> HostSet {
    ing.spec
        .iter()
        .flat_map(|spec| spec.tls.iter().flatten())
        .flat_map(|tls| tls.hosts.iter().flatten().cloned())
        .collect()
}

fn v1_has_explicit_tls(ing: &networking_v1::Ingress) -> bool {
    ing.spec.as_ref().is_some_and(|spec| spec.tls.is_some())
}

fn v1_push_tls(ing: &mut networking_v1::Ingress, TlsBlock { hosts, secret_name }: TlsBlock) {
    ing.spec
        .get_or_insert_with(Default::default)
        .tls
        .get_or_insert_with(Vec::new)
        .push(networking_v1::IngressTLS {
            hosts: Some(hosts),
            secret_name: Some(secret_name),
        });
}

fn v1beta1_rule_hosts(rules: Option<&[networking_v1beta1::IngressRule]>) -> HostSet {
    rules
        .into_iter()
        .flatten()
        .filter_map(|rule| rule.host.clone())
        .collect()
}

fn v1beta1_tls_hosts(tls: Option<&[networking_v1beta1::IngressTLS]>) -> HostSet {
    tls.into_iter()
        .flatten()
        .flat_map(|tls| tls.hosts.iter().flatten().cloned())
        .collect()
}

fn v1beta1_push_tls(
    blocks: &mut Option<Vec<networking_v1beta1::IngressTLS>>,
    TlsBlock { hosts, secret_name }: TlsBlock,
) {
    blocks
        .get_or_insert_with(Vec::new)
        .push(networking_v1beta1::IngressTLS {
            hosts: Some(hosts),
            secret_name: Some(secret_name),
        });
}

/// The API server only assigns a name from `generateName` after admission.
fn ingress_name(meta: &ObjectMeta) -> String {
    meta.name
        .clone()
        .filter(|name| !name.is_empty())
        .or_else(|| meta.generate_name.clone())
        .unwrap_or_default()
}

fn is_kind<T>(gvk: &GroupVersionKind) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    gvk.group.eq_ignore_ascii_case(&T::group(&dt))
        && gvk.version.eq_ignore_ascii_case(&T::version(&dt))
        && gvk.kind.eq_ignore_ascii_case(&T::kind(&dt))
}

pub fn kind_name(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        return format!("{}/{}", gvk.version, gvk.kind);
    }
    format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind)
}

fn decode<T: DeserializeOwned>(gvk: &GroupVersionKind, obj: DynamicObject) -> Result<T, Error> {
    serde_json::to_value(obj)
        .and_then(serde_json::from_value)
        .map_err(|source| Error::Decode {
            kind: kind_name(gvk),
            source,
        })
}
