#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod extensions_v1beta1;
pub mod ingress;
pub mod networking_v1beta1;

pub use self::ingress::AnyIngress;
pub use k8s_openapi::api::networking::v1 as networking_v1;
pub use kube::api::{ObjectMeta, ResourceExt};
pub use kube::core::{DynamicObject, GroupVersionKind};
