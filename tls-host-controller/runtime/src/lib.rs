#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use tls_host_controller_core as core;
pub use tls_host_controller_k8s_api as k8s;

mod admission;
mod args;
mod metrics;

pub use self::{admission::Admission, args::Args, metrics::AdmissionMetrics};
