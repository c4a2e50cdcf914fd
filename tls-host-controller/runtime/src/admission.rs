use crate::{
    core::{IngressResource, Mutation, Mutator},
    k8s::{
        ingress::{self, kind_name},
        AnyIngress,
    },
    metrics::{AdmissionMetrics, Outcome},
};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::core::DynamicObject;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// A mutating admission webhook that adds TLS blocks to Ingresses.
///
/// The webhook never denies a request: when an ingress can't or shouldn't be
/// mutated it is admitted unchanged.
#[derive(Clone, Debug)]
pub struct Admission {
    mutator: Arc<Mutator>,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type Review = kube::core::admission::AdmissionReview<DynamicObject>;
type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;

type Body = http_body_util::Full<bytes::Bytes>;

// === impl Admission ===

impl tower::Service<Request<hyper::body::Incoming>> for Admission {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            use bytes::Buf;
            let bytes = req.into_body().collect().await?.to_bytes();
            let review: Review = match serde_json::from_reader(bytes.reader()) {
                Ok(review) => review,
                Err(error) => {
                    warn!(%error, "Failed to parse request body");
                    return json_response(AdmissionResponse::invalid(error).into_review());
                }
            };
            trace!(?review);

            let rsp = match review.try_into() {
                Ok(req) => {
                    debug!(?req);
                    admission.admit(req)
                }
                Err(error) => {
                    warn!(%error, "Invalid admission request");
                    AdmissionResponse::invalid(error)
                }
            };
            debug!(?rsp);
            json_response(rsp.into_review())
        })
    }
}

impl Admission {
    pub fn new(mutator: Mutator, metrics: AdmissionMetrics) -> Self {
        Self {
            mutator: Arc::new(mutator),
            metrics,
        }
    }

    fn admit(&self, req: AdmissionRequest) -> AdmissionResponse {
        let rsp = AdmissionResponse::from(&req);

        let Some(patch) = self.patch(req) else {
            return rsp;
        };
        debug!(?patch);

        match rsp.clone().with_patch(patch) {
            Ok(rsp) => rsp,
            Err(error) => {
                warn!(%error, "Failed to encode patch; admitting ingress unchanged");
                rsp
            }
        }
    }

    /// Returns the patch that adds TLS to the object under review, if any.
    fn patch(&self, req: AdmissionRequest) -> Option<json_patch::Patch> {
        let kind = kind_name(&req.kind);
        let ns = req.namespace.unwrap_or_default();

        let Some(obj) = req.object else {
            debug!(%kind, operation = ?req.operation, "No object to mutate");
            return None;
        };

        let ingress = match AnyIngress::from_object(&req.kind, obj) {
            Ok(ingress) => ingress,
            Err(error @ ingress::Error::Unsupported(_)) => {
                warn!(%error, %ns, "Admitting unchanged");
                self.metrics.observe(&kind, Outcome::Unsupported);
                return None;
            }
            Err(error) => {
                warn!(%error, %ns, "Admitting unchanged");
                self.metrics.observe(&kind, Outcome::Invalid);
                return None;
            }
        };

        let before = match serde_json::to_value(&ingress) {
            Ok(before) => before,
            Err(error) => {
                warn!(%error, %ns, %kind, "Failed to encode ingress");
                self.metrics.observe(&kind, Outcome::Invalid);
                return None;
            }
        };

        let ingress = match self.mutator.mutate(ingress) {
            Mutation::Mutated(ingress) => ingress,
            Mutation::Unchanged(skip) => {
                self.metrics.observe(&kind, Outcome::Skipped(skip));
                return None;
            }
        };

        let after = match serde_json::to_value(&ingress) {
            Ok(after) => after,
            Err(error) => {
                warn!(%error, %ns, %kind, "Failed to encode mutated ingress");
                self.metrics.observe(&kind, Outcome::Invalid);
                return None;
            }
        };

        info!(%ns, name = %ingress.name(), %kind, "Adding TLS block");
        self.metrics.observe(&kind, Outcome::Mutated);
        Some(json_patch::diff(&before, &after))
    }
}

fn json_response(rsp: Review) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}
