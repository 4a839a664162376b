//! Mock tower service that routes HTTP requests to the fake backend
//!
//! Requests made through a `kube::Client` built on this service are turned
//! into [`Action`]s and answered by the same reactor chain the typed fake
//! clients use, so recorded actions and injected errors apply to both.

use crate::action::{Action, PatchData, PatchType};
use crate::client_utils::set_object_name;
use crate::error::Error;
use crate::fake::Fake;
use crate::registry::ResourceRegistry;
use crate::selector::ListRestrictions;
use crate::tracker::{Event, GVR};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use futures::StreamExt;
use http::{header, Method, Request, Response, StatusCode};
use http_body::Frame;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use kube::client::Body as KubeBody;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{debug, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body of every response produced by [`MockService`]
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Parsed Kubernetes API path information
#[derive(Debug, PartialEq)]
struct ParsedPath {
    group: Option<String>,
    version: String,
    namespace: Option<String>,
    resource: String,
    name: Option<String>,
    subresource: Option<String>,
}

impl ParsedPath {
    fn gvr(&self) -> GVR {
        GVR::new(
            self.group.clone().unwrap_or_default(),
            &self.version,
            &self.resource,
        )
    }
}

/// Query parameters understood by the mock API server
#[derive(Debug, Default)]
struct QueryParams {
    label_selector: Option<String>,
    field_selector: Option<String>,
    watch: bool,
}

impl QueryParams {
    fn parse(query: Option<&str>) -> Self {
        let mut params = Self::default();

        for pair in query.unwrap_or_default().split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let decoded = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());

            match key {
                "labelSelector" => params.label_selector = Some(decoded),
                "fieldSelector" => params.field_selector = Some(decoded),
                "watch" => params.watch = decoded == "true" || decoded == "1",
                _ => {}
            }
        }

        params
    }

    fn restrictions(&self) -> crate::Result<ListRestrictions> {
        ListRestrictions::new(
            self.label_selector.as_deref(),
            self.field_selector.as_deref(),
        )
    }
}

/// Mock HTTP service that routes requests to a [`Fake`]
#[derive(Clone)]
pub struct MockService {
    fake: Arc<Fake>,
    registry: Arc<ResourceRegistry>,
}

impl MockService {
    pub fn new(fake: Arc<Fake>, registry: Arc<ResourceRegistry>) -> Self {
        Self { fake, registry }
    }

    /// Parse URL path to extract API info
    /// Examples:
    /// - /apis/messaging.knative.dev/v1beta1/namespaces/default/inmemorychannels
    /// - /apis/messaging.knative.dev/v1beta1/namespaces/default/inmemorychannels/imc
    /// - /apis/messaging.knative.dev/v1beta1/namespaces/default/inmemorychannels/imc/status
    /// - /apis/messaging.knative.dev/v1beta1/inmemorychannels (all namespaces)
    /// - /api/v1/namespaces/default/configmaps (core group)
    fn parse_path(path: &str) -> Option<ParsedPath> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let (group, version_idx) = match parts.first()? {
            &"api" => (None, 1),
            &"apis" if parts.len() > 2 => (Some(parts[1].to_string()), 2),
            _ => return None,
        };

        let version = parts.get(version_idx)?.to_string();
        let rest = &parts[version_idx + 1..];

        let (namespace, rest) = match rest {
            ["namespaces", namespace, rest @ ..] if !rest.is_empty() => {
                (Some(namespace.to_string()), rest)
            }
            _ => (None, rest),
        };

        let (resource, name, subresource) = match rest {
            [resource] => (resource, None, None),
            [resource, name] => (resource, Some(name.to_string()), None),
            [resource, name, subresource] => (
                resource,
                Some(name.to_string()),
                Some(subresource.to_string()),
            ),
            _ => return None,
        };

        Some(ParsedPath {
            group,
            version,
            namespace,
            resource: resource.to_string(),
            name,
            subresource,
        })
    }

    async fn handle_request(
        &self,
        req: Request<KubeBody>,
    ) -> Result<Response<ResponseBody>, BoxError> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = QueryParams::parse(req.uri().query());
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = req.into_body().collect().await?.to_bytes();

        debug!("{} {}", method, path);

        let Some(parsed) = Self::parse_path(&path) else {
            return Ok(Self::error_response(Error::InvalidRequest(format!(
                "unrecognized path {}",
                path
            ))));
        };

        if method == Method::GET && parsed.name.is_none() && query.watch {
            return Ok(match self.watch(&parsed, &query) {
                Ok(response) => response,
                Err(e) => Self::error_response(e),
            });
        }

        let result = self
            .to_action(&method, &parsed, &query, content_type.as_deref(), &body)
            .and_then(|action| {
                let verb = action.verb;
                self.fake
                    .invokes(action)?
                    .ok_or_else(|| Error::NoReaction {
                        verb: verb.to_string(),
                        resource: parsed.resource.clone(),
                    })
            });

        Ok(match result {
            Ok(value) => Self::success_response(&value),
            Err(e) => Self::error_response(e),
        })
    }

    fn to_action(
        &self,
        method: &Method,
        parsed: &ParsedPath,
        query: &QueryParams,
        content_type: Option<&str>,
        body: &Bytes,
    ) -> crate::Result<Action> {
        let gvr = parsed.gvr();
        let kind = self.registry.gvr_to_gvk(&gvr);
        let namespace = parsed.namespace.as_deref().unwrap_or("");
        let subresource = parsed.subresource.as_deref();

        let action = match (method, parsed.name.as_deref()) {
            (&Method::GET, Some(name)) => match subresource {
                Some(sub) => Action::get_subresource(&gvr, sub, namespace, name),
                None => Action::get(&gvr, namespace, name),
            },
            (&Method::GET, None) => Action::list(&gvr, &kind, namespace, query.restrictions()?),
            (&Method::POST, None) => Action::create(&gvr, namespace, serde_json::from_slice(body)?),
            (&Method::POST, Some(name)) => match subresource {
                Some(sub) => Action::create_subresource(
                    &gvr,
                    sub,
                    namespace,
                    serde_json::from_slice(body)?,
                ),
                None => {
                    return Err(Error::InvalidRequest(format!(
                        "POST is not allowed on a named resource {}",
                        name
                    )))
                }
            },
            (&Method::PUT, Some(name)) => {
                let object = object_named(serde_json::from_slice(body)?, name)?;
                match subresource {
                    Some(sub) => Action::update_subresource(&gvr, sub, namespace, object),
                    None => Action::update(&gvr, namespace, object),
                }
            }
            (&Method::PATCH, Some(name)) => {
                let patch_type = PatchType::from_content_type(content_type);
                let patch = match patch_type {
                    PatchType::ApplyPatch => serde_yaml::from_slice(body).map_err(|e| {
                        Error::InvalidRequest(format!("invalid apply patch: {}", e))
                    })?,
                    _ => serde_json::from_slice(body)?,
                };
                let data = PatchData {
                    name: name.to_string(),
                    patch_type,
                    patch,
                };
                let subresources: Vec<&str> = subresource.into_iter().collect();
                Action::patch_subresource(&gvr, namespace, data, &subresources)
            }
            (&Method::DELETE, Some(name)) => Action::delete(&gvr, namespace, name),
            (&Method::DELETE, None) => {
                Action::delete_collection(&gvr, namespace, query.restrictions()?)
            }
            _ => {
                return Err(Error::InvalidRequest(format!(
                    "method {} is not supported for this path",
                    method
                )))
            }
        };

        Ok(action.with_kind(&kind))
    }

    fn watch(
        &self,
        parsed: &ParsedPath,
        query: &QueryParams,
    ) -> crate::Result<Response<ResponseBody>> {
        let gvr = parsed.gvr();
        let namespace = parsed.namespace.as_deref().unwrap_or("");
        let action = Action::watch(&gvr, namespace, query.restrictions()?);
        let events = self.fake.invokes_watch(action)?;

        let frames = events.map(|event: Event| {
            let line = json!({
                "type": event.event_type.as_str(),
                "object": event.object,
            });
            Ok::<_, Infallible>(Frame::data(Bytes::from(format!("{}\n", line))))
        });

        let body = StreamBody::new(frames)
            .map_err(|never| match never {})
            .boxed_unsync();
        Ok(Self::with_json_header(Response::new(body)))
    }

    fn error_response(err: Error) -> Response<ResponseBody> {
        warn!("Request failed: {}", err);
        Self::json_response(err.status_code(), &err.to_status())
    }

    fn success_response(data: &Value) -> Response<ResponseBody> {
        Self::json_response(StatusCode::OK, data)
    }

    fn json_response(status: StatusCode, data: &Value) -> Response<ResponseBody> {
        let body = Full::new(Bytes::from(data.to_string()))
            .map_err(|never| match never {})
            .boxed_unsync();

        let mut response = Self::with_json_header(Response::new(body));
        *response.status_mut() = status;
        response
    }

    fn with_json_header(mut response: Response<ResponseBody>) -> Response<ResponseBody> {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        response
    }
}

/// The body of a PUT must name the object addressed by the path
fn object_named(mut object: Value, name: &str) -> crate::Result<Value> {
    match object.pointer("/metadata/name").and_then(Value::as_str) {
        Some(body_name) if body_name != name => Err(Error::InvalidRequest(format!(
            "the name of the object ({}) does not match the name on the URL ({})",
            body_name, name
        ))),
        Some(_) => Ok(object),
        None => {
            set_object_name(&mut object, name)?;
            Ok(object)
        }
    }
}

impl Service<Request<KubeBody>> for MockService {
    type Response = Response<ResponseBody>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<KubeBody>) -> Self::Future {
        let this = self.clone();
        async move { this.handle_request(req).await }.boxed()
    }
}
