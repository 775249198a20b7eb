use std::convert::Infallible;
use std::fmt::Debug;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::pin;
use tracing::{debug, error, info, instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::command::server::auth::{canonical_path, AccessMethod, Principal, RequestContext};
use crate::command::server::error::Error;
use crate::command::server::request_ext::HeaderExt;
use crate::command::server::router::{self, Route};
use crate::command::server::ServerContext;
use crate::metrics_provider::{IN_FLIGHT_REQUESTS, METRICS_PROVIDER};

pub type ResponseBody = Full<Bytes>;

static X_ORIGINAL_METHOD: &str = "x-original-method";
static X_FORWARDED_METHOD: &str = "x-forwarded-method";
static X_ORIGINAL_URI: &str = "x-original-uri";
static X_FORWARDED_URI: &str = "x-forwarded-uri";
pub static X_AUTH_IDENTIFIER: &str = "x-auth-identifier";
pub static X_AUTH_USER: &str = "x-auth-user";

pub async fn serve_request<S>(
    stream: TokioIo<S>,
    context: Arc<ServerContext>,
    timeouts: Arc<[Duration; 2]>,
    remote_address: SocketAddr,
) where
    S: Unpin + AsyncWrite + AsyncRead + Send + Debug + 'static,
{
    let conn = http1::Builder::new().serve_connection(
        stream,
        service_fn(move |mut request| {
            request.extensions_mut().insert(remote_address);
            handle_request(Arc::clone(&context), request)
        }),
    );
    pin!(conn);

    IN_FLIGHT_REQUESTS.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    METRICS_PROVIDER.metric_http_request_in_flight.set(
        i64::try_from(IN_FLIGHT_REQUESTS.load(std::sync::atomic::Ordering::Relaxed))
            .unwrap_or(i64::MAX),
    );

    for (iter, sleep_duration) in timeouts.iter().enumerate() {
        debug!("iter = {iter} sleep_duration = {sleep_duration:?}");
        tokio::select! {
            res = conn.as_mut() => {
                match res {
                    Ok(()) => debug!("after polling conn, no error"),
                    Err(error) =>  debug!("error serving connection: {error}"),
                }
                break;
            }
            () = tokio::time::sleep(*sleep_duration) => {
                debug!("iter = {iter} got timeout_interval, calling conn.graceful_shutdown");
                conn.as_mut().graceful_shutdown();
            }
        }
    }

    IN_FLIGHT_REQUESTS.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    METRICS_PROVIDER.metric_http_request_in_flight.set(
        i64::try_from(IN_FLIGHT_REQUESTS.load(std::sync::atomic::Ordering::Relaxed))
            .unwrap_or(i64::MAX),
    );
}

#[instrument(skip(context, request))]
async fn handle_request(
    context: Arc<ServerContext>,
    request: Request<Incoming>,
) -> Result<Response<ResponseBody>, Infallible> {
    let start_time = Instant::now();
    let method = request.method().to_owned();
    let path = request.uri().path().to_owned();
    let route = router::parse(request.method(), request.uri().path());
    let route_action = route.action_name();

    let trace_id = {
        let context = Span::current().context();
        let span = context.span();
        let span_context = span.span_context();
        if span_context.is_valid() {
            Some(span_context.trace_id().to_string())
        } else {
            None
        }
    };

    let response = match dispatch_route(&context, route, request).await {
        Ok(response) => response,
        Err(error) => error_to_response(&error, trace_id.as_ref()),
    };

    #[allow(clippy::cast_precision_loss)]
    let elapsed = start_time.elapsed().as_millis() as f64;
    let status = response.status();

    METRICS_PROVIDER
        .metric_http_request_total
        .with_label_values(&[method.as_str(), route_action, status.as_str()])
        .inc();
    METRICS_PROVIDER
        .metric_http_request_duration
        .with_label_values(&[method.as_str(), route_action])
        .observe(elapsed);

    let log = if let Some(trace_id) = trace_id {
        format!("{trace_id} {elapsed:?} - {status} {method} {path}")
    } else {
        format!("{elapsed:?} - {status} {method} {path}")
    };

    if status.is_server_error() {
        error!("{log}");
    } else {
        info!("{log}");
    }

    Ok(response)
}

async fn dispatch_route(
    context: &ServerContext,
    route: Route,
    request: Request<Incoming>,
) -> Result<Response<ResponseBody>, Error> {
    match route {
        Route::Healthz => handle_healthz(),
        Route::Metrics => handle_metrics(),
        Route::Gate => {
            let (parts, incoming) = request.into_parts();
            let body = read_form_body(context, &parts, incoming).await?;
            handle_gate(context, &parts, body).await
        }
    }
}

/// Reads a form-encoded body, bounded by the configured size. Other bodies are ignored.
async fn read_form_body(
    context: &ServerContext,
    parts: &Parts,
    incoming: Incoming,
) -> Result<Bytes, Error> {
    if !parts.headers.is_form_encoded() {
        return Ok(Bytes::new());
    }

    match Limited::new(incoming, context.max_body_size).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(error) => {
            debug!("Failed to read form body: {error}");
            Err(Error::BadRequest("Unable to read request body".to_string()))
        }
    }
}

/// The request the gate decides on: the received one, or the one described by the
/// forwarding headers of a reverse proxy.
#[derive(Debug, PartialEq)]
struct Target {
    method: Method,
    uri: Uri,
    remote_address: Option<IpAddr>,
}

fn resolve_target(parts: &Parts, forwarded_headers: bool) -> Result<Target, Error> {
    let remote_address = parts.extensions.get::<SocketAddr>().map(SocketAddr::ip);

    if !forwarded_headers {
        return Ok(Target {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            remote_address,
        });
    }

    let headers = &parts.headers;

    let method = match headers
        .get_header(X_ORIGINAL_METHOD)
        .or_else(|| headers.get_header(X_FORWARDED_METHOD))
    {
        Some(method) => Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::BadRequest(format!("Invalid forwarded method '{method}'")))?,
        None => parts.method.clone(),
    };

    let uri = match headers
        .get_header(X_ORIGINAL_URI)
        .or_else(|| headers.get_header(X_FORWARDED_URI))
    {
        Some(uri) => uri
            .trim()
            .parse::<Uri>()
            .map_err(|_| Error::BadRequest(format!("Invalid forwarded URI '{uri}'")))?,
        None => parts.uri.clone(),
    };

    Ok(Target {
        method,
        uri,
        remote_address: headers.forwarded_for().or(remote_address),
    })
}

#[instrument(skip(context, parts, body))]
async fn handle_gate(
    context: &ServerContext,
    parts: &Parts,
    body: Bytes,
) -> Result<Response<ResponseBody>, Error> {
    let target = resolve_target(parts, context.forwarded_headers)?;

    let Some(access) = AccessMethod::from_http(&target.method) else {
        return Err(Error::BadRequest(format!(
            "Unsupported method '{}'",
            target.method
        )));
    };

    let Some(path) = canonical_path(target.uri.path()) else {
        return Err(Error::BadRequest(format!(
            "Ambiguous request path '{}'",
            target.uri.path()
        )));
    };
    let Some(resource) = context.gate.resolve(&path) else {
        return Err(Error::NotFound(format!("No resource serves '{path}'")));
    };

    let principal = context.sessions.resolve(&parts.headers).await;

    let request = RequestContext::new(
        target.method.clone(),
        parts.headers.clone(),
        target.remote_address,
    )
    .with_query(target.uri.query())
    .with_form(&body)
    .with_session(principal);

    let implicated = resource.implicated_models(&path);
    let identifier = context
        .gate
        .authorize(resource, &request, &implicated, access)?;

    build_gate_response(&identifier, &resource.name, request.principal())
}

fn build_gate_response(
    identifier: &str,
    resource: &str,
    principal: Option<Principal>,
) -> Result<Response<ResponseBody>, Error> {
    let body = json!({
        "identifier": identifier,
        "resource": resource,
    });

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .header(X_AUTH_IDENTIFIER, identifier);

    if let Some(principal) = principal {
        response = response.header(X_AUTH_USER, principal.username);
    }

    match response.body(Full::new(Bytes::from(body.to_string()))) {
        Ok(resp) => Ok(resp),
        Err(e) => {
            let msg = format!("Failed to build gate response: {e}");
            Err(Error::Internal(msg))
        }
    }
}

fn handle_healthz() -> Result<Response<ResponseBody>, Error> {
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(r#"{"status":"ok"}"#)));

    match response {
        Ok(resp) => Ok(resp),
        Err(e) => {
            let msg = format!("Failed to build healthz response: {e}");
            Err(Error::Internal(msg))
        }
    }
}

fn handle_metrics() -> Result<Response<ResponseBody>, Error> {
    let (content_type, metrics) = METRICS_PROVIDER.gather()?;
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(Bytes::from(metrics)));

    match response {
        Ok(resp) => Ok(resp),
        Err(e) => {
            let msg = format!("Failed to build metrics response: {e}");
            Err(Error::Internal(msg))
        }
    }
}

pub fn error_to_response(error: &Error, request_id: Option<&String>) -> Response<ResponseBody> {
    let status = error.status_code();
    let body = error.as_json(request_id);

    let body = body.to_string();
    let body = Bytes::from(body);

    let mut response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json");

    if let Error::Unauthorized(_) = error {
        response = response.header(
            WWW_AUTHENTICATE,
            r#"Basic realm="Gatehouse", charset="UTF-8""#,
        );
    }

    response
        .body(Full::new(body.clone()))
        .unwrap_or_else(|_| {
            let mut fallback = Response::new(Full::new(body));
            *fallback.status_mut() = status;
            fallback
        })
}
