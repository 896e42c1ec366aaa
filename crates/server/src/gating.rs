//! HTTP middleware mapping gate verdicts to responses.
//!
//! The layer runs in front of every protected route: it hands the
//! request path, headers, and connection address to the [`AuthGate`]
//! and translates the verdict into either a pass-through (with the
//! client identity injected into request extensions) or a terminal
//! 401, 403, or 429 response.

use std::{
    fmt::Display,
    future::Future,
    net::{IpAddr, SocketAddr},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use axum::{body::Body, extract::ConnectInfo};
use gate::{AuthGate, Verdict};
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use rate_limit::QuotaStatus;
use serde::Serialize;
use tower::Layer;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            retry_after: None,
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"error":"internal_error"}"#.to_string())
    }
}

/// Tower layer applying the authorization gate to every request.
#[derive(Clone)]
pub struct GateLayer(Arc<AuthGate>);

impl GateLayer {
    /// Wrap the given gate as a middleware layer.
    pub fn new(gate: Arc<AuthGate>) -> Self {
        Self(gate)
    }
}

impl<Service> Layer<Service> for GateLayer
where
    Service: Send + Clone,
{
    type Service = GateService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        GateService {
            next,
            gate: self.0.clone(),
        }
    }
}

/// Middleware service produced by [`GateLayer`].
#[derive(Clone)]
pub struct GateService<Service> {
    next: Service,
    gate: Arc<AuthGate>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for GateService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = http::Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let gate = self.gate.clone();

        let path = req.uri().path().to_string();
        let client_ip = extract_client_ip(&req);

        Box::pin(async move {
            match gate.authorize(&path, req.headers(), client_ip).await {
                Verdict::Allow { identity, quota } => {
                    req.extensions_mut().insert(identity);

                    let mut response = next.call(req).await?;

                    if let Some(quota) = quota {
                        set_quota_headers(response.headers_mut(), quota);
                    }

                    Ok(response)
                }
                Verdict::Unauthenticated => Ok(unauthenticated()),
                Verdict::Forbidden => Ok(forbidden()),
                Verdict::RateLimited { retry_after, quota } => Ok(rate_limited(retry_after, quota)),
            }
        })
    }
}

fn unauthenticated() -> Response<Body> {
    let body = ErrorResponse::new(
        "Authentication required",
        "Provide an API key via the Authorization header (Bearer token) or the X-API-Key header",
    );

    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header("WWW-Authenticate", HeaderValue::from_static(r#"Bearer realm="NetGate""#))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_json()))
        .unwrap_or_default()
}

fn forbidden() -> Response<Body> {
    let body = ErrorResponse::new("Invalid API key", "The provided API key is not valid");

    Response::builder()
        .status(StatusCode::FORBIDDEN)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_json()))
        .unwrap_or_default()
}

fn rate_limited(retry_after: Option<Duration>, quota: Option<QuotaStatus>) -> Response<Body> {
    let retry_secs = retry_after.map(ceil_seconds);

    let mut body = match retry_secs {
        Some(secs) => ErrorResponse::new(
            "Rate limit exceeded",
            format!("Too many requests. Try again in {secs} seconds"),
        ),
        None => ErrorResponse::new("Rate limit exceeded", "Too many requests"),
    };
    body.retry_after = retry_secs;

    let mut builder = Response::builder()
        .status(StatusCode::TOO_MANY_REQUESTS)
        .header("Content-Type", "application/json");

    if let Some(secs) = retry_secs {
        builder = builder.header("Retry-After", secs);
    }

    let mut response = builder.body(Body::from(body.to_json())).unwrap_or_default();

    if let Some(quota) = quota {
        set_quota_headers(response.headers_mut(), quota);
    }

    response
}

/// Advertise the client's quota standing. The reset time is a Unix
/// timestamp, rounded up to the next whole second.
fn set_quota_headers(headers: &mut HeaderMap, quota: QuotaStatus) {
    let reset = jiff::Timestamp::now().as_second() + ceil_seconds(quota.reset_after) as i64;

    headers.insert("x-ratelimit-limit", HeaderValue::from(quota.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(quota.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset));
}

/// Round up so a client that waits the advertised time lands in a fresh
/// window, with a floor of one second.
fn ceil_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

/// Extract the client address: the direct connection first, then the
/// first hop of `X-Forwarded-For`, then `X-Real-IP`.
fn extract_client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(connect_info) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(connect_info.0.ip());
    }

    if let Some(forwarded_for) = req.headers().get("x-forwarded-for") {
        let value = forwarded_for.to_str().ok()?;
        let ip_str = value.split(',').next()?;

        return ip_str.trim().parse::<IpAddr>().ok();
    }

    let ip_str = req.headers().get("x-real-ip")?.to_str().ok()?;

    ip_str.parse::<IpAddr>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_seconds_rounds_up_and_floors_at_one() {
        assert_eq!(ceil_seconds(Duration::from_secs(60)), 60);
        assert_eq!(ceil_seconds(Duration::from_millis(59_900)), 60);
        assert_eq!(ceil_seconds(Duration::from_millis(10)), 1);
        assert_eq!(ceil_seconds(Duration::ZERO), 1);
    }

    #[test]
    fn forwarded_for_uses_the_first_hop() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();

        assert_eq!(extract_client_ip(&req), "203.0.113.7".parse::<IpAddr>().ok());
    }

    #[test]
    fn connect_info_wins_over_headers() {
        let mut req = Request::builder().header("x-real-ip", "203.0.113.7").body(()).unwrap();

        let addr: SocketAddr = "192.0.2.1:9000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));

        assert_eq!(extract_client_ip(&req), "192.0.2.1".parse::<IpAddr>().ok());
    }

    #[test]
    fn unparseable_forwarded_header_yields_no_address() {
        let req = Request::builder()
            .header("x-forwarded-for", "not-an-address")
            .body(())
            .unwrap();

        assert_eq!(extract_client_ip(&req), None);
    }
}
