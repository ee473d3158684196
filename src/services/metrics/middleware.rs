use axum::{
    body::{Body, Bytes, HttpBody},
    http::{header, HeaderMap, Request, Version},
    response::Response,
};
use http_body::{Frame, SizeHint};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

use super::collectors::{HttpMetricsCollector, MetricsTimer, RequestLabels, RequestObservation};
use super::MetricsRegistry;
use crate::services::routes::RouteTable;

/// Layer recording request metrics for classified routes.
///
/// Requests whose path is not in the route table go straight to the inner
/// service without any measurement. The response size is recorded once the
/// response body has been streamed to the client.
#[derive(Clone)]
pub struct MetricsLayer {
    routes: Arc<RouteTable>,
    metrics: Arc<MetricsRegistry>,
}

impl MetricsLayer {
    pub fn new(routes: Arc<RouteTable>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { routes, metrics }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            routes: self.routes.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    routes: Arc<RouteTable>,
    metrics: Arc<MetricsRegistry>,
}

impl<S> Service<Request<Body>> for MetricsService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // keep the service that was polled ready
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let Some(route) = self.routes.classify(request.uri().path()).into_route() else {
            return Box::pin(inner.call(request));
        };

        let collector = HttpMetricsCollector::new(self.metrics.clone());

        Box::pin(async move {
            let timer = MetricsTimer::new();
            let labels = RequestLabels {
                method: request.method().to_string(),
                host: request_host(&request).to_string(),
                route,
            };
            let request_size = request_size(&request);

            let in_flight = collector.clone().track_in_flight(labels);

            // an error or a dropped future releases the slot through the guard
            let response = inner.call(request).await?;

            let observation = RequestObservation {
                status: response.status().as_u16(),
                duration_secs: timer.elapsed_secs(),
                request_size,
            };
            let labels = in_flight.finish(&observation);

            Ok::<_, S::Error>(response.map(|body| {
                Body::new(CountingBody::new(body, collector, labels))
            }))
        })
    }
}

/// Approximate wire size of a request.
///
/// Sums the URI, method, protocol, every header name and value, the host and
/// the declared content length. Framing bytes are not counted.
pub fn request_size<B>(request: &Request<B>) -> u64 {
    let headers = request.headers();

    let mut size = request.uri().to_string().len() as u64;
    size += request.method().as_str().len() as u64;
    size += protocol(request.version()).len() as u64;

    for name in headers.keys().filter(|name| *name != header::HOST) {
        size += name.as_str().len() as u64;
        size += headers
            .get_all(name)
            .iter()
            .map(|value| value.len() as u64)
            .sum::<u64>();
    }

    size += request_host(request).len() as u64;
    size += content_length(headers).unwrap_or(0);
    size
}

/// Response body that counts the bytes handed to the client.
///
/// The total is recorded once, when the stream ends or when the body is
/// dropped early.
struct CountingBody {
    inner: Body,
    sent: u64,
    recorder: Option<(HttpMetricsCollector, RequestLabels)>,
}

impl CountingBody {
    fn new(inner: Body, collector: HttpMetricsCollector, labels: RequestLabels) -> Self {
        Self {
            inner,
            sent: 0,
            recorder: Some((collector, labels)),
        }
    }

    fn record(&mut self) {
        if let Some((collector, labels)) = self.recorder.take() {
            collector.record_response_size(&labels, self.sent);
        }
    }
}

impl HttpBody for CountingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.sent += data.len() as u64;
                }
            }
            Poll::Ready(None) => this.record(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CountingBody {
    fn drop(&mut self) {
        self.record();
    }
}

fn request_host<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or("")
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn protocol(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "",
    }
}
