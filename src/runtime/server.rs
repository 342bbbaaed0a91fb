//! Multi-worker HTTP server feeding requests into coordinators.

use crate::dispatch::Coordinator;
use crate::error::RouteError;
use crate::http::{Connection, Method, Request, Response, StatusCode};
use crate::runtime::{DispatchConfig, ServerConfig};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Server running one coordinator per worker thread.
///
/// Workers share only the listening socket. Each builds its own coordinator
/// from the application factory, so route tables, plan caches and
/// capabilities are never shared between them.
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Create a new server.
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Create a new server with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind, start the workers and block until they all stop.
    pub fn run<F>(self, factory: F) -> Result<(), BoxError>
    where
        F: Fn(&DispatchConfig) -> Result<Coordinator, RouteError> + Send + Sync + 'static,
    {
        let addr: SocketAddr = self.config.bind_addr().parse()?;
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;

        info!(
            "listening on {} with {} workers ({})",
            addr, self.config.workers, self.config.dispatch.environment
        );

        let factory = Arc::new(factory);
        let mut workers = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers {
            let listener = listener.try_clone()?;
            let factory = factory.clone();
            let config = self.config.clone();
            let handle = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || run_worker(id, listener, factory.as_ref(), config))?;
            workers.push(handle);
        }

        for (id, handle) in workers.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(())) => info!("worker {} stopped", id),
                Ok(Err(e)) => error!("worker {} failed: {}", id, e),
                Err(_) => error!("worker {} panicked", id),
            }
        }
        Ok(())
    }
}

fn run_worker<F>(
    id: usize,
    listener: std::net::TcpListener,
    factory: &F,
    config: ServerConfig,
) -> Result<(), BoxError>
where
    F: Fn(&DispatchConfig) -> Result<Coordinator, RouteError>,
{
    let coordinator = Arc::new(factory(&config.dispatch)?);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    info!("worker {} started", id);
    runtime.block_on(serve(listener, coordinator, config.max_body_size))
}

async fn serve(
    listener: std::net::TcpListener,
    coordinator: Arc<Coordinator>,
    max_body_size: usize,
) -> Result<(), BoxError> {
    let listener = TcpListener::from_std(listener)?;

    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("accept failed: {}", e);
                continue;
            }
        };
        let connection = Connection::new(Some(remote_addr), stream.local_addr().ok());
        let io = TokioIo::new(stream);
        let coordinator = coordinator.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let coordinator = coordinator.clone();
                let connection = connection.clone();
                async move { handle_request(req, &coordinator, &connection, max_body_size).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!("error serving connection from {}: {:?}", remote_addr, err);
            }
        });
    }
}

/// Handle an incoming HTTP request.
async fn handle_request(
    req: hyper::Request<Incoming>,
    coordinator: &Coordinator,
    connection: &Connection,
    max_body_size: usize,
) -> Result<hyper::Response<Full<Bytes>>, hyper::Error> {
    let Ok(method) = Method::try_from(req.method()) else {
        return Ok(build_response(Response::error(
            StatusCode::NOT_IMPLEMENTED,
            "Not Implemented",
        )));
    };

    let request = match convert_request(req, method, max_body_size).await {
        Ok(request) => request,
        Err(e) => {
            warn!("failed to read request: {}", e);
            return Ok(build_response(Response::error(
                StatusCode::BAD_REQUEST,
                e.to_string(),
            )));
        }
    };

    Ok(build_response(coordinator.dispatch(connection, request)))
}

/// Convert a hyper request into a [`Request`].
async fn convert_request(
    req: hyper::Request<Incoming>,
    method: Method,
    max_body_size: usize,
) -> Result<Request, BoxError> {
    let uri = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_string(), |pq| pq.as_str().to_string());

    let mut headers = HashMap::new();
    for (name, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            headers.insert(name.as_str().to_string(), v.to_string());
        }
    }

    // Limited stops reading once the body exceeds the limit.
    let body_bytes = Limited::new(req.into_body(), max_body_size)
        .collect()
        .await
        .map_err(|e| -> BoxError {
            if e.is::<LengthLimitError>() {
                "Request body too large".into()
            } else {
                e
            }
        })?
        .to_bytes();
    let body = if body_bytes.is_empty() {
        None
    } else {
        Some(body_bytes)
    };

    Ok(Request {
        method,
        uri,
        headers,
        body,
    })
}

/// Build a hyper response, dropping headers hyper cannot represent.
fn build_response(response: Response) -> hyper::Response<Full<Bytes>> {
    let status = hyper::StatusCode::from_u16(response.status.0).unwrap_or_else(|_| {
        warn!(
            "invalid status code {}, falling back to 500 Internal Server Error",
            response.status.0
        );
        hyper::StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut out = hyper::Response::new(Full::new(response.body.unwrap_or_default()));
    *out.status_mut() = status;
    for (name, value) in response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().append(name, value);
            }
            _ => warn!("dropping invalid response header {:?}", name),
        }
    }
    out
}
