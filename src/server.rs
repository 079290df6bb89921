use std::{convert::Infallible, net::SocketAddr, path::Path, sync::Arc};

use hyper::{
    header::{HeaderMap, CONTENT_LENGTH},
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use tokio::{
    fs,
    sync::oneshot,
    task::{self, JoinError},
    time::timeout,
};
use tracing::{debug, error, info, warn};

use crate::{common::payload_file_name, config::ReceiverConfig, error::HarnessError};

/// Extract the task id from a request query string.
pub fn parse_task_id(query: Option<&str>) -> Result<u64, HarnessError> {
    let query = query.ok_or(HarnessError::MissingTaskId)?;
    let (_, value) = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "task_id")
        .ok_or(HarnessError::MissingTaskId)?;
    value
        .parse::<u64>()
        .map_err(|_| HarnessError::InvalidTaskId(value.into_owned()))
}

/// Read the declared body length.
pub fn content_length(headers: &HeaderMap) -> Result<u64, HarnessError> {
    let value = headers
        .get(CONTENT_LENGTH)
        .ok_or(HarnessError::MissingContentLength)?;
    let value = value
        .to_str()
        .map_err(|err| HarnessError::InvalidContentLength(err.to_string()))?;
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| HarnessError::InvalidContentLength(value.to_string()))
}

/// Persist the body of one upload, returning its task id.
async fn receive(config: &ReceiverConfig, req: Request<Body>) -> Result<u64, HarnessError> {
    if req.method() != Method::POST {
        return Err(HarnessError::MethodNotAllowed(req.method().to_string()));
    }
    let task_id = parse_task_id(req.uri().query())?;
    let len = content_length(req.headers())?;
    if len > config.max_body_size {
        return Err(HarnessError::PayloadTooLarge {
            len,
            limit: config.max_body_size,
        });
    }
    debug!("Receiving task {} ({} bytes)", task_id, len);

    let body = match timeout(
        config.timeout_options.read_timeout,
        hyper::body::to_bytes(req.into_body()),
    )
    .await
    {
        // Read errors come from the client side of the connection
        Ok(result) => result.map_err(|err| HarnessError::IncompleteBody(err.to_string()))?,
        Err(_) => {
            return Err(HarnessError::Timeout(format!(
                "reading the body of task {}",
                task_id
            )))
        }
    };

    // A repeated task id overwrites the previous file
    let path = config.output_dir.join(payload_file_name(task_id));
    fs::write(&path, &body)
        .await
        .map_err(|err| HarnessError::io(&path, err))?;
    Ok(task_id)
}

/// Answer one request. Failures only affect the request they happened on.
async fn handle_request(
    config: Arc<ReceiverConfig>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    match receive(&config, req).await {
        Ok(task_id) => {
            info!("received task {}", task_id);
            Ok(Response::new(Body::empty()))
        }
        Err(err) => {
            let status = err.status_code();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!("Failed to store upload: {}", err);
            } else {
                warn!("Rejected upload: {}", err);
            }
            let mut resp = Response::new(Body::from(err.to_string()));
            *resp.status_mut() = status;
            Ok(resp)
        }
    }
}

/// The receiver server.
pub struct ReceiverServer {
    config: Arc<ReceiverConfig>,
    /// Main worker for the server
    main_worker: Option<task::JoinHandle<Result<(), hyper::Error>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: Option<SocketAddr>,
}

impl ReceiverServer {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            config: Arc::new(config),
            main_worker: None,
            shutdown_tx: None,
            local_addr: None,
        }
    }

    /// Address the server is bound to, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Create the output directory, bind and start serving in the background.
    pub async fn listen(&mut self) -> Result<SocketAddr, HarnessError> {
        fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|err| HarnessError::io(&self.config.output_dir, err))?;

        let bind_addr = self.config.bind_addr();
        let addr = tokio::net::lookup_host(&bind_addr)
            .await
            .map_err(|err| HarnessError::Config(format!("cannot resolve {}: {}", bind_addr, err)))?
            .next()
            .ok_or_else(|| HarnessError::Config(format!("no address for {}", bind_addr)))?;

        let config = self.config.clone();
        let make_svc = make_service_fn(move |_conn| {
            let config = config.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle_request(config.clone(), req)
                }))
            }
        });

        let server = Server::try_bind(&addr)?.serve(make_svc);
        let local_addr = server.local_addr();
        info!("listening on http://{}", local_addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let graceful = server.with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(graceful);

        self.main_worker = Some(handle);
        self.shutdown_tx = Some(shutdown_tx);
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Serve until the server stops. Cancel safe, the worker handle is only
    /// released once it has finished. Errors when the server did not stop
    /// cleanly.
    pub async fn wait(&mut self) -> Result<(), HarnessError> {
        let Some(handle) = self.main_worker.as_mut() else {
            return Ok(());
        };
        let res = handle.await;
        self.main_worker = None;
        server_outcome(res)
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(&mut self) -> Result<(), HarnessError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let res = self.wait().await;
        debug!("receiver stopped");
        res
    }
}

/// Turn the exit of the main worker into the result of the server.
fn server_outcome(res: Result<Result<(), hyper::Error>, JoinError>) -> Result<(), HarnessError> {
    match res {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            error!("server error: {}", err);
            Err(err.into())
        }
        Err(err) => {
            error!("server task failed: {}", err);
            Err(HarnessError::ServerStopped(if err.is_panic() {
                "panicked".to_string()
            } else {
                "cancelled".to_string()
            }))
        }
    }
}
