use async_trait::async_trait;
use bytes::Bytes;
use hyper::{
    client::HttpConnector,
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    Body, Client, Method, Request,
};
use tokio::time::timeout;
use tracing::debug;

use crate::{common::TimeoutOptions, error::HarnessError};

/// Destination of the payloads produced by the send tasks.
#[async_trait]
pub trait PayloadSink: Send + Sync + 'static {
    /// Deliver the payload of `task_id`, returning once it is acknowledged.
    async fn deliver(&self, task_id: u64, payload: Bytes) -> Result<(), HarnessError>;
}

/// Posts payloads to a receiver over HTTP/1.1.
///
/// The underlying hyper client pools connections, one sink is shared by all
/// the tasks of a run.
#[derive(Clone)]
pub struct HttpSink {
    client: Client<HttpConnector>,
    /// Receiver base url, e.g. `http://127.0.0.1:8080`
    base_url: String,
    timeout_options: TimeoutOptions,
}

impl HttpSink {
    pub fn new(base_url: impl Into<String>, timeout_options: TimeoutOptions) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout_options.connect_timeout));
        connector.set_nodelay(true);
        Self {
            client: Client::builder().build(connector),
            base_url: base_url.into(),
            timeout_options,
        }
    }

    /// The uri a payload of `task_id` is posted to.
    pub fn task_uri(&self, task_id: u64) -> String {
        format!("{}/?task_id={}", self.base_url.trim_end_matches('/'), task_id)
    }

    async fn post(&self, task_id: u64, payload: Bytes) -> Result<(), HarnessError> {
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.task_uri(task_id))
            .header(CONTENT_LENGTH, payload.len())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(payload))?;

        let resp = self.client.request(req).await?;
        let status = resp.status();
        // Drain the body so the connection goes back to the pool
        hyper::body::to_bytes(resp.into_body()).await?;
        debug!("Receiver answered {} for task {}", status, task_id);

        if !status.is_success() {
            return Err(HarnessError::UnexpectedStatus { task_id, status });
        }
        Ok(())
    }
}

#[async_trait]
impl PayloadSink for HttpSink {
    async fn deliver(&self, task_id: u64, payload: Bytes) -> Result<(), HarnessError> {
        match timeout(
            self.timeout_options.request_timeout,
            self.post(task_id, payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(HarnessError::Timeout(format!(
                "posting task {} to {}",
                task_id, self.base_url
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_task_uri() {
        let sink = HttpSink::new("http://127.0.0.1:8080", TimeoutOptions::default());
        assert_eq!(sink.task_uri(7), "http://127.0.0.1:8080/?task_id=7");
        let sink = HttpSink::new("http://localhost:9000/", TimeoutOptions::default());
        assert_eq!(sink.task_uri(0), "http://localhost:9000/?task_id=0");
    }

    #[tokio::test]
    async fn test_deliver_connection_refused() {
        // Bind then drop a listener to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let options = TimeoutOptions {
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let sink = HttpSink::new(format!("http://{}", addr), options);
        let res = sink.deliver(1, Bytes::from_static(b"abcd")).await;
        assert!(matches!(
            res,
            Err(HarnessError::Http(_)) | Err(HarnessError::Timeout(_))
        ));
    }
}
