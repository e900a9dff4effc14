use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request, Uri};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tracing::debug;

use crate::ApiError;
use tailscope_types::{
    FetchLogRequest, FetchLogResponse, LaunchRequest, LaunchResponse, ResolveRequest,
    ResolveResponse, TerminateRequest, TerminateResponse, TreeResponse,
};

/// Client for the experiment monitor HTTP API
#[derive(Clone, Debug)]
pub struct ExpClient {
    /// `host:port` to connect to
    authority: String,

    /// Path prefix the API is mounted under (no trailing slash)
    prefix: String,
}

impl ExpClient {
    /// Create a client for a server address such as `http://127.0.0.1:5050`
    pub fn new(server: &str) -> Result<Self, ApiError> {
        let uri: Uri = server
            .parse()
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", server, e)))?;

        match uri.scheme_str() {
            Some("http") | None => {}
            Some(other) => {
                return Err(ApiError::InvalidUrl(format!(
                    "unsupported scheme '{}' in {}",
                    other, server
                )));
            }
        }

        let authority = uri
            .authority()
            .ok_or_else(|| ApiError::InvalidUrl(format!("missing host in {}", server)))?;
        let authority = if authority.port().is_some() {
            authority.to_string()
        } else {
            format!("{}:80", authority.host())
        };

        let prefix = uri.path().trim_end_matches('/').to_string();

        Ok(Self { authority, prefix })
    }

    /// The `host:port` this client connects to
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Canonicalize a path (resolves `..`, strips a trailing log file name)
    pub async fn resolve_path(&self, path: &str) -> Result<String, ApiError> {
        let resp: ResolveResponse = self
            .post(
                "/get_relative_path",
                &ResolveRequest {
                    path: path.to_string(),
                },
            )
            .await?;
        Ok(resp.url)
    }

    /// All known paths in the workspace
    pub async fn list_tree(&self) -> Result<Vec<String>, ApiError> {
        let resp: TreeResponse = self.get("/tree").await?;
        Ok(resp.tree)
    }

    /// Fetch log records, from the start or after a continuation token
    pub async fn fetch_log(&self, request: &FetchLogRequest) -> Result<FetchLogResponse, ApiError> {
        self.post("/getlogs", request).await
    }

    /// Start a process at a path
    pub async fn launch(&self, request: &LaunchRequest) -> Result<LaunchResponse, ApiError> {
        self.post("/launch", request).await
    }

    /// Stop the process at a path
    pub async fn terminate(&self, request: &TerminateRequest) -> Result<TerminateResponse, ApiError> {
        self.post("/terminate", request).await
    }

    async fn get<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R, ApiError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.target(endpoint))
            .header(HOST, &self.authority)
            .body(Full::new(Bytes::new()))?;

        let body = self.send(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        payload: &B,
    ) -> Result<R, ApiError> {
        let json = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.target(endpoint))
            .header(HOST, &self.authority)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(json)))?;

        let body = self.send(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn target(&self, endpoint: &str) -> String {
        format!("{}{}", self.prefix, endpoint)
    }

    /// Send one request on a fresh connection and collect a 2xx body
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Bytes, ApiError> {
        let endpoint = request.uri().path().to_string();
        let stream = TcpStream::connect(&self.authority).await?;
        let io = TokioIo::new(stream);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("HTTP connection error: {}", e);
            }
        });

        let response = sender.send_request(request).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();

        debug!("{} -> {} ({} bytes)", endpoint, status, body.len());

        if !status.is_success() {
            return Err(ApiError::from_response(status, &body));
        }
        Ok(body)
    }
}
