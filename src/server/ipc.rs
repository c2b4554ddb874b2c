// RPC over TCP with a length-prefixed JSON protocol

use crate::error::{BookSearchError, ErrorCode, Result};
use crate::retrieval::{SearchRequest, SearchResponse};
use crate::vector_store::PointId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Maximum frame size (10MB)
const MAX_FRAME_SIZE: u32 = 10 * 1024 * 1024;

/// Requests accepted by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RpcRequest {
    /// Run a search
    Retrieve(RetrieveRequest),
    /// Report serving status
    Health,
}

/// Search parameters. A zero (or missing) integer means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    #[serde(default)]
    pub dense_top_k: u32,
    #[serde(default)]
    pub sparse_top_k: u32,
    #[serde(default)]
    pub top_k: u32,
    #[serde(default)]
    pub top_n: u32,
}

impl RetrieveRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

impl From<RetrieveRequest> for SearchRequest {
    fn from(request: RetrieveRequest) -> Self {
        fn unset_if_zero(value: u32) -> Option<usize> {
            (value > 0).then_some(value as usize)
        }

        SearchRequest {
            query: request.query,
            top_n: unset_if_zero(request.top_n),
            dense_top_k: unset_if_zero(request.dense_top_k),
            sparse_top_k: unset_if_zero(request.sparse_top_k),
            fusion_top_k: unset_if_zero(request.top_k),
            filter: Default::default(),
        }
    }
}

/// Parallel id / score lists, best first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub book_ids: Vec<PointId>,
    pub scores: Vec<f32>,
}

impl From<&SearchResponse> for RetrieveResponse {
    fn from(response: &SearchResponse) -> Self {
        Self {
            book_ids: response.results.iter().map(|r| r.id.clone()).collect(),
            scores: response.results.iter().map(|r| r.score).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServingStatus {
    Serving,
    NotServing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ServingStatus,
}

/// Envelope for every response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a successful response carrying `data`
    pub fn ok<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                code: None,
                message: None,
                data: Some(value),
            },
            Err(e) => Self::error(ErrorCode::Internal, format!("Failed to encode response: {}", e)),
        }
    }

    /// Create an error response
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            message: Some(message.into()),
            data: None,
        }
    }

    /// Decode the payload of a successful response, or surface the failure
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        if !self.success {
            return Err(BookSearchError::Remote {
                code: self.code.unwrap_or(ErrorCode::Internal),
                message: self.message.unwrap_or_default(),
            });
        }

        let data = self.data.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(data).map_err(|e| BookSearchError::Json {
            source: e,
            context: "Failed to decode response payload".to_string(),
        })
    }
}

/// Read one length-prefixed JSON frame
pub async fn read_frame<T, R>(stream: &mut R) -> Result<T>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let length = stream.read_u32().await.map_err(|e| BookSearchError::Io {
        source: e,
        context: "Failed to read frame length".to_string(),
    })?;

    if length > MAX_FRAME_SIZE {
        return Err(BookSearchError::Server(format!(
            "Frame too large: {} bytes (max: {})",
            length, MAX_FRAME_SIZE
        )));
    }

    let mut buffer = vec![0u8; length as usize];
    stream
        .read_exact(&mut buffer)
        .await
        .map_err(|e| BookSearchError::Io {
            source: e,
            context: "Failed to read frame payload".to_string(),
        })?;

    serde_json::from_slice(&buffer).map_err(|e| BookSearchError::Json {
        source: e,
        context: "Failed to deserialize frame".to_string(),
    })
}

/// Write one length-prefixed JSON frame (4-byte big-endian length)
pub async fn write_frame<T, W>(stream: &mut W, value: &T) -> Result<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(value).map_err(|e| BookSearchError::Json {
        source: e,
        context: "Failed to serialize frame".to_string(),
    })?;

    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(BookSearchError::Server(format!(
            "Frame too large: {} bytes (max: {})",
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }

    stream
        .write_u32(payload.len() as u32)
        .await
        .map_err(|e| BookSearchError::Io {
            source: e,
            context: "Failed to write frame length".to_string(),
        })?;

    stream
        .write_all(&payload)
        .await
        .map_err(|e| BookSearchError::Io {
            source: e,
            context: "Failed to write frame payload".to_string(),
        })?;

    stream.flush().await.map_err(|e| BookSearchError::Io {
        source: e,
        context: "Failed to flush frame".to_string(),
    })?;

    Ok(())
}

/// Client sending one request per connection
pub struct IpcClient {
    addr: String,
}

impl IpcClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Connect, send `request`, and return the raw response envelope
    pub async fn send(&self, request: &RpcRequest) -> Result<RpcResponse> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| BookSearchError::Io {
                source: e,
                context: format!("Failed to connect to server at {}", self.addr),
            })?;

        write_frame(&mut stream, request).await?;
        read_frame(&mut stream).await
    }

    pub async fn retrieve(&self, request: RetrieveRequest) -> Result<RetrieveResponse> {
        self.send(&RpcRequest::Retrieve(request))
            .await?
            .into_data()
    }

    pub async fn health(&self) -> Result<ServingStatus> {
        let response: HealthResponse = self.send(&RpcRequest::Health).await?.into_data()?;
        Ok(response.status)
    }
}
