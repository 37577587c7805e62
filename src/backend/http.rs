use async_trait::async_trait;
use bytes::BytesMut;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::backend::{BackendError, HeroBackend};
use crate::hero::{Hero, HeroId, NewHero};
use crate::protocol::http::{JSON_CONTENT_TYPE, encode_component};
use crate::protocol::{Method, Parser, Request, Response};

/// Hero backend reached over the hero web API
///
/// Every call opens a fresh connection, sends one request and reads one
/// response. There is no retry and no timeout.
#[derive(Debug, Clone)]
pub struct HttpBackend {
  addr: String,
  base_path: String,
}

impl HttpBackend {
  pub fn new(addr: impl Into<String>, base_path: impl Into<String>) -> Self {
    Self {
      addr: addr.into(),
      base_path: base_path.into().trim_end_matches('/').to_string(),
    }
  }

  fn item_target(&self, id: HeroId) -> String {
    format!("{}/{}", self.base_path, id)
  }

  /// Send one request and return the successful response
  async fn send(&self, req: Request) -> Result<Response, BackendError> {
    let target = req.target.clone();
    let req = req
      .with_header("Host", self.addr.clone())
      .with_header("Connection", "close");

    debug!("{} {} -> {}", req.method, target, self.addr);
    let mut stream = TcpStream::connect(&self.addr).await?;
    stream.write_all(&req.encode()).await?;

    let mut buffer = BytesMut::with_capacity(4096);
    let resp = loop {
      if let Some((resp, _)) = Parser::parse_response(&buffer)? {
        break resp;
      }
      if stream.read_buf(&mut buffer).await? == 0 {
        // Peer closed: the body may be delimited by the close itself
        break Parser::parse_response_at_eof(&buffer)?.0;
      }
    };

    debug!("{} {} <- {} {}", req.method, target, resp.status, resp.reason);
    if !resp.is_success() {
      return Err(BackendError::Status {
        target,
        status: resp.status,
        reason: resp.reason,
      });
    }
    Ok(resp)
  }

  async fn fetch<T: DeserializeOwned>(&self, req: Request) -> Result<T, BackendError> {
    let resp = self.send(req).await?;
    if let Some(content_type) = resp.header("Content-Type") {
      if !content_type.starts_with(JSON_CONTENT_TYPE) {
        warn!("Expected a JSON body, got Content-Type '{}'", content_type);
      }
    }
    Ok(serde_json::from_slice(&resp.body)?)
  }

  fn json_request<T: serde::Serialize>(
    method: Method,
    target: impl Into<String>,
    body: &T,
  ) -> Result<Request, BackendError> {
    Ok(Request::json(method, target, serde_json::to_vec(body)?))
  }
}

#[async_trait]
impl HeroBackend for HttpBackend {
  async fn list(&self) -> Result<Vec<Hero>, BackendError> {
    self.fetch(Request::new(Method::Get, &self.base_path)).await
  }

  async fn get(&self, id: HeroId) -> Result<Hero, BackendError> {
    self.fetch(Request::new(Method::Get, self.item_target(id))).await
  }

  async fn find_by_id(&self, id: HeroId) -> Result<Vec<Hero>, BackendError> {
    let target = format!("{}/?id={}", self.base_path, id);
    self.fetch(Request::new(Method::Get, target)).await
  }

  async fn search(&self, term: &str) -> Result<Vec<Hero>, BackendError> {
    let target = format!("{}/?name={}", self.base_path, encode_component(term));
    self.fetch(Request::new(Method::Get, target)).await
  }

  async fn create(&self, hero: NewHero) -> Result<Hero, BackendError> {
    let req = Self::json_request(Method::Post, &self.base_path, &hero)?;
    self.fetch(req).await
  }

  async fn update(&self, hero: &Hero) -> Result<(), BackendError> {
    let req = Self::json_request(Method::Put, &self.base_path, hero)?;
    self.send(req).await.map(|_| ())
  }

  async fn delete(&self, id: HeroId) -> Result<Hero, BackendError> {
    self
      .fetch(Request::new(Method::Delete, self.item_target(id)))
      .await
  }
}
