use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::backend::HeroBackend;
use crate::config::Config;
use crate::protocol::{Parser, Request, Response, Route};

/// Mock hero web API over TCP
pub struct Server {
  listener: TcpListener,
  local_addr: SocketAddr,
  backend: Arc<dyn HeroBackend>,
  base_path: String,
  latency: Duration,
}

impl Server {
  /// Bind the listener on `config.server_addr` and serve `backend` from it
  pub async fn bind(config: &Config, backend: Arc<dyn HeroBackend>) -> std::io::Result<Self> {
    let listener = TcpListener::bind(&config.server_addr).await?;
    let local_addr = listener.local_addr()?;
    info!("Hero web API bound to {}", local_addr);

    Ok(Self {
      listener,
      local_addr,
      backend,
      base_path: config.base_path.clone(),
      latency: Duration::from_millis(config.latency_ms),
    })
  }

  /// Get local listening address
  pub fn local_addr(&self) -> SocketAddr {
    self.local_addr
  }

  /// Route a request and run it against the backend
  async fn process_request(&self, req: &Request) -> Response {
    if !self.latency.is_zero() {
      tokio::time::sleep(self.latency).await;
    }
    Route::from_request(req, &self.base_path)
      .execute(self.backend.as_ref())
      .await
  }

  /// Handle a single client connection
  async fn handle_connection(
    self: Arc<Self>,
    mut stream: TcpStream,
    peer_addr: SocketAddr,
  ) -> std::io::Result<()> {
    let mut pending = BytesMut::with_capacity(8192);

    'conn: loop {
      // Answer every complete request already buffered
      loop {
        let (req, consumed) = match Parser::parse_request(&pending) {
          Ok(Some(parsed)) => parsed,
          Ok(None) => break,
          Err(e) => {
            warn!("Malformed request from {}: {}", peer_addr, e);
            let resp = Response::error(400, e.to_string()).with_header("Connection", "close");
            stream.write_all(&resp.encode()).await?;
            break 'conn;
          }
        };
        pending.advance(consumed);

        info!("{} {} from {}", req.method, req.target, peer_addr);
        let resp = self.process_request(&req).await;
        info!("{} {} -> {} {}", req.method, req.target, resp.status, resp.reason);

        stream.write_all(&resp.encode()).await?;
        if req.wants_close() {
          break 'conn;
        }
      }

      match stream.read_buf(&mut pending).await {
        Ok(0) => {
          info!("Connection closed by client: {}", peer_addr);
          break;
        }
        Ok(_) => {}
        Err(e) => {
          error!("Error reading from {}: {}", peer_addr, e);
          break;
        }
      }
    }

    info!("Connection handler ended for {}", peer_addr);
    Ok(())
  }

  /// Start server, accept and process connections
  pub async fn run(self: Arc<Self>) {
    info!("Server started, serving {} on {}", self.base_path, self.local_addr);

    loop {
      match self.listener.accept().await {
        Ok((stream, peer_addr)) => {
          info!("New connection accepted from {}", peer_addr);

          let server = Arc::clone(&self);

          // Spawn an independent task for each connection
          tokio::spawn(async move {
            if let Err(e) = server.handle_connection(stream, peer_addr).await {
              error!("Error handling connection from {}: {}", peer_addr, e);
            }
          });
        }
        Err(e) => {
          error!("Failed to accept connection: {}", e);
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::{BackendError, HttpBackend};
  use crate::hero::{Hero, NewHero};
  use crate::message::MessageService;
  use crate::service::HeroService;
  use crate::store::HeroStore;

  /// Serve a store on an ephemeral loopback port
  async fn spawn_server(store: HeroStore) -> (SocketAddr, Arc<HeroStore>) {
    let config = Config {
      server_addr: "127.0.0.1:0".to_string(),
      ..Config::default()
    };
    let store = Arc::new(store);
    let server = Server::bind(&config, store.clone()).await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(Arc::new(server).run());
    (addr, store)
  }

  fn backend(addr: SocketAddr) -> HttpBackend {
    HttpBackend::new(addr.to_string(), "/api/heroes")
  }

  #[tokio::test]
  async fn test_http_backend_round_trips() {
    let (addr, store) = spawn_server(HeroStore::new()).await;
    let backend = backend(addr);

    assert_eq!(backend.list().await.unwrap().len(), 9);
    assert_eq!(backend.get(15).await.unwrap(), Hero::new(15, "Magneta"));
    assert_eq!(backend.find_by_id(15).await.unwrap(), vec![Hero::new(15, "Magneta")]);
    assert_eq!(backend.search("dr. i").await.unwrap(), vec![Hero::new(18, "Dr. IQ")]);

    let created = backend.create(NewHero::new("Firestorm")).await.unwrap();
    assert_eq!(created, Hero::new(21, "Firestorm"));

    backend.update(&Hero::new(21, "Icestorm")).await.unwrap();
    assert_eq!(store.get(21).await.unwrap().name, "Icestorm");

    assert_eq!(backend.delete(21).await.unwrap(), Hero::new(21, "Icestorm"));
    assert_eq!(store.len(), 9);
  }

  #[tokio::test]
  async fn test_http_backend_not_found_status() {
    let (addr, _) = spawn_server(HeroStore::new()).await;
    let err = backend(addr).get(11).await.unwrap_err();
    match err {
      BackendError::Status { target, status, .. } => {
        assert_eq!(target, "/api/heroes/11");
        assert_eq!(status, 404);
      }
      other => panic!("Expected status error, got {:?}", other),
    }
    assert!(backend(addr).find_by_id(11).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_connection_refused_is_io_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = backend(addr).list().await.unwrap_err();
    assert!(matches!(err, BackendError::Io(_)));
  }

  #[tokio::test]
  async fn test_pipelined_requests_answered_in_order() {
    let (addr, _) = spawn_server(HeroStore::new()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut data = Request::new(crate::protocol::Method::Get, "/api/heroes/12").encode();
    data.extend_from_slice(
      &Request::new(crate::protocol::Method::Get, "/api/heroes/99")
        .with_header("Connection", "close")
        .encode(),
    );
    stream.write_all(&data).await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();

    let (first, consumed) = Parser::parse_response(&buf).unwrap().unwrap();
    assert_eq!(first.status, 200);
    let (second, _) = Parser::parse_response(&buf[consumed..]).unwrap().unwrap();
    assert_eq!(second.status, 404);
  }

  #[tokio::test]
  async fn test_malformed_request_gets_400_and_close() {
    let (addr, _) = spawn_server(HeroStore::new()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"NONSENSE\r\n\r\n").await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    let (resp, _) = Parser::parse_response(&buf).unwrap().unwrap();
    assert_eq!(resp.status, 400);
  }

  #[tokio::test]
  async fn test_oversized_request_body_rejected() {
    let (addr, _) = spawn_server(HeroStore::new()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let head = format!(
      "POST /api/heroes HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
      usize::MAX
    );
    stream.write_all(head.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    let (resp, _) = Parser::parse_response(&buf).unwrap().unwrap();
    assert_eq!(resp.status, 400);
  }

  #[tokio::test]
  async fn test_service_add_hero_end_to_end() {
    let (addr, _) = spawn_server(HeroStore::with_heroes(vec![Hero::new(41, "Windstorm")])).await;
    let messages = Arc::new(MessageService::new());
    let service = HeroService::new(Arc::new(backend(addr)), messages.clone());

    let hero = service.add_hero(NewHero::new("Firestorm")).await;
    assert_eq!(hero, Some(Hero::new(42, "Firestorm")));
    assert_eq!(
      messages.messages(),
      vec!["HeroService: added hero 'Firestorm' [id=42]"]
    );
  }

  #[tokio::test]
  async fn test_service_delete_missing_hero_end_to_end() {
    let (addr, _) = spawn_server(HeroStore::new()).await;
    let messages = Arc::new(MessageService::new());
    let service = HeroService::new(Arc::new(backend(addr)), messages.clone());

    assert_eq!(service.delete_hero(11).await, None);
    let log = messages.messages();
    assert_eq!(log.len(), 1);
    assert!(log[0].starts_with("HeroService: deleteHero failed:"));
    assert!(log[0].contains("404 Not Found"));
  }
}
