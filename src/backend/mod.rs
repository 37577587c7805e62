//! Backend collaborator for hero records
//!
//! `HeroBackend` is the seam the hero service talks through. The in-memory
//! store implements it directly; `HttpBackend` implements it over the hero
//! web API.

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::hero::{Hero, HeroId, NewHero};
use crate::protocol::ProtocolError;

pub use http::HttpBackend;

/// Errors surfaced by a backend round trip
#[derive(Debug, Error)]
pub enum BackendError {
  #[error("hero id={0} not found")]
  NotFound(HeroId),
  #[error("no hero ids left to assign")]
  IdsExhausted,
  #[error("Http failure response for {target}: {status} {reason}")]
  Status {
    target: String,
    status: u16,
    reason: String,
  },
  #[error("connection failure: {0}")]
  Io(#[from] std::io::Error),
  #[error("invalid response body: {0}")]
  Decode(#[from] serde_json::Error),
  #[error(transparent)]
  Protocol(#[from] ProtocolError),
}

/// One method per endpoint of the hero collection; each is a single round trip
#[async_trait]
pub trait HeroBackend: Send + Sync {
  /// `GET /heroes`
  async fn list(&self) -> Result<Vec<Hero>, BackendError>;

  /// `GET /heroes/{id}`
  async fn get(&self, id: HeroId) -> Result<Hero, BackendError>;

  /// `GET /heroes/?id={id}`, an empty result instead of not-found
  async fn find_by_id(&self, id: HeroId) -> Result<Vec<Hero>, BackendError>;

  /// `GET /heroes?name={term}`
  async fn search(&self, term: &str) -> Result<Vec<Hero>, BackendError>;

  /// `POST /heroes`
  async fn create(&self, hero: NewHero) -> Result<Hero, BackendError>;

  /// `PUT /heroes`
  async fn update(&self, hero: &Hero) -> Result<(), BackendError>;

  /// `DELETE /heroes/{id}`
  async fn delete(&self, id: HeroId) -> Result<Hero, BackendError>;
}
