//! Hero data service
//!
//! Translates hero operations into backend calls and records one message per
//! call in the message log. Failures are absorbed here: the caller always
//! gets a value back, falling back to an empty list or `None`, so a failed
//! call looks the same as an empty or not-found result.

use std::sync::Arc;

use tracing::error;

use crate::backend::{BackendError, HeroBackend};
use crate::hero::{Hero, HeroId, NewHero};
use crate::message::MessageService;

const LOG_PREFIX: &str = "HeroService: ";

pub struct HeroService {
  backend: Arc<dyn HeroBackend>,
  messages: Arc<MessageService>,
}

impl HeroService {
  pub fn new(backend: Arc<dyn HeroBackend>, messages: Arc<MessageService>) -> Self {
    Self { backend, messages }
  }

  fn log(&self, message: impl AsRef<str>) {
    self
      .messages
      .add(format!("{}{}", LOG_PREFIX, message.as_ref()));
  }

  /// Absorb a failed backend call
  ///
  /// Reports the error, logs `<operation> failed: <detail>` and hands back
  /// `fallback` so the caller never sees the error.
  fn handle_error<T>(&self, operation: &str, result: Result<T, BackendError>, fallback: T) -> T {
    match result {
      Ok(value) => value,
      Err(e) => {
        error!(operation, error = %e, "Hero backend call failed");
        self.log(format!("{} failed: {}", operation, e));
        fallback
      }
    }
  }

  /// GET heroes from the backend
  pub async fn get_heroes(&self) -> Vec<Hero> {
    let result = self.backend.list().await.inspect(|_| self.log("fetched heroes"));
    self.handle_error("getHeroes", result, Vec::new())
  }

  /// GET hero by id; `None` when it is missing
  pub async fn get_hero(&self, id: HeroId) -> Option<Hero> {
    let result = self
      .backend
      .get(id)
      .await
      .inspect(|_| self.log(format!("fetched hero id={}", id)))
      .map(Some);
    self.handle_error(&format!("getHero id={}", id), result, None)
  }

  /// GET hero by id through the query endpoint, so a missing hero is not a 404
  pub async fn get_hero_no_404(&self, id: HeroId) -> Option<Hero> {
    let result = self.backend.find_by_id(id).await.map(|heroes| {
      let hero = heroes.into_iter().next();
      match hero {
        Some(_) => self.log(format!("fetched hero id={}", id)),
        None => self.log(format!("did not find hero id={}", id)),
      }
      hero
    });
    self.handle_error(&format!("getHero id={}", id), result, None)
  }

  /// Find heroes whose name contains `term`
  ///
  /// A blank term returns an empty list without calling the backend.
  pub async fn search_heroes(&self, term: &str) -> Vec<Hero> {
    if term.trim().is_empty() {
      return Vec::new();
    }
    let result = self.backend.search(term).await.inspect(|heroes| {
      if heroes.is_empty() {
        self.log(format!("no heroes matching \"{}\"", term));
      } else {
        self.log(format!("found heroes matching \"{}\"", term));
      }
    });
    self.handle_error("searchHeroes", result, Vec::new())
  }

  /// POST a new hero; returns it with the id the backend assigned
  pub async fn add_hero(&self, hero: NewHero) -> Option<Hero> {
    let result = self
      .backend
      .create(hero)
      .await
      .inspect(|h| self.log(format!("added hero '{}' [id={}]", h.name, h.id)))
      .map(Some);
    self.handle_error("addHero", result, None)
  }

  /// PUT an updated hero
  pub async fn update_hero(&self, hero: &Hero) -> Option<()> {
    let result = self
      .backend
      .update(hero)
      .await
      .inspect(|_| self.log(format!("updated hero id={}", hero.id)))
      .map(Some);
    self.handle_error("updateHero", result, None)
  }

  /// DELETE a hero by id; returns the removed hero
  pub async fn delete_hero(&self, id: HeroId) -> Option<Hero> {
    let result = self
      .backend
      .delete(id)
      .await
      .inspect(|_| self.log(format!("deleted hero id={}", id)))
      .map(Some);
    self.handle_error("deleteHero", result, None)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::HeroStore;
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// Backend whose every call fails with a connection error
  #[derive(Default)]
  struct BrokenBackend {
    calls: AtomicUsize,
  }

  impl BrokenBackend {
    fn fail<T>(&self) -> Result<T, BackendError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Err(BackendError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
      )))
    }
  }

  #[async_trait]
  impl HeroBackend for BrokenBackend {
    async fn list(&self) -> Result<Vec<Hero>, BackendError> {
      self.fail()
    }
    async fn get(&self, _id: HeroId) -> Result<Hero, BackendError> {
      self.fail()
    }
    async fn find_by_id(&self, _id: HeroId) -> Result<Vec<Hero>, BackendError> {
      self.fail()
    }
    async fn search(&self, _term: &str) -> Result<Vec<Hero>, BackendError> {
      self.fail()
    }
    async fn create(&self, _hero: NewHero) -> Result<Hero, BackendError> {
      self.fail()
    }
    async fn update(&self, _hero: &Hero) -> Result<(), BackendError> {
      self.fail()
    }
    async fn delete(&self, _id: HeroId) -> Result<Hero, BackendError> {
      self.fail()
    }
  }

  fn service_with(backend: Arc<dyn HeroBackend>) -> (HeroService, Arc<MessageService>) {
    let messages = Arc::new(MessageService::new());
    (HeroService::new(backend, messages.clone()), messages)
  }

  #[tokio::test]
  async fn test_get_heroes_logs_once() {
    let (service, messages) = service_with(Arc::new(HeroStore::new()));
    let heroes = service.get_heroes().await;
    assert_eq!(heroes.len(), 9);
    assert_eq!(messages.messages(), vec!["HeroService: fetched heroes"]);
  }

  #[tokio::test]
  async fn test_get_hero_found_and_missing() {
    let (service, messages) = service_with(Arc::new(HeroStore::new()));

    assert_eq!(service.get_hero(13).await, Some(Hero::new(13, "Bombasto")));
    assert_eq!(service.get_hero(99).await, None);

    let log = messages.messages();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], "HeroService: fetched hero id=13");
    assert_eq!(log[1], "HeroService: getHero id=99 failed: hero id=99 not found");
  }

  #[tokio::test]
  async fn test_get_hero_no_404() {
    let (service, messages) = service_with(Arc::new(HeroStore::new()));

    assert_eq!(service.get_hero_no_404(20).await, Some(Hero::new(20, "Tornado")));
    assert_eq!(service.get_hero_no_404(11).await, None);
    assert_eq!(
      messages.messages(),
      vec![
        "HeroService: fetched hero id=20",
        "HeroService: did not find hero id=11",
      ]
    );
  }

  #[tokio::test]
  async fn test_add_hero_reports_assigned_id() {
    let store = Arc::new(HeroStore::with_heroes(vec![Hero::new(41, "Windstorm")]));
    let (service, messages) = service_with(store);

    let hero = service.add_hero(NewHero::new("Firestorm")).await;
    assert_eq!(hero, Some(Hero::new(42, "Firestorm")));
    assert_eq!(
      messages.messages(),
      vec!["HeroService: added hero 'Firestorm' [id=42]"]
    );
  }

  #[tokio::test]
  async fn test_update_and_delete() {
    let store = Arc::new(HeroStore::new());
    let (service, messages) = service_with(store.clone());

    assert_eq!(service.update_hero(&Hero::new(12, "Dr. Nicer")).await, Some(()));
    assert_eq!(service.delete_hero(12).await, Some(Hero::new(12, "Dr. Nicer")));
    assert_eq!(service.delete_hero(12).await, None);
    assert_eq!(store.len(), 8);

    let log = messages.messages();
    assert_eq!(log[0], "HeroService: updated hero id=12");
    assert_eq!(log[1], "HeroService: deleted hero id=12");
    assert!(log[2].starts_with("HeroService: deleteHero failed:"));
    assert_eq!(log.len(), 3);
  }

  #[tokio::test]
  async fn test_search_heroes() {
    let (service, messages) = service_with(Arc::new(HeroStore::new()));

    let names: Vec<String> = service
      .search_heroes("mag")
      .await
      .into_iter()
      .map(|h| h.name)
      .collect();
    assert_eq!(names, vec!["Magneta", "Magma"]);
    assert!(service.search_heroes("xyz").await.is_empty());

    assert_eq!(
      messages.messages(),
      vec![
        "HeroService: found heroes matching \"mag\"",
        "HeroService: no heroes matching \"xyz\"",
      ]
    );
  }

  #[tokio::test]
  async fn test_blank_search_skips_backend() {
    let backend = Arc::new(BrokenBackend::default());
    let (service, messages) = service_with(backend.clone());

    assert!(service.search_heroes("").await.is_empty());
    assert!(service.search_heroes("   ").await.is_empty());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    assert!(messages.is_empty());
  }

  #[tokio::test]
  async fn test_failures_fall_back_and_log_once_each() {
    let backend = Arc::new(BrokenBackend::default());
    let (service, messages) = service_with(backend.clone());

    assert!(service.get_heroes().await.is_empty());
    assert_eq!(service.get_hero(12).await, None);
    assert_eq!(service.get_hero_no_404(12).await, None);
    assert!(service.search_heroes("ma").await.is_empty());
    assert_eq!(service.add_hero(NewHero::new("Firestorm")).await, None);
    assert_eq!(service.update_hero(&Hero::new(12, "X")).await, None);
    assert_eq!(service.delete_hero(12).await, None);

    assert_eq!(backend.calls.load(Ordering::SeqCst), 7);
    let detail = "failed: connection failure: connection refused";
    assert_eq!(
      messages.messages(),
      vec![
        format!("HeroService: getHeroes {}", detail),
        format!("HeroService: getHero id=12 {}", detail),
        format!("HeroService: getHero id=12 {}", detail),
        format!("HeroService: searchHeroes {}", detail),
        format!("HeroService: addHero {}", detail),
        format!("HeroService: updateHero {}", detail),
        format!("HeroService: deleteHero {}", detail),
      ]
    );
  }
}
