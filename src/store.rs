use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::backend::{BackendError, HeroBackend};
use crate::hero::{Hero, HeroId, NewHero};
use crate::mock_heroes;

/// First id handed out by an empty store
const FIRST_ID: HeroId = 11;

/// In-memory hero collection, kept in insertion order
pub struct HeroStore {
  heroes: RwLock<Vec<Hero>>,
}

impl HeroStore {
  /// Create a store seeded with the mock roster
  pub fn new() -> Self {
    Self::with_heroes(mock_heroes::heroes())
  }

  pub fn with_heroes(heroes: Vec<Hero>) -> Self {
    Self {
      heroes: RwLock::new(heroes),
    }
  }

  fn read(&self) -> RwLockReadGuard<'_, Vec<Hero>> {
    self.heroes.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, Vec<Hero>> {
    self.heroes.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// Next free id: one past the highest stored id
  fn gen_id(heroes: &[Hero]) -> Result<HeroId, BackendError> {
    match heroes.iter().map(|h| h.id).max() {
      Some(max) => max.checked_add(1).ok_or(BackendError::IdsExhausted),
      None => Ok(FIRST_ID),
    }
  }

  pub fn len(&self) -> usize {
    self.read().len()
  }
}

impl Default for HeroStore {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl HeroBackend for HeroStore {
  async fn list(&self) -> Result<Vec<Hero>, BackendError> {
    Ok(self.read().clone())
  }

  async fn get(&self, id: HeroId) -> Result<Hero, BackendError> {
    self
      .read()
      .iter()
      .find(|h| h.id == id)
      .cloned()
      .ok_or(BackendError::NotFound(id))
  }

  async fn find_by_id(&self, id: HeroId) -> Result<Vec<Hero>, BackendError> {
    Ok(self.read().iter().filter(|h| h.id == id).cloned().collect())
  }

  async fn search(&self, term: &str) -> Result<Vec<Hero>, BackendError> {
    let term = term.to_lowercase();
    Ok(
      self
        .read()
        .iter()
        .filter(|h| h.name.to_lowercase().contains(&term))
        .cloned()
        .collect(),
    )
  }

  async fn create(&self, hero: NewHero) -> Result<Hero, BackendError> {
    let mut heroes = self.write();
    let hero = hero.with_id(Self::gen_id(&heroes)?);
    debug!("Stored hero {:?}", hero);
    heroes.push(hero.clone());
    Ok(hero)
  }

  async fn update(&self, hero: &Hero) -> Result<(), BackendError> {
    let mut heroes = self.write();
    let stored = heroes
      .iter_mut()
      .find(|h| h.id == hero.id)
      .ok_or(BackendError::NotFound(hero.id))?;
    stored.name = hero.name.clone();
    Ok(())
  }

  async fn delete(&self, id: HeroId) -> Result<Hero, BackendError> {
    let mut heroes = self.write();
    let pos = heroes
      .iter()
      .position(|h| h.id == id)
      .ok_or(BackendError::NotFound(id))?;
    Ok(heroes.remove(pos))
  }
}
