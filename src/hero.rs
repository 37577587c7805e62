use serde::{Deserialize, Serialize};

/// Backend-assigned hero identifier
pub type HeroId = u32;

/// A hero record as held by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hero {
  pub id: HeroId,
  pub name: String,
}

impl Hero {
  pub fn new(id: HeroId, name: impl Into<String>) -> Self {
    Self {
      id,
      name: name.into(),
    }
  }
}

/// A hero that has not been stored yet; the backend assigns its id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHero {
  pub name: String,
}

impl NewHero {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }

  /// Attach the assigned id
  pub fn with_id(self, id: HeroId) -> Hero {
    Hero { id, name: self.name }
  }
}
