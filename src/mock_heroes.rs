//! Hard-coded hero roster used to seed the in-memory backend

use crate::hero::{Hero, HeroId};

pub const HEROES: [(HeroId, &str); 9] = [
  (12, "Dr. Nice"),
  (13, "Bombasto"),
  (14, "Celeritas"),
  (15, "Magneta"),
  (16, "RubberMan"),
  (17, "Dynama"),
  (18, "Dr. IQ"),
  (19, "Magma"),
  (20, "Tornado"),
];

/// Owned copy of the roster, in roster order
pub fn heroes() -> Vec<Hero> {
  HEROES
    .iter()
    .map(|&(id, name)| Hero::new(id, name))
    .collect()
}
