use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::backend::{BackendError, HeroBackend};
use crate::hero::{Hero, HeroId, NewHero};
use crate::protocol::http::{Method, Request, Response};

/// REST route on the hero collection
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
  /// GET /heroes
  List,
  /// GET /heroes?name={term}
  Search(String),
  /// GET /heroes/?id={id}
  FindById(HeroId),
  /// GET /heroes/{id}
  Get(HeroId),
  /// POST /heroes
  Create(NewHero),
  /// PUT /heroes
  Update(Hero),
  /// DELETE /heroes/{id}
  Delete(HeroId),
  /// Request that maps to no route
  Rejected { status: u16, reason: String },
}

impl Route {
  fn rejected(status: u16, reason: impl Into<String>) -> Self {
    Route::Rejected {
      status,
      reason: reason.into(),
    }
  }

  /// Map a request onto a route of the collection mounted at `base_path`
  pub fn from_request(req: &Request, base_path: &str) -> Self {
    let base = base_path.trim_end_matches('/');
    let path = req.path().trim_end_matches('/');

    let Some(rest) = path.strip_prefix(base) else {
      return Self::rejected(404, format!("no resource at '{}'", req.path()));
    };

    if rest.is_empty() {
      return Self::collection(req);
    }

    match rest.strip_prefix('/') {
      Some(id) if !id.contains('/') => Self::item(req, id),
      _ => Self::rejected(404, format!("no resource at '{}'", req.path())),
    }
  }

  fn collection(req: &Request) -> Self {
    match req.method {
      Method::Get => {
        if let Some(term) = req.query_param("name") {
          return Route::Search(term);
        }
        match req.query_param("id") {
          Some(id) => match id.parse() {
            Ok(id) => Route::FindById(id),
            Err(_) => Self::rejected(400, format!("invalid hero id '{}'", id)),
          },
          None => Route::List,
        }
      }
      Method::Post => Self::body(req).map_or_else(|r| r, Route::Create),
      Method::Put => Self::body(req).map_or_else(|r| r, Route::Update),
      _ => Self::rejected(405, format!("{} not allowed on collection", req.method)),
    }
  }

  fn item(req: &Request, id: &str) -> Self {
    let Ok(id) = id.parse::<HeroId>() else {
      return Self::rejected(400, format!("invalid hero id '{}'", id));
    };
    match req.method {
      Method::Get => Route::Get(id),
      Method::Delete => Route::Delete(id),
      _ => Self::rejected(405, format!("{} not allowed on hero", req.method)),
    }
  }

  fn body<T: DeserializeOwned>(req: &Request) -> Result<T, Route> {
    if !req.has_json_body() {
      return Err(Self::rejected(415, "expected an application/json body"));
    }
    serde_json::from_slice(&req.body)
      .map_err(|e| Self::rejected(400, format!("invalid hero body: {}", e)))
  }

  /// Run the route against the backend and build the response
  pub async fn execute(self, backend: &dyn HeroBackend) -> Response {
    let result = match self {
      Route::List => backend.list().await.map(|heroes| json(200, &heroes)),
      Route::Search(term) => backend.search(&term).await.map(|heroes| json(200, &heroes)),
      Route::FindById(id) => backend.find_by_id(id).await.map(|heroes| json(200, &heroes)),
      Route::Get(id) => backend.get(id).await.map(|hero| json(200, &hero)),
      Route::Create(hero) => backend.create(hero).await.map(|hero| json(201, &hero)),
      Route::Update(hero) => backend.update(&hero).await.map(|_| Response::no_content()),
      Route::Delete(id) => backend.delete(id).await.map(|hero| json(200, &hero)),
      Route::Rejected { status, reason } => Ok(Response::error(status, reason)),
    };

    result.unwrap_or_else(|e| match e {
      BackendError::NotFound(_) => Response::error(404, e.to_string()),
      _ => Response::error(500, e.to_string()),
    })
  }
}

fn json<T: Serialize>(status: u16, value: &T) -> Response {
  match serde_json::to_vec(value) {
    Ok(body) => Response::json(status, body),
    Err(e) => Response::error(500, e.to_string()),
  }
}
