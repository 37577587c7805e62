//! Hero web API protocol
//!
//! This module provides the HTTP/1.1 codec spoken between the hero service
//! and its backend, and the REST routing for the `/heroes` collection.

pub mod http;
pub mod route;

pub use http::{Method, Parser, ProtocolError, Request, Response};
pub use route::Route;
