use crate::state::AppState;
use axum::Router;

mod dto;
pub mod extractors;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use dto::{MessageResponse, PublicUser};

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
