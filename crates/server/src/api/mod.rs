pub mod handlers;
pub mod middleware;
pub mod player;
pub mod routes;
pub mod search;
pub mod sessions;
pub mod stream;

pub use routes::create_router;
