pub mod app;
pub mod cleanup_tasks;
pub mod error;
pub mod graphql;
pub mod graphql_error;
pub mod http_routes;
pub mod session_cookie;
pub mod state;
