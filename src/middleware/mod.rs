pub mod auth;
pub mod request_id;
pub mod response;

pub use auth::{Admitted, ResourceRoute};
pub use request_id::request_id_middleware;
pub use response::ApiResponse;
