pub mod metrics;
pub mod user;

pub use metrics::metrics_middleware;
pub use user::{USER_ID_HEADER, USER_ROLE_HEADER};
