pub mod headers;
pub mod session;

pub use session::{SessionManager, SessionState};
