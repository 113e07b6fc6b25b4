//! HTTP surface of the web server
//!
//! Only the control route is served here; it is the boundary between a
//! browser and the command publisher.

mod control;

pub use control::{router, AckMode, AppState};
