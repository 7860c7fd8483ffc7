//! Request parameters of the resumable chunked-upload protocol.
//!
//! Key names follow the resumable.js client library and must stay
//! byte-for-byte identical for existing uploaders to keep working.

pub mod constants;
pub mod params;

pub use params::{ParamError, ResumableParams};
