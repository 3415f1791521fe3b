//! Request handling: routing, form decoding, and static UI serving.

pub mod form;
pub mod router;
pub mod static_files;

pub use router::handle_request;
