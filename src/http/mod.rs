//! HTTP protocol layer module
//!
//! HTTP building blocks shared by the request pipeline: validators and
//! cache policies, content negotiation, MIME detection and response builders.

pub mod cache;
pub mod encoding;
pub mod mime;
pub mod response;

// Re-export commonly used types
pub use cache::{CachePolicy, Validators};
pub use encoding::ContentEncoding;
pub use response::{
    build_304_response, build_404_response, build_405_response, build_500_response,
    build_file_response, build_options_response, strip_body_for_head,
};
