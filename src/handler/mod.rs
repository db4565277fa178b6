//! Request handler module
//!
//! Turns requests into responses: the asset cache, the resolver that decides
//! between cache, disk, fallback and 304, and the stages wrapped around it.

pub mod assets;
pub mod compression;
pub mod pipeline;
pub mod policy;
pub mod resolver;
pub mod security;

pub use assets::AssetCache;
pub use pipeline::Pipeline;
