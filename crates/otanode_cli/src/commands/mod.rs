//! CLI command implementations.

pub mod deploy;
pub mod hash;
pub mod keygen;
pub mod render;
pub mod serve;
