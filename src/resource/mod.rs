//! Asset resolution and property files

pub mod loader;
pub mod propfile;

pub use loader::{AssetSource, FileAssets, MemoryAssets};
