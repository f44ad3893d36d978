pub mod config;
pub mod convert;
pub mod dedupe;
pub mod export;
pub mod media;
pub mod sync;
