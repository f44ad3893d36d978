pub mod classify;
pub mod engine;
pub mod names;
pub mod reaper;
