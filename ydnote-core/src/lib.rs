mod client;
mod session;

pub use client::{ApiError, ApiErrorClass, FetchedUrl, FileEntry, YdnoteClient};
pub use session::{CookieSession, SessionError};
