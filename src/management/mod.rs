mod token;

pub use token::{CachedEntry, TokenStore};
