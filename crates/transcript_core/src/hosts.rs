//! Site identifiers used as resolver keys.
//!
//! A locator is handled by a site when the locator contains its identifier.

pub const YOUTUBE: &str = "youtube.com";
