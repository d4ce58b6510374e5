//! Bluesky API types.

use serde::{Deserialize, Serialize};

/// A post returned by search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPost {
    /// AT URI of the post.
    pub uri: String,
    pub author_did: String,
    pub author_handle: String,
    /// Post text, when the record could be decoded.
    pub text: Option<String>,
}

/// A user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
}
