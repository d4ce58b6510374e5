//! Bluesky client implementation.

use async_trait::async_trait;
use atrium_api::agent::bluesky::{AtprotoServiceType, BSKY_CHAT_DID};
use bsky_sdk::BskyAgent;
use bsky_sdk::agent::config::Config as BskyConfig;
use bsky_sdk::rich_text::RichText;
use tracing::{debug, error, info};

use crate::{BlueskyError, Profile, SearchPost};

/// Read-only lookups used by the candidate sources.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Search posts for `query`, optionally only those mentioning `mentions`.
    async fn search_posts(
        &self,
        query: &str,
        mentions: Option<&str>,
        limit: u8,
    ) -> Result<Vec<SearchPost>, BlueskyError>;

    /// Fetch a profile by handle or DID.
    async fn get_profile(&self, actor: &str) -> Result<Profile, BlueskyError>;
}

/// Authenticated Bluesky session.
pub struct BlueskyClient {
    agent: BskyAgent,
    handle: String,
}

impl BlueskyClient {
    /// Create a new Bluesky client and authenticate.
    pub async fn new(
        pds_url: &str,
        handle: &str,
        app_password: &str,
    ) -> Result<Self, BlueskyError> {
        let agent = if pds_url == "https://bsky.social" {
            BskyAgent::builder()
                .build()
                .await
                .map_err(|e| BlueskyError::Auth(e.to_string()))?
        } else {
            let config = BskyConfig {
                endpoint: pds_url.to_string(),
                ..Default::default()
            };
            BskyAgent::builder()
                .config(config)
                .build()
                .await
                .map_err(|e| BlueskyError::Auth(e.to_string()))?
        };

        agent
            .login(handle, app_password)
            .await
            .map_err(|e| BlueskyError::Auth(e.to_string()))?;

        info!(handle = %handle, pds = %pds_url, "authenticated with bluesky");

        Ok(Self {
            agent,
            handle: handle.to_string(),
        })
    }

    /// The logged-in account's DID.
    pub async fn did(&self) -> Result<String, BlueskyError> {
        self.agent
            .get_session()
            .await
            .map(|s| s.did.to_string())
            .ok_or_else(|| BlueskyError::Auth("no active session".to_string()))
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Send a direct message, opening a conversation if needed.
    ///
    /// DMs use the chat.bsky lexicon and are proxied to the chat service.
    /// Mentions and links in `text` are detected and linked. Returns the
    /// message id.
    #[tracing::instrument(skip(self, text), fields(recipient = %recipient_did))]
    pub async fn send_dm(&self, recipient_did: &str, text: &str) -> Result<String, BlueskyError> {
        let chat_did = BSKY_CHAT_DID
            .parse()
            .map_err(|e| BlueskyError::invalid(BSKY_CHAT_DID, e))?;
        let chat_api = self
            .agent
            .api_with_proxy(chat_did, AtprotoServiceType::BskyChat);

        let member = recipient_did
            .parse()
            .map_err(|e| BlueskyError::invalid(recipient_did, e))?;

        let convo = chat_api
            .chat
            .bsky
            .convo
            .get_convo_for_members(
                atrium_api::chat::bsky::convo::get_convo_for_members::ParametersData {
                    members: vec![member],
                }
                .into(),
            )
            .await
            .map_err(|e| {
                error!(error = %e, "failed to get/create conversation");
                BlueskyError::api("getConvoForMembers", e)
            })?;

        let convo_id = convo.convo.id.clone();
        debug!(convo_id = %convo_id, "got conversation, sending message");

        let rt = RichText::new_with_detect_facets(text)
            .await
            .map_err(|e| BlueskyError::api("richText", e))?;

        let message = chat_api
            .chat
            .bsky
            .convo
            .send_message(
                atrium_api::chat::bsky::convo::send_message::InputData {
                    convo_id: convo_id.clone(),
                    message: atrium_api::chat::bsky::convo::defs::MessageInputData {
                        embed: None,
                        facets: rt.facets,
                        text: rt.text,
                    }
                    .into(),
                }
                .into(),
            )
            .await
            .map_err(|e| {
                error!(error = %e, "failed to send message");
                BlueskyError::api("sendMessage", e)
            })?;

        debug!(convo_id = %convo_id, message_id = %message.id, "sent bluesky dm");

        Ok(message.id.clone())
    }

    /// Search recent posts.
    pub async fn search_posts(
        &self,
        query: &str,
        mentions: Option<&str>,
        limit: u8,
    ) -> Result<Vec<SearchPost>, BlueskyError> {
        let mentions = mentions
            .map(|m| m.parse().map_err(|e| BlueskyError::invalid(m, e)))
            .transpose()?;

        let params = atrium_api::app::bsky::feed::search_posts::ParametersData {
            author: None,
            cursor: None,
            domain: None,
            lang: None,
            limit: limit.clamp(1, 100).try_into().ok(),
            mentions,
            q: query.to_string(),
            since: None,
            sort: Some("latest".to_string()),
            tag: None,
            until: None,
            url: None,
        };

        let output = self
            .agent
            .api
            .app
            .bsky
            .feed
            .search_posts(params.into())
            .await
            .map_err(|e| BlueskyError::api("searchPosts", e))?;

        let posts: Vec<SearchPost> = output
            .posts
            .iter()
            .map(|post| SearchPost {
                uri: post.uri.clone(),
                author_did: post.author.did.to_string(),
                author_handle: post.author.handle.to_string(),
                text: extract_post_text(&post.record),
            })
            .collect();

        debug!(query = %query, count = posts.len(), "searched posts");

        Ok(posts)
    }

    /// Get a user's profile by handle or DID.
    pub async fn get_profile(&self, actor: &str) -> Result<Profile, BlueskyError> {
        let params = atrium_api::app::bsky::actor::get_profile::ParametersData {
            actor: actor
                .parse()
                .map_err(|e| BlueskyError::invalid(actor, e))?,
        };

        let output = self
            .agent
            .api
            .app
            .bsky
            .actor
            .get_profile(params.into())
            .await
            .map_err(|e| BlueskyError::api("getProfile", e))?;

        debug!(actor = %actor, handle = %output.handle.as_str(), "fetched profile");

        Ok(Profile {
            did: output.did.to_string(),
            handle: output.handle.to_string(),
            display_name: output.display_name.clone(),
            description: output.description.clone(),
        })
    }
}

#[async_trait]
impl Directory for BlueskyClient {
    async fn search_posts(
        &self,
        query: &str,
        mentions: Option<&str>,
        limit: u8,
    ) -> Result<Vec<SearchPost>, BlueskyError> {
        BlueskyClient::search_posts(self, query, mentions, limit).await
    }

    async fn get_profile(&self, actor: &str) -> Result<Profile, BlueskyError> {
        BlueskyClient::get_profile(self, actor).await
    }
}

/// Text of a post record, if it decodes as one.
fn extract_post_text(record: &atrium_api::types::Unknown) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct PostText {
        text: String,
    }

    serde_json::from_value::<PostText>(
        serde_json::to_value(record).unwrap_or(serde_json::Value::Null),
    )
    .ok()
    .map(|p| p.text)
}
