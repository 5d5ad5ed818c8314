use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::error::{Result, VkError};
use super::keyboard::VkKeyboard;
use super::types::{
    ConversationMembers, LongPollResponse, LongPollServer, MemberProfile, VkEnvelope,
};
use crate::config::VkConfig;
use crate::dispatch::ChatTransport;

const API_BASE: &str = "https://api.vk.com/method/";

/// Thin client over the VK Bots API: community long poll plus the handful
/// of `messages.*` methods the bot needs.
pub struct VkApiClient {
    http: reqwest::Client,
    token: String,
    group_id: i64,
    api_version: String,
}

impl VkApiClient {
    pub fn new(config: &VkConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            // Must sit above the long poll wait, which is capped below 60s.
            .timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            http,
            token: config.token.clone(),
            group_id: config.group_id,
            api_version: config.api_version.clone(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T> {
        let mut query: Vec<(&str, String)> = vec![
            ("access_token", self.token.clone()),
            ("v", self.api_version.clone()),
        ];
        query.extend(params.iter().cloned());

        let envelope: VkEnvelope<T> = self
            .http
            .get(format!("{API_BASE}{method}"))
            .query(&query)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = envelope.error {
            return Err(VkError::Api {
                code: error.error_code,
                message: error.error_msg,
            });
        }
        envelope
            .response
            .ok_or_else(|| VkError::Malformed(format!("{method}: neither response nor error")))
    }

    pub async fn get_long_poll_server(&self) -> Result<LongPollServer> {
        self.call(
            "groups.getLongPollServer",
            &[("group_id", self.group_id.to_string())],
        )
        .await
    }

    /// One `a_check` round against the long poll server. The caller owns the
    /// ts cursor and reacts to `failed` codes.
    pub async fn long_poll_check(
        &self,
        server: &LongPollServer,
        ts: &str,
        wait_secs: u64,
    ) -> Result<LongPollResponse> {
        let response = self
            .http
            .get(&server.server)
            .query(&[
                ("act", "a_check".to_string()),
                ("key", server.key.clone()),
                ("ts", ts.to_string()),
                ("wait", wait_secs.to_string()),
            ])
            .send()
            .await?
            .json()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl ChatTransport for VkApiClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&VkKeyboard>,
    ) -> Result<()> {
        let mut params = vec![
            ("peer_id", chat_id.to_string()),
            ("message", text.to_string()),
            (
                "random_id",
                rand::thread_rng().gen_range(1..i32::MAX).to_string(),
            ),
        ];
        if let Some(keyboard) = keyboard {
            params.push(("keyboard", keyboard.to_json()?));
        }
        // The response is the sent message id; nothing to do with it here.
        let _: serde_json::Value = self.call("messages.send", &params).await?;
        Ok(())
    }

    async fn chat_members(&self, chat_id: i64) -> Result<Vec<MemberProfile>> {
        let members: ConversationMembers = self
            .call(
                "messages.getConversationMembers",
                &[
                    ("peer_id", chat_id.to_string()),
                    ("group_id", self.group_id.to_string()),
                ],
            )
            .await?;
        Ok(members.profiles)
    }
}
