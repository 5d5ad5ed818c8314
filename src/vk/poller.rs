use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::DispatcherHandle;

use super::client::VkApiClient;
use super::error::VkError;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Community long poll loop. Owns the server/key/ts cursor, converts raw
/// group events into [`ChatUpdate`](super::types::ChatUpdate)s and feeds
/// them, in arrival order, into the dispatcher's queue.
pub struct LongPoller {
    client: Arc<VkApiClient>,
    dispatcher: DispatcherHandle,
    wait_secs: u64,
}

impl LongPoller {
    pub fn new(client: Arc<VkApiClient>, dispatcher: DispatcherHandle, wait_secs: u64) -> Self {
        Self {
            client,
            dispatcher,
            wait_secs,
        }
    }

    /// Runs until the dispatcher goes away. Transport errors re-obtain the
    /// long poll server with exponential backoff; game logic never sees
    /// them.
    pub async fn run(self) {
        let mut backoff = INITIAL_BACKOFF;

        'session: loop {
            let server = match self.client.get_long_poll_server().await {
                Ok(server) => {
                    tracing::info!(longpoll.server = %server.server, "Long poll session opened");
                    backoff = INITIAL_BACKOFF;
                    server
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        backoff.secs = backoff.as_secs(),
                        "Failed to obtain long poll server; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue 'session;
                }
            };

            let mut ts = server.ts.clone();
            loop {
                let response = match self.client.long_poll_check(&server, &ts, self.wait_secs).await
                {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::warn!(error = %e, "Long poll check failed; reconnecting");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        continue 'session;
                    }
                };

                if let Some(failed) = response.failed {
                    // 1: history is stale, resync ts. 2/3: key or session
                    // expired, a new server is required.
                    if failed == 1 {
                        if let Some(new_ts) = response.ts {
                            ts = new_ts;
                            continue;
                        }
                    }
                    tracing::info!(
                        longpoll.failed = failed,
                        "Long poll session invalidated: {}",
                        VkError::LongPollInvalidated(failed)
                    );
                    continue 'session;
                }

                if let Some(new_ts) = response.ts {
                    ts = new_ts;
                }

                for raw in response.updates {
                    if let Some(update) = raw.into_chat_update() {
                        tracing::debug!(
                            chat.id = update.chat_id,
                            sender.id = update.sender_id,
                            message.id = update.message_id,
                            "Inbound chat update"
                        );
                        if self.dispatcher.route_update(update).await.is_err() {
                            tracing::info!("Dispatcher is gone. Stopping long poller");
                            return;
                        }
                    }
                }
            }
        }
    }
}
