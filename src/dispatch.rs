use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};

use crate::config::GameConfig;
use crate::content::QuestionCatalog;
use crate::game::{GameSession, Participant, Roster};
use crate::store::GameStore;
use crate::users::{MentionResolution, UserDirectory};
use crate::vk::types::{ChatUpdate, MemberProfile};
use crate::vk::{VkError, VkKeyboard};

pub const CMD_START_PREFIX: &str = "Создай игру для: ";
pub const CMD_FINISH: &str = "Завершить игру";

/// Delivery is at-least-once; this bounds the duplicate-detection window.
const SEEN_MESSAGE_WINDOW: usize = 1024;

fn help_text(min_players: usize, max_players: usize) -> String {
    format!(
        "Для того, чтобы создать игру - напишите:\n\
         Создай игру для: @username, @username ... @username\n\
         Минимальное число игроков - {min_players}\n\
         Максимальное число игроков - {max_players}\n\
         @username пользователей необходимо указывать через запятую с пробелом"
    )
}

/// Outbound side of the chat, as seen by the game. The VK client implements
/// this; tests substitute a recording fake.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&VkKeyboard>,
    ) -> Result<(), VkError>;

    async fn chat_members(&self, chat_id: i64) -> Result<Vec<MemberProfile>, VkError>;
}

#[derive(Debug)]
pub enum DispatcherMessage {
    Update(ChatUpdate),
    SessionClosed { chat_id: i64 },
    LiveSessionCount { respond_to: oneshot::Sender<usize> },
}

/// The registry: one live session per chat, updates routed in arrival
/// order. The actor is the single writer of the chat-to-session map.
pub struct DispatcherActor {
    receiver: mpsc::Receiver<DispatcherMessage>,
    self_sender: mpsc::Sender<DispatcherMessage>,
    sessions: HashMap<i64, SessionActorHandle>,
    seen_messages: HashSet<(i64, i64)>,
    seen_order: VecDeque<(i64, i64)>,
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn GameStore>,
    users: UserDirectory,
    catalog: Arc<QuestionCatalog>,
    game_config: GameConfig,
}

impl DispatcherActor {
    /// Reload unfinished sessions at startup. Sessions still below their
    /// player quorum are left unrestored (abandoned); a corrupt load only
    /// costs the affected sessions, never the process.
    async fn recover(&mut self) {
        let sessions = match self.store.load_unfinished_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load unfinished sessions; starting empty");
                return;
            }
        };

        let mut restored = 0usize;
        let mut abandoned = 0usize;
        for mut session in sessions {
            if session.roster().len() < session.required_player_count {
                tracing::debug!(
                    chat.id = session.chat_id,
                    session.id = %session.session_id,
                    "Session below player quorum; abandoning"
                );
                abandoned += 1;
                continue;
            }
            session.revalidate_turn();
            let chat_id = session.chat_id;
            if self.sessions.contains_key(&chat_id) {
                tracing::warn!(chat.id = chat_id, "Duplicate live session in store; skipping");
                abandoned += 1;
                continue;
            }
            let handle = SessionActorHandle::spawn(
                32,
                session,
                Arc::clone(&self.transport),
                Arc::clone(&self.store),
                DispatcherHandle {
                    sender: self.self_sender.clone(),
                },
            );
            self.sessions.insert(chat_id, handle);
            restored += 1;
        }
        tracing::info!(
            sessions.restored = restored,
            sessions.abandoned = abandoned,
            "Session recovery complete"
        );
    }

    async fn handle_message(&mut self, msg: DispatcherMessage) {
        match msg {
            DispatcherMessage::Update(update) => self.handle_update(update).await,
            DispatcherMessage::SessionClosed { chat_id } => {
                if self.sessions.remove(&chat_id).is_some() {
                    tracing::info!(chat.id = chat_id, "Session removed from registry");
                } else {
                    tracing::warn!(chat.id = chat_id, "SessionClosed for unknown chat");
                }
            }
            DispatcherMessage::LiveSessionCount { respond_to } => {
                let _ = respond_to.send(self.sessions.len());
            }
        }
    }

    async fn handle_update(&mut self, update: ChatUpdate) {
        if self.is_duplicate(&update) {
            tracing::debug!(
                chat.id = update.chat_id,
                message.id = update.message_id,
                "Duplicate update dropped"
            );
            return;
        }

        if let Some(handle) = self.sessions.get(&update.chat_id).cloned() {
            let msg = if update.text.contains(CMD_FINISH) {
                SessionMessage::ForceFinish {
                    sender_id: update.sender_id,
                }
            } else {
                SessionMessage::Guess {
                    sender_id: update.sender_id,
                    text: update.text,
                }
            };
            if handle.forward(msg).await.is_err() {
                tracing::warn!(
                    chat.id = update.chat_id,
                    "Session actor unreachable; dropping stale handle"
                );
                self.sessions.remove(&update.chat_id);
            }
            return;
        }

        match update.text.strip_prefix(CMD_START_PREFIX) {
            Some(mention_list) => {
                let mention_list = mention_list.to_string();
                self.try_create_session(&update, &mention_list).await;
            }
            None => {
                let help = help_text(self.game_config.min_players, self.game_config.max_players);
                self.reply(update.chat_id, &help, None).await;
            }
        }
    }

    fn is_duplicate(&mut self, update: &ChatUpdate) -> bool {
        let key = (update.chat_id, update.message_id);
        if !self.seen_messages.insert(key) {
            return true;
        }
        self.seen_order.push_back(key);
        if self.seen_order.len() > SEEN_MESSAGE_WINDOW
            && let Some(oldest) = self.seen_order.pop_front()
        {
            self.seen_messages.remove(&oldest);
        }
        false
    }

    async fn try_create_session(&mut self, update: &ChatUpdate, mention_list: &str) {
        let chat_id = update.chat_id;
        let help = help_text(self.game_config.min_players, self.game_config.max_players);

        let mentions: Vec<String> = mention_list
            .split(", ")
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect();

        if mentions.len() > self.game_config.max_players {
            self.reply(chat_id, &format!("Игроков слишком много!\n\n{help}"), None)
                .await;
            return;
        }
        if mentions.len() < self.game_config.min_players {
            self.reply(chat_id, &format!("Игроков слишком мало!\n\n{help}"), None)
                .await;
            return;
        }

        let Some(pair) = self.catalog.pick_random().await else {
            tracing::error!(chat.id = chat_id, "Question catalog is empty");
            self.reply(
                chat_id,
                "Не удалось создать игру: список вопросов пуст.",
                None,
            )
            .await;
            return;
        };

        let members = match self.transport.chat_members(chat_id).await {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(chat.id = chat_id, error = %e, "Failed to fetch chat members");
                self.reply(
                    chat_id,
                    "Не удалось получить список участников беседы. Попробуйте ещё раз.",
                    None,
                )
                .await;
                return;
            }
        };

        let records = match self.users.resolve_mentions(&mentions, &members).await {
            Ok(MentionResolution::Resolved(records)) => records,
            Ok(MentionResolution::Unresolved(missing)) => {
                self.reply(
                    chat_id,
                    &format!("Не удалось найти в беседе: {}\n\n{help}", missing.join(", ")),
                    None,
                )
                .await;
                return;
            }
            Err(e) => {
                tracing::error!(chat.id = chat_id, error = %e, "Failed to persist user records");
                self.reply(
                    chat_id,
                    "Не удалось сохранить данные игроков. Попробуйте ещё раз.",
                    None,
                )
                .await;
                return;
            }
        };

        let roster = Roster::new(
            records
                .iter()
                .map(|r| Participant::new(r.vk_id, r.username.clone()))
                .collect(),
        );
        let session = GameSession::new(
            chat_id,
            pair.question,
            pair.answer,
            roster,
            mentions.len(),
            StdRng::from_entropy(),
        );

        if let Err(e) = self.store.create_session(&session).await {
            tracing::error!(chat.id = chat_id, error = %e, "Failed to persist new session");
            self.reply(chat_id, "Не удалось сохранить игру. Попробуйте ещё раз.", None)
                .await;
            return;
        }

        let summary = format!(
            "Игра была создана!\n\
             Список игроков:\n{}\n\
             Вопрос:\n{}\n\
             Слово: {}\n\
             Первым ходит: {}",
            session.roster().scoreboard(),
            session.question,
            session.masked_word(),
            session.current_participant().display_name,
        );

        tracing::info!(
            chat.id = chat_id,
            session.id = %session.session_id,
            session.players = session.roster().len(),
            "Created session"
        );

        let handle = SessionActorHandle::spawn(
            32,
            session,
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
            DispatcherHandle {
                sender: self.self_sender.clone(),
            },
        );
        self.sessions.insert(chat_id, handle);
        self.reply(chat_id, &summary, Some(&VkKeyboard::finish_game()))
            .await;
    }

    async fn reply(&self, chat_id: i64, text: &str, keyboard: Option<&VkKeyboard>) {
        if let Err(e) = self.transport.send_message(chat_id, text, keyboard).await {
            tracing::warn!(chat.id = chat_id, error = %e, "Failed to send chat message");
        }
    }
}

#[tracing::instrument(skip(actor))]
pub async fn run_dispatcher_actor(mut actor: DispatcherActor) {
    tracing::info!("Dispatcher actor started");
    actor.recover().await;
    while let Some(msg) = actor.receiver.recv().await {
        actor.handle_message(msg).await;
    }
    tracing::info!("Dispatcher actor stopped");
}

impl std::fmt::Debug for DispatcherActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherActor")
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<DispatcherMessage>,
}

impl DispatcherHandle {
    pub fn spawn(
        buffer_size: usize,
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn GameStore>,
        catalog: Arc<QuestionCatalog>,
        game_config: GameConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = DispatcherActor {
            receiver,
            self_sender: sender.clone(),
            sessions: HashMap::new(),
            seen_messages: HashSet::new(),
            seen_order: VecDeque::new(),
            transport,
            users: UserDirectory::new(Arc::clone(&store)),
            store,
            catalog,
            game_config,
        };
        tokio::spawn(run_dispatcher_actor(actor));
        Self { sender }
    }

    pub async fn route_update(&self, update: ChatUpdate) -> Result<(), String> {
        self.sender
            .send(DispatcherMessage::Update(update))
            .await
            .map_err(|e| format!("Failed to send update to dispatcher: {e}"))
    }

    async fn notify_session_closed(&self, chat_id: i64) {
        if self
            .sender
            .send(DispatcherMessage::SessionClosed { chat_id })
            .await
            .is_err()
        {
            tracing::warn!(chat.id = chat_id, "Failed to notify dispatcher of session close");
        }
    }

    pub async fn live_session_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(DispatcherMessage::LiveSessionCount { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[derive(Debug)]
enum SessionMessage {
    Guess { sender_id: i64, text: String },
    ForceFinish { sender_id: i64 },
}

/// Owns one [`GameSession`] and applies its guesses strictly in arrival
/// order. State transitions are persisted before the reply goes out; a
/// failed save rolls the in-memory state back so the store and the game
/// never diverge.
struct SessionActor {
    receiver: mpsc::Receiver<SessionMessage>,
    session: GameSession,
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn GameStore>,
    dispatcher: DispatcherHandle,
}

impl SessionActor {
    async fn handle_guess(&mut self, sender_id: i64, text: &str) -> bool {
        let rollback = self.session.clone();
        let outcome = self.session.process_guess(sender_id, text);

        if outcome.mutated_state()
            && let Err(e) = self.store.save_session(&self.session).await
        {
            tracing::error!(
                chat.id = self.session.chat_id,
                error = %e,
                "Failed to persist session after guess; rolling back"
            );
            self.session = rollback;
            self.reply(
                "Не удалось сохранить ход. Попробуйте ещё раз.",
                Some(&VkKeyboard::finish_game()),
            )
            .await;
            return false;
        }

        tracing::debug!(
            chat.id = self.session.chat_id,
            sender.id = sender_id,
            outcome = ?outcome,
            "Processed guess"
        );

        let terminal = outcome.is_terminal();
        let reply = format!(
            "Результаты игры:\n{}\n{}",
            self.session.roster().scoreboard(),
            outcome.text()
        );
        let keyboard = if terminal {
            None
        } else {
            Some(VkKeyboard::finish_game())
        };
        self.reply(&reply, keyboard.as_ref()).await;
        terminal
    }

    async fn handle_force_finish(&mut self, sender_id: i64) {
        tracing::info!(
            chat.id = self.session.chat_id,
            sender.id = sender_id,
            "Session force-finished by command"
        );
        self.session.finish_now();
        if let Err(e) = self.store.save_session(&self.session).await {
            // The session still goes down; losing the final timestamp is
            // preferable to a chat stuck with an unkillable game.
            tracing::error!(
                chat.id = self.session.chat_id,
                error = %e,
                "Failed to persist force-finished session"
            );
        }
        let reply = format!("Результаты игры:\n{}", self.session.roster().scoreboard());
        self.reply(&reply, None).await;
    }

    async fn reply(&self, text: &str, keyboard: Option<&VkKeyboard>) {
        if let Err(e) = self
            .transport
            .send_message(self.session.chat_id, text, keyboard)
            .await
        {
            tracing::warn!(
                chat.id = self.session.chat_id,
                error = %e,
                "Failed to send chat message"
            );
        }
    }
}

#[tracing::instrument(skip(actor), fields(
    chat.id = actor.session.chat_id,
    session.id = %actor.session.session_id,
))]
async fn run_session_actor(mut actor: SessionActor) {
    tracing::info!("Session actor started");
    while let Some(msg) = actor.receiver.recv().await {
        match msg {
            SessionMessage::Guess { sender_id, text } => {
                if actor.handle_guess(sender_id, &text).await {
                    break;
                }
            }
            SessionMessage::ForceFinish { sender_id } => {
                actor.handle_force_finish(sender_id).await;
                break;
            }
        }
    }
    let chat_id = actor.session.chat_id;
    actor.dispatcher.notify_session_closed(chat_id).await;
    tracing::info!("Session actor stopped");
}

#[derive(Clone, Debug)]
struct SessionActorHandle {
    sender: mpsc::Sender<SessionMessage>,
}

impl SessionActorHandle {
    fn spawn(
        buffer_size: usize,
        session: GameSession,
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn GameStore>,
        dispatcher: DispatcherHandle,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = SessionActor {
            receiver,
            session,
            transport,
            store,
            dispatcher,
        };
        tokio::spawn(run_session_actor(actor));
        Self { sender }
    }

    async fn forward(&self, msg: SessionMessage) -> Result<(), String> {
        self.sender
            .send(msg)
            .await
            .map_err(|e| format!("Failed to send to session actor: {e}"))
    }
}
