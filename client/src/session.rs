//! View actor: one task per open conversation view.
//!
//! DESIGN
//! ======
//! [`ViewSession::spawn`] starts a task that exclusively owns every piece of
//! per-view state: the live connection handle, the scroll emitter, the
//! viewport tracker, the presence aggregator and the reconnect policy. The
//! [`ViewHandle`] returned to UI code sends commands in over a channel and
//! reads state back out through `watch` channels, plus a `broadcast` of
//! presence changes for observers that want every update.
//!
//! TIMERS
//! ======
//! Every timer is a deadline stored in the owned state. The actor loop
//! sleeps until the earliest one, then polls each component. Superseding
//! events overwrite a deadline, teardown drops them all, and a torn-down
//! view has no task left to fire anything.
//!
//! STALE EVENTS
//! ============
//! Connection events carry the id of the connection that produced them.
//! Events from any connection other than the live one are ignored, so a
//! superseded or locally closed connection never touches view state.
//!
//! GENERATIONS
//! ===========
//! `select_message` and `switch_conversation` publish from the handle before
//! the actor sees the command. Each bumps a generation counter first; the
//! actor tags its publishes with the generation of the last command it
//! applied, and the check runs under the watch lock, so a publish computed
//! before the handle's reset can never land after it.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use frames::{ScrollMetrics, ScrollPosition};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::config::SyncConfig;
use crate::emitter::{ScrollEmitter, scroll_frame};
use crate::net::connection::{
    ConnectionEvent, ConnectionEventKind, ConnectionHandle, ConnectionManager, ConnectionState, ConversationId,
};
use crate::net::reconnect::ReconnectPolicy;
use crate::net::transport::Connector;
use crate::state::presence::{PresenceAggregator, PresenceEvent, PresenceUser};
use crate::state::resolver::Extent;
use crate::state::viewport::{ViewportInfo, ViewportTracker};
use crate::timer::wait_deadline;

const PRESENCE_EVENT_CAPACITY: usize = 256;

// =============================================================================
// SHARED READ MODELS
// =============================================================================

struct Shared {
    connection: watch::Sender<ConnectionState>,
    viewport: watch::Sender<ViewportInfo>,
    presence: watch::Sender<Vec<PresenceUser>>,
    local_position: watch::Sender<Option<ScrollPosition>>,
    events: broadcast::Sender<PresenceEvent>,
    viewport_generation: AtomicU64,
    presence_generation: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        let (events, _) = broadcast::channel(PRESENCE_EVENT_CAPACITY);
        Self {
            connection: watch::Sender::new(ConnectionState::Idle),
            viewport: watch::Sender::new(ViewportInfo::default()),
            presence: watch::Sender::new(Vec::new()),
            local_position: watch::Sender::new(None),
            events,
            viewport_generation: AtomicU64::new(0),
            presence_generation: AtomicU64::new(0),
        }
    }

    /// Supersede every viewport publish tagged with an older generation.
    fn bump_viewport(&self) -> u64 {
        self.viewport_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn bump_presence(&self) -> u64 {
        self.presence_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// No-op when `generation` is stale or `info` is unchanged.
    fn publish_viewport(&self, generation: u64, info: ViewportInfo) {
        self.viewport.send_if_modified(|current| {
            if self.viewport_generation.load(Ordering::SeqCst) != generation || *current == info {
                return false;
            }
            *current = info;
            true
        });
    }

    /// Publish the presence list and, when given, the matching event. Both
    /// are dropped when `generation` is stale.
    fn publish_presence(&self, generation: u64, users: Vec<PresenceUser>, event: Option<PresenceEvent>) {
        self.presence.send_if_modified(|current| {
            if self.presence_generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = users;
            if let Some(event) = event {
                let _ = self.events.send(event);
            }
            true
        });
    }

    fn publish_connection(&self, state: ConnectionState) {
        self.connection.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}

#[derive(Debug)]
enum Command {
    Scroll(ScrollMetrics),
    Select { index: usize, id: String, generation: u64 },
    RegisterMessage { id: String, extent: Option<Extent> },
    SetMessages(Vec<String>),
    ContainerUnmounted,
    RemoveParticipant(i64),
    SwitchConversation { conversation_id: ConversationId, viewport_generation: u64, presence_generation: u64 },
    Close,
}

// =============================================================================
// SPAWN
// =============================================================================

/// Entry point for creating conversation views.
pub struct ViewSession;

impl ViewSession {
    /// Start a view on `conversation_id` with the fixed reconnect delay from
    /// `config`. Without a conversation or token the view stays `Idle`.
    #[must_use]
    pub fn spawn(
        config: SyncConfig,
        connector: Arc<dyn Connector>,
        conversation_id: Option<ConversationId>,
        token: Option<String>,
    ) -> ViewHandle {
        let reconnect = ReconnectPolicy::fixed(config.reconnect_delay);
        Self::spawn_with(config, connector, conversation_id, token, reconnect)
    }

    /// Same as [`ViewSession::spawn`] with a caller-supplied reconnect policy.
    #[must_use]
    pub fn spawn_with(
        config: SyncConfig,
        connector: Arc<dyn Connector>,
        conversation_id: Option<ConversationId>,
        token: Option<String>,
        reconnect: ReconnectPolicy,
    ) -> ViewHandle {
        let shared = Arc::new(Shared::new());
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (manager, events) = ConnectionManager::new(connector, config.base_url.clone());

        let actor = ViewActor {
            emitter: ScrollEmitter::new(config.scroll_debounce),
            viewport: ViewportTracker::new(config.resolve_debounce, config.settle_delay, config.manual_grace),
            presence: PresenceAggregator::new(),
            reconnect,
            viewport_generation: 0,
            presence_generation: 0,
            conversation_id,
            token,
            manager,
            events,
            connection: None,
            commands: commands_rx,
            shared: shared.clone(),
        };
        let task = tokio::spawn(actor.run());

        ViewHandle { commands, shared, task }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// UI-facing handle to one conversation view. Dropping it tears the view down.
pub struct ViewHandle {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl ViewHandle {
    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("view: command after teardown ignored");
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.shared.connection.borrow() == ConnectionState::Open
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.shared.connection.borrow()
    }

    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.shared.connection.subscribe()
    }

    /// Report raw scroll metrics. The captured position is cached and
    /// returned immediately; the outbound frame is debounced.
    pub fn handle_scroll(&self, metrics: ScrollMetrics) -> Option<ScrollPosition> {
        let position = ScrollPosition::capture(metrics);
        if position.is_some() {
            self.shared.local_position.send_replace(position);
        }
        self.command(Command::Scroll(metrics));
        position
    }

    /// Freshest local position, including ones not sent yet.
    #[must_use]
    pub fn latest_position(&self) -> Option<ScrollPosition> {
        *self.shared.local_position.borrow()
    }

    /// Pin the viewport to a message. The returned info is already live.
    pub fn select_message(&self, index: usize, id: impl Into<String>) -> ViewportInfo {
        let id = id.into();
        let info = ViewportInfo::manual(index, id.clone());
        let generation = self.shared.bump_viewport();
        self.shared.publish_viewport(generation, info.clone());
        self.command(Command::Select { index, id, generation });
        info
    }

    /// Register a mounted message element, or unregister it with `None`.
    pub fn register_message(&self, id: impl Into<String>, extent: Option<Extent>) {
        self.command(Command::RegisterMessage { id: id.into(), extent });
    }

    /// Replace the ordered message list (index = position in `ids`).
    pub fn set_messages(&self, ids: Vec<String>) {
        self.command(Command::SetMessages(ids));
    }

    pub fn container_unmounted(&self) {
        self.command(Command::ContainerUnmounted);
    }

    /// Drop a participant on a membership-service leave notification.
    pub fn remove_participant(&self, user_id: i64) {
        self.command(Command::RemoveParticipant(user_id));
    }

    /// Move the view to another conversation. Presence, viewport and the
    /// local position are cleared before this returns.
    pub fn switch_conversation(&self, conversation_id: ConversationId) {
        let viewport_generation = self.shared.bump_viewport();
        let presence_generation = self.shared.bump_presence();
        self.shared.local_position.send_replace(None);
        self.shared.viewport.send_replace(ViewportInfo::default());
        self.shared.presence.send_replace(Vec::new());
        self.command(Command::SwitchConversation { conversation_id, viewport_generation, presence_generation });
    }

    #[must_use]
    pub fn viewport(&self) -> ViewportInfo {
        self.shared.viewport.borrow().clone()
    }

    #[must_use]
    pub fn watch_viewport(&self) -> watch::Receiver<ViewportInfo> {
        self.shared.viewport.subscribe()
    }

    /// Remote participants ordered by join time.
    #[must_use]
    pub fn present_users(&self) -> Vec<PresenceUser> {
        self.shared.presence.borrow().clone()
    }

    #[must_use]
    pub fn watch_presence(&self) -> watch::Receiver<Vec<PresenceUser>> {
        self.shared.presence.subscribe()
    }

    /// Every presence change, in delivery order.
    #[must_use]
    pub fn subscribe_presence(&self) -> broadcast::Receiver<PresenceEvent> {
        self.shared.events.subscribe()
    }

    /// Tear the view down: cancel every timer, close the connection and wait
    /// for the actor to finish.
    pub async fn close(self) {
        self.command(Command::Close);
        let _ = self.task.await;
    }
}

// =============================================================================
// ACTOR
// =============================================================================

struct ViewActor {
    conversation_id: Option<ConversationId>,
    token: Option<String>,
    manager: ConnectionManager,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    connection: Option<ConnectionHandle>,
    emitter: ScrollEmitter,
    viewport: ViewportTracker,
    presence: PresenceAggregator,
    reconnect: ReconnectPolicy,
    viewport_generation: u64,
    presence_generation: u64,
    commands: mpsc::UnboundedReceiver<Command>,
    shared: Arc<Shared>,
}

impl ViewActor {
    async fn run(mut self) {
        self.connect();

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Close) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.events.recv() => self.handle_event(event),
                () = wait_deadline(deadline) => self.on_deadline(Instant::now()),
            }
        }

        self.teardown();
    }

    fn connect(&mut self) {
        if let Some(old) = self.connection.take() {
            self.manager.close(old);
        }
        match self.manager.open(self.conversation_id, self.token.as_deref()) {
            Ok(handle) => {
                self.connection = Some(handle);
                self.shared.publish_connection(ConnectionState::Connecting);
            }
            Err(e) => {
                info!(conversation_id = ?self.conversation_id, error = %e, "view: not connecting");
                self.shared.publish_connection(ConnectionState::Idle);
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        [self.emitter.deadline(), self.viewport.deadline(), self.reconnect.deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    fn handle_command(&mut self, command: Command) {
        let now = Instant::now();
        match command {
            Command::Scroll(metrics) => {
                self.emitter.handle_scroll(metrics, now);
                self.viewport.on_scroll(metrics, now);
            }
            Command::Select { index, id, generation } => {
                self.viewport_generation = generation;
                let info = self.viewport.select(index, &id, now);
                self.shared.publish_viewport(generation, info);
                self.emitter.rearm(now);
            }
            Command::RegisterMessage { id, extent } => self.viewport.register_message(&id, extent),
            Command::SetMessages(ids) => self.viewport.on_messages_changed(&ids, now),
            Command::ContainerUnmounted => self.viewport.set_container(None),
            Command::RemoveParticipant(user_id) => {
                if self.presence.remove(user_id) {
                    self.shared.publish_presence(
                        self.presence_generation,
                        self.presence.list(),
                        Some(PresenceEvent::Left(user_id)),
                    );
                }
            }
            Command::SwitchConversation { conversation_id, viewport_generation, presence_generation } => {
                self.viewport_generation = viewport_generation;
                self.presence_generation = presence_generation;
                self.switch(conversation_id);
            }
            Command::Close => {}
        }
    }

    fn handle_event(&mut self, event: ConnectionEvent) {
        let live = self.connection.as_ref().map(ConnectionHandle::id);
        if live != Some(event.connection_id) {
            debug!(connection_id = event.connection_id, "view: ignoring stale connection event");
            return;
        }

        match event.kind {
            ConnectionEventKind::Opened => {
                self.reconnect.on_open();
                self.shared.publish_connection(ConnectionState::Open);
            }
            ConnectionEventKind::Frame(frame) => {
                let user = self.presence.apply(frame, frames::now_ms());
                trace!(conversation_id = ?self.conversation_id, user_id = user.user_id, "presence: updated");
                self.shared.publish_presence(
                    self.presence_generation,
                    self.presence.list(),
                    Some(PresenceEvent::Updated(user)),
                );
            }
            ConnectionEventKind::Closed(cause) => {
                self.connection = None;
                self.shared.publish_connection(ConnectionState::Closed);
                self.reconnect.on_unexpected_close(&cause, Instant::now());
            }
        }
    }

    fn on_deadline(&mut self, now: Instant) {
        if let Some(position) = self.emitter.poll(now) {
            self.send_position(position);
        }
        if let Some(info) = self.viewport.poll(now) {
            debug!(conversation_id = ?self.conversation_id, message_index = ?info.message_index, "viewport: changed");
            self.shared.publish_viewport(self.viewport_generation, info);
            self.emitter.rearm(now);
        }
        if self.reconnect.poll(now) {
            info!(conversation_id = ?self.conversation_id, attempt = self.reconnect.attempts(), "view: reconnecting");
            self.connect();
        }
    }

    fn send_position(&self, position: ScrollPosition) {
        let frame = scroll_frame(position, self.viewport.info());
        let sent = self.connection.as_ref().is_some_and(|c| c.send(&frame));
        if sent {
            debug!(
                conversation_id = ?self.conversation_id,
                frame_type = frame.frame_type(),
                scroll_percentage = position.scroll_percentage,
                "scroll: sent"
            );
        } else {
            trace!(conversation_id = ?self.conversation_id, "scroll: connection not open, kept locally");
        }
    }

    /// Reset every per-conversation model, then reconnect on the new id.
    fn switch(&mut self, conversation_id: ConversationId) {
        info!(from = ?self.conversation_id, to = conversation_id, "view: switching conversation");
        if let Some(old) = self.connection.take() {
            self.manager.close(old);
        }
        self.reconnect.reset();
        self.emitter.reset();
        self.viewport.reset();
        self.presence.clear();
        self.shared.publish_viewport(self.viewport_generation, ViewportInfo::default());
        self.shared.publish_presence(self.presence_generation, Vec::new(), None);

        self.conversation_id = Some(conversation_id);
        self.connect();
    }

    fn teardown(&mut self) {
        self.reconnect.cancel();
        self.emitter.cancel();
        if let Some(handle) = self.connection.take() {
            self.manager.close(handle);
        }
        self.shared.publish_connection(ConnectionState::Closed);
        info!(conversation_id = ?self.conversation_id, "view: torn down");
    }
}
