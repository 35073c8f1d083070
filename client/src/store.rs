//! Client-side room and ticket state.
//!
//! The store is updated from three directions: push events, REST fetches and
//! the user's own commands. Entity updates are merges keyed by id that never
//! move an entity back to an older snapshot, so the order in which those
//! sources land does not matter. Commands apply an optimistic change first
//! and revert it only if the request fails and nothing newer has replaced it.

use crate::api::{NewTicketRequest, SupportApi};
use crate::dispatcher::{Dispatcher, Subscription};
use chrono::{DateTime, Utc};
use events::schema::{
    ChatMessageView, CustomerProfile, MessageSource, OrderStatus, RoomStatus, RoomView,
    SenderType, TicketMessageView, TicketStatus, TicketView,
};
use events::{Category, Id, Incoming, PushEvent, RoomTransition, TicketTransition};
use futures_util::future::join_all;
use log::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;

/// Outcome of a user command, for the caller to present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub success: bool,
    pub message: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Outcome of sending a message. A failed send hands the text back so the
/// user can retry without retyping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub result: ActionResult,
    pub unsent_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderNotification {
    pub order_id: Id,
    pub status: OrderStatus,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SupportState {
    pub rooms: HashMap<Id, RoomView>,
    pub tickets: HashMap<Id, TicketView>,
    pub selected_room: Option<Id>,
    /// Merged AI and live transcript of the selected room.
    pub timeline: Vec<ChatMessageView>,
    pub selected_ticket: Option<Id>,
    pub ticket_messages: Vec<TicketMessageView>,
    pub order_notifications: Vec<OrderNotification>,
    pub notices: Vec<String>,
    /// Set when the server ended this user's session.
    pub session_revoked: Option<String>,
    pub customers: HashMap<Id, CustomerProfile>,
}

/// Stores `room` unless a newer snapshot of it is already held.
pub fn upsert_room(rooms: &mut HashMap<Id, RoomView>, room: RoomView) -> bool {
    match rooms.get(&room.id) {
        Some(current) if current.modified_at > room.modified_at => false,
        _ => {
            rooms.insert(room.id, room);
            true
        }
    }
}

/// Stores `ticket` unless a newer snapshot of it is already held.
pub fn upsert_ticket(tickets: &mut HashMap<Id, TicketView>, ticket: TicketView) -> bool {
    match tickets.get(&ticket.id) {
        Some(current) if current.modified_at > ticket.modified_at => false,
        _ => {
            tickets.insert(ticket.id, ticket);
            true
        }
    }
}

/// Inserts a message into a sorted timeline, once.
fn insert_chat_message(timeline: &mut Vec<ChatMessageView>, message: ChatMessageView) {
    if timeline.iter().any(|existing| existing.id == message.id) {
        return;
    }
    let position = timeline.partition_point(|existing| {
        (existing.created_at, existing.source) <= (message.created_at, message.source)
    });
    timeline.insert(position, message);
}

fn insert_ticket_message(messages: &mut Vec<TicketMessageView>, message: TicketMessageView) {
    if messages.iter().any(|existing| existing.id == message.id) {
        return;
    }
    let position = messages.partition_point(|existing| existing.created_at <= message.created_at);
    messages.insert(position, message);
}

/// Applies one push event to the state.
pub fn reduce(state: &mut SupportState, event: &PushEvent) {
    match event {
        PushEvent::NewMessage { room, message } => {
            upsert_room(&mut state.rooms, room.clone());
            if state.selected_room == Some(message.room_id) {
                insert_chat_message(&mut state.timeline, message.clone());
            }
        }
        PushEvent::AgentJoined { room, .. }
        | PushEvent::AgentConcluded { room, .. }
        | PushEvent::ChatClosed { room }
        | PushEvent::NewChatRoom { room }
        | PushEvent::CustomerDisconnected { room, .. }
        | PushEvent::RoomReactivated { room }
        | PushEvent::RoomReturnedToWaiting { room, .. } => {
            upsert_room(&mut state.rooms, room.clone());
        }

        PushEvent::Processing { order_id, .. }
        | PushEvent::Shipped { order_id, .. }
        | PushEvent::Delivered { order_id, .. }
        | PushEvent::Cancelled { order_id, .. } => {
            let status = match event {
                PushEvent::Processing { .. } => OrderStatus::Processing,
                PushEvent::Shipped { .. } => OrderStatus::Shipped,
                PushEvent::Delivered { .. } => OrderStatus::Delivered,
                _ => OrderStatus::Cancelled,
            };
            state.order_notifications.push(OrderNotification {
                order_id: *order_id,
                status,
                received_at: Utc::now(),
            });
        }

        PushEvent::SupportTicketMessage { ticket, message } => {
            upsert_ticket(&mut state.tickets, ticket.clone());
            if state.selected_ticket == Some(message.ticket_id) {
                insert_ticket_message(&mut state.ticket_messages, message.clone());
            }
        }
        PushEvent::NewSupportTicket { ticket }
        | PushEvent::TicketAgentAssigned { ticket, .. }
        | PushEvent::TicketStatusUpdated { ticket, .. } => {
            upsert_ticket(&mut state.tickets, ticket.clone());
        }

        PushEvent::ForceLogout { reason, .. } => {
            state.session_revoked = Some(reason.clone());
        }
        PushEvent::SystemNotice { message, .. } => {
            state.notices.push(message.clone());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomPartitions {
    /// Active rooms assigned to the current user.
    pub active: Vec<RoomView>,
    pub waiting: Vec<RoomView>,
    /// Concluded rooms that are unassigned or were the current user's.
    pub concluded: Vec<RoomView>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketPartitions {
    pub unassigned: Vec<TicketView>,
    /// Unresolved tickets assigned to the current user.
    pub mine: Vec<TicketView>,
    pub resolved: Vec<TicketView>,
}

fn mine_or_unassigned(agent_id: Option<Id>, me: Id) -> bool {
    agent_id.is_none() || agent_id == Some(me)
}

pub fn partition_rooms<'a>(rooms: impl IntoIterator<Item = &'a RoomView>, me: Id) -> RoomPartitions {
    let mut partitions = RoomPartitions::default();
    for room in rooms {
        let bucket = match room.status {
            RoomStatus::Active if room.agent_id == Some(me) => &mut partitions.active,
            RoomStatus::Waiting => &mut partitions.waiting,
            RoomStatus::Concluded if mine_or_unassigned(room.agent_id, me) => {
                &mut partitions.concluded
            }
            _ => continue,
        };
        bucket.push(room.clone());
    }
    for bucket in [
        &mut partitions.active,
        &mut partitions.waiting,
        &mut partitions.concluded,
    ] {
        bucket.sort_by(|a, b| b.modified_at.cmp(&a.modified_at).then(a.id.cmp(&b.id)));
    }
    partitions
}

pub fn partition_tickets<'a>(
    tickets: impl IntoIterator<Item = &'a TicketView>,
    me: Id,
) -> TicketPartitions {
    let mut partitions = TicketPartitions::default();
    for ticket in tickets {
        let bucket = match ticket.status {
            TicketStatus::Open => &mut partitions.unassigned,
            TicketStatus::InProgress | TicketStatus::WaitingCustomer
                if ticket.agent_id == Some(me) =>
            {
                &mut partitions.mine
            }
            TicketStatus::Resolved | TicketStatus::Closed
                if mine_or_unassigned(ticket.agent_id, me) =>
            {
                &mut partitions.resolved
            }
            _ => continue,
        };
        bucket.push(ticket.clone());
    }
    for bucket in [
        &mut partitions.unassigned,
        &mut partitions.mine,
        &mut partitions.resolved,
    ] {
        bucket.sort_by(|a, b| b.modified_at.cmp(&a.modified_at).then(a.id.cmp(&b.id)));
    }
    partitions
}

/// An optimistic change waiting for the server's answer.
struct Pending<T> {
    previous: T,
    optimistic: T,
}

/// The state container shared by the dispatcher listeners, the staleness
/// watch and the caller's commands. Locks are never held across an await.
pub struct SupportStore {
    me: Id,
    api: Arc<dyn SupportApi>,
    state: Mutex<SupportState>,
    last_update: Mutex<Instant>,
}

impl SupportStore {
    pub fn new(me: Id, api: Arc<dyn SupportApi>) -> Self {
        Self {
            me,
            api,
            state: Mutex::new(SupportState::default()),
            last_update: Mutex::new(Instant::now()),
        }
    }

    pub fn me(&self) -> Id {
        self.me
    }

    fn state(&self) -> MutexGuard<'_, SupportState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> SupportState {
        self.state().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&SupportState) -> R) -> R {
        f(&self.state())
    }

    pub fn last_update(&self) -> Instant {
        *self
            .last_update
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn touch(&self) {
        *self
            .last_update
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }

    /// Applies a decoded push frame.
    pub fn apply(&self, incoming: &Incoming) {
        match incoming {
            Incoming::Event(event) => {
                reduce(&mut self.state(), event);
                self.touch();
            }
            Incoming::Unrecognized { event_type, .. } => {
                debug!("Store ignores unrecognized event {event_type}");
            }
            Incoming::Handshake => {}
        }
    }

    /// Subscribes the store to every category. The store is held weakly, so
    /// the subscriptions do not keep it alive.
    pub fn attach(self: &Arc<Self>, dispatcher: &Dispatcher) -> Vec<Subscription> {
        Category::ALL
            .into_iter()
            .map(|category| {
                let store = Arc::downgrade(self);
                dispatcher.subscribe(category, move |incoming| {
                    if let Some(store) = store.upgrade() {
                        store.apply(incoming);
                    }
                })
            })
            .collect()
    }

    /// Re-fetches the room and ticket lists.
    pub async fn refresh(&self) -> anyhow::Result<()> {
        let (rooms, tickets) =
            tokio::try_join!(self.api.rooms(self.me), self.api.tickets(self.me))?;

        {
            let mut state = self.state();
            let mut fresh_rooms = HashMap::with_capacity(rooms.len());
            for room in rooms {
                let room = match state.rooms.get(&room.id) {
                    Some(held) if held.modified_at > room.modified_at => held.clone(),
                    _ => room,
                };
                fresh_rooms.insert(room.id, room);
            }
            state.rooms = fresh_rooms;

            let mut fresh_tickets = HashMap::with_capacity(tickets.len());
            for ticket in tickets {
                let ticket = match state.tickets.get(&ticket.id) {
                    Some(held) if held.modified_at > ticket.modified_at => held.clone(),
                    _ => ticket,
                };
                fresh_tickets.insert(ticket.id, ticket);
            }
            state.tickets = fresh_tickets;
        }

        self.touch();
        self.load_customers().await;
        Ok(())
    }

    /// Fetches the profiles of customers referenced by held rooms and tickets
    /// that are not cached yet.
    async fn load_customers(&self) {
        let unseen: HashSet<Id> = {
            let state = self.state();
            state
                .rooms
                .values()
                .map(|room| room.customer_id)
                .chain(state.tickets.values().map(|ticket| ticket.customer_id))
                .filter(|id| !state.customers.contains_key(id))
                .collect()
        };

        join_all(unseen.into_iter().map(|id| self.customer(id))).await;
    }

    /// A display name for a user, from the customer cache only.
    pub fn customer_label(&self, user_id: Id) -> String {
        match self.state().customers.get(&user_id) {
            Some(profile) => profile
                .display_name
                .clone()
                .unwrap_or_else(|| profile.email.clone()),
            None => user_id.to_string(),
        }
    }

    pub fn room_partitions(&self) -> RoomPartitions {
        partition_rooms(self.state().rooms.values(), self.me)
    }

    pub fn ticket_partitions(&self) -> TicketPartitions {
        partition_tickets(self.state().tickets.values(), self.me)
    }

    /// Selects a room and loads its merged timeline.
    pub async fn select_room(&self, room_id: Id) -> ActionResult {
        {
            let mut state = self.state();
            state.selected_room = Some(room_id);
            state.timeline.clear();
        }

        match self.api.unified_messages(room_id, self.me).await {
            Ok(messages) => {
                let mut state = self.state();
                // Another room may have been selected while the fetch ran.
                if state.selected_room == Some(room_id) {
                    let arrived = std::mem::take(&mut state.timeline);
                    state.timeline = messages;
                    for message in arrived {
                        insert_chat_message(&mut state.timeline, message);
                    }
                }
                drop(state);
                self.touch();
                ActionResult::ok()
            }
            Err(e) => ActionResult::failed(e.to_string()),
        }
    }

    pub async fn select_ticket(&self, ticket_id: Id) -> ActionResult {
        {
            let mut state = self.state();
            state.selected_ticket = Some(ticket_id);
            state.ticket_messages.clear();
        }

        match self.api.ticket_messages(ticket_id, self.me).await {
            Ok(messages) => {
                let mut state = self.state();
                if state.selected_ticket == Some(ticket_id) {
                    let arrived = std::mem::take(&mut state.ticket_messages);
                    state.ticket_messages = messages;
                    for message in arrived {
                        insert_ticket_message(&mut state.ticket_messages, message);
                    }
                }
                drop(state);
                self.touch();
                ActionResult::ok()
            }
            Err(e) => ActionResult::failed(e.to_string()),
        }
    }

    /// The profile of a user, fetched once and then served from the cache.
    pub async fn customer(&self, user_id: Id) -> Option<CustomerProfile> {
        let cached = self.state().customers.get(&user_id).cloned();
        if cached.is_some() {
            return cached;
        }

        match self.api.profile(user_id).await {
            Ok(profile) => {
                self.state().customers.insert(user_id, profile.clone());
                Some(profile)
            }
            Err(e) => {
                warn!("Failed to load profile of user {user_id}: {e}");
                None
            }
        }
    }

    pub async fn claim_room(&self, room_id: Id) -> ActionResult {
        let pending = match self.begin_room_change(room_id, RoomTransition::Claim) {
            Ok(pending) => pending,
            Err(rejected) => return rejected,
        };
        let outcome = self.api.claim_room(room_id, self.me).await;
        self.settle_room(pending, outcome)
    }

    pub async fn return_room_to_queue(&self, room_id: Id) -> ActionResult {
        let pending = match self.begin_room_change(room_id, RoomTransition::ReturnToQueue) {
            Ok(pending) => pending,
            Err(rejected) => return rejected,
        };
        let outcome = self.api.return_room(room_id, self.me).await;
        self.settle_room(pending, outcome)
    }

    pub async fn conclude_room(&self, room_id: Id) -> ActionResult {
        let pending = match self.begin_room_change(room_id, RoomTransition::Conclude) {
            Ok(pending) => pending,
            Err(rejected) => return rejected,
        };
        let outcome = self.api.conclude_room(room_id, self.me).await;
        self.settle_room(pending, outcome)
    }

    pub async fn claim_ticket(&self, ticket_id: Id) -> ActionResult {
        let pending = match self.begin_ticket_change(ticket_id, TicketTransition::Claim) {
            Ok(pending) => pending,
            Err(rejected) => return rejected,
        };
        let outcome = self.api.claim_ticket(ticket_id, self.me).await;
        self.settle_ticket(pending, outcome)
    }

    pub async fn update_ticket_status(&self, ticket_id: Id, target: TicketStatus) -> ActionResult {
        let Some(transition) = TicketTransition::toward(target) else {
            return ActionResult::failed(format!("tickets cannot be moved back to {target}"));
        };
        let pending = match self.begin_ticket_change(ticket_id, transition) {
            Ok(pending) => pending,
            Err(rejected) => return rejected,
        };
        let outcome = self
            .api
            .update_ticket_status(ticket_id, self.me, target)
            .await;
        self.settle_ticket(pending, outcome)
    }

    pub async fn create_ticket(&self, ticket: NewTicketRequest) -> ActionResult {
        match self.api.create_ticket(self.me, &ticket).await {
            Ok(ticket) => {
                upsert_ticket(&mut self.state().tickets, ticket);
                self.touch();
                ActionResult::ok()
            }
            Err(e) => ActionResult::failed(e.to_string()),
        }
    }

    /// Sends `text` to the room selected at the time of the call.
    pub async fn send_room_message(&self, text: String) -> SendResult {
        let (room_id, pending) = {
            let mut state = self.state();
            let Some(room) = state.selected_room.and_then(|id| state.rooms.get(&id)) else {
                return unsent("no chat room is selected", text);
            };
            let sender_type = if room.customer_id == self.me {
                SenderType::Customer
            } else {
                SenderType::Agent
            };
            let pending = ChatMessageView {
                id: Id::new_v4(),
                room_id: room.id,
                sender_type,
                sender_id: Some(self.me),
                message: text.clone(),
                created_at: Utc::now(),
                source: MessageSource::Live,
            };
            let room_id = room.id;
            state.timeline.push(pending.clone());
            (room_id, pending)
        };

        let outcome = self.api.send_room_message(room_id, self.me, &text).await;

        let mut state = self.state();
        state.timeline.retain(|message| message.id != pending.id);
        match outcome {
            Ok(message) => {
                if state.selected_room == Some(message.room_id) {
                    insert_chat_message(&mut state.timeline, message);
                }
                drop(state);
                self.touch();
                sent()
            }
            Err(e) => {
                warn!("Message to room {room_id} was not sent: {e}");
                unsent(e.to_string(), text)
            }
        }
    }

    /// Sends `text` to the ticket selected at the time of the call.
    pub async fn send_ticket_message(&self, text: String) -> SendResult {
        let (ticket_id, pending) = {
            let mut state = self.state();
            let Some(ticket) = state.selected_ticket.and_then(|id| state.tickets.get(&id)) else {
                return unsent("no ticket is selected", text);
            };
            let sender_type = if ticket.customer_id == self.me {
                SenderType::Customer
            } else {
                SenderType::Agent
            };
            let pending = TicketMessageView {
                id: Id::new_v4(),
                ticket_id: ticket.id,
                sender_type,
                sender_id: Some(self.me),
                message: text.clone(),
                created_at: Utc::now(),
            };
            let ticket_id = ticket.id;
            state.ticket_messages.push(pending.clone());
            (ticket_id, pending)
        };

        let outcome = self
            .api
            .send_ticket_message(ticket_id, self.me, &text)
            .await;

        let mut state = self.state();
        state.ticket_messages.retain(|message| message.id != pending.id);
        match outcome {
            Ok(message) => {
                if state.selected_ticket == Some(message.ticket_id) {
                    insert_ticket_message(&mut state.ticket_messages, message);
                }
                drop(state);
                self.touch();
                sent()
            }
            Err(e) => {
                warn!("Message to ticket {ticket_id} was not sent: {e}");
                unsent(e.to_string(), text)
            }
        }
    }

    fn begin_room_change(
        &self,
        room_id: Id,
        transition: RoomTransition,
    ) -> Result<Pending<RoomView>, ActionResult> {
        let mut state = self.state();
        let previous = state
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or_else(|| ActionResult::failed("chat room not found"))?;
        let status = previous
            .status
            .apply(transition)
            .map_err(|e| ActionResult::failed(e.to_string()))?;

        let optimistic = RoomView {
            status,
            agent_id: transition.assigns_agent().then_some(self.me),
            ..previous.clone()
        };
        state.rooms.insert(room_id, optimistic.clone());

        Ok(Pending {
            previous,
            optimistic,
        })
    }

    fn settle_room(
        &self,
        pending: Pending<RoomView>,
        outcome: anyhow::Result<RoomView>,
    ) -> ActionResult {
        match outcome {
            Ok(room) => {
                upsert_room(&mut self.state().rooms, room);
                self.touch();
                ActionResult::ok()
            }
            Err(e) => {
                let mut state = self.state();
                let id = pending.previous.id;
                if state.rooms.get(&id) == Some(&pending.optimistic) {
                    state.rooms.insert(id, pending.previous);
                }
                ActionResult::failed(e.to_string())
            }
        }
    }

    fn begin_ticket_change(
        &self,
        ticket_id: Id,
        transition: TicketTransition,
    ) -> Result<Pending<TicketView>, ActionResult> {
        let mut state = self.state();
        let previous = state
            .tickets
            .get(&ticket_id)
            .cloned()
            .ok_or_else(|| ActionResult::failed("ticket not found"))?;
        let status = previous
            .status
            .apply(transition)
            .map_err(|e| ActionResult::failed(e.to_string()))?;

        let optimistic = TicketView {
            status,
            agent_id: match transition {
                TicketTransition::Claim => Some(self.me),
                _ => previous.agent_id,
            },
            ..previous.clone()
        };
        state.tickets.insert(ticket_id, optimistic.clone());

        Ok(Pending {
            previous,
            optimistic,
        })
    }

    fn settle_ticket(
        &self,
        pending: Pending<TicketView>,
        outcome: anyhow::Result<TicketView>,
    ) -> ActionResult {
        match outcome {
            Ok(ticket) => {
                upsert_ticket(&mut self.state().tickets, ticket);
                self.touch();
                ActionResult::ok()
            }
            Err(e) => {
                let mut state = self.state();
                let id = pending.previous.id;
                if state.tickets.get(&id) == Some(&pending.optimistic) {
                    state.tickets.insert(id, pending.previous);
                }
                ActionResult::failed(e.to_string())
            }
        }
    }
}

fn sent() -> SendResult {
    SendResult {
        result: ActionResult::ok(),
        unsent_text: None,
    }
}

fn unsent(message: impl Into<String>, text: String) -> SendResult {
    SendResult {
        result: ActionResult::failed(message),
        unsent_text: Some(text),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::ApiError;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Duration;
    use events::schema::{Priority, TicketMessageView};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub(crate) fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    pub(crate) fn room(status: RoomStatus, agent_id: Option<Id>, seconds: i64) -> RoomView {
        RoomView {
            id: Id::new_v4(),
            customer_id: Id::new_v4(),
            agent_id,
            status,
            priority: Priority::Normal,
            created_at: base_time(),
            modified_at: base_time() + Duration::seconds(seconds),
            closed_at: None,
        }
    }

    fn ticket(status: TicketStatus, agent_id: Option<Id>) -> TicketView {
        TicketView {
            id: Id::new_v4(),
            customer_id: Id::new_v4(),
            agent_id,
            status,
            subject: "Where is my parcel?".to_string(),
            priority: Priority::Normal,
            category: "shipping".to_string(),
            created_at: base_time(),
            modified_at: base_time(),
            resolved_at: None,
        }
    }

    /// Serves canned lists and fails the commands it is told to fail.
    #[derive(Default)]
    pub(crate) struct FakeApi {
        pub rooms: Mutex<Vec<RoomView>>,
        pub tickets: Mutex<Vec<TicketView>>,
        pub fetches: AtomicUsize,
        pub profile_fetches: AtomicUsize,
        pub fail_lists: AtomicBool,
        pub fail_commands_with: Mutex<Option<ApiError>>,
    }

    impl FakeApi {
        fn failure(&self) -> Option<anyhow::Error> {
            self.fail_commands_with
                .lock()
                .unwrap()
                .clone()
                .map(anyhow::Error::from)
        }

        fn answer_room(&self, room_id: Id, f: impl FnOnce(&mut RoomView)) -> Result<RoomView> {
            if let Some(err) = self.failure() {
                return Err(err);
            }
            let mut room = self
                .rooms
                .lock()
                .unwrap()
                .iter()
                .find(|room| room.id == room_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("NOT FOUND"))?;
            f(&mut room);
            room.modified_at += Duration::seconds(1);
            Ok(room)
        }
    }

    #[async_trait]
    impl SupportApi for FakeApi {
        async fn rooms(&self, _user_id: Id) -> Result<Vec<RoomView>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_lists.load(Ordering::SeqCst) {
                anyhow::bail!("service unavailable");
            }
            Ok(self.rooms.lock().unwrap().clone())
        }

        async fn tickets(&self, _user_id: Id) -> Result<Vec<TicketView>> {
            Ok(self.tickets.lock().unwrap().clone())
        }

        async fn unified_messages(&self, _room_id: Id, _user_id: Id) -> Result<Vec<ChatMessageView>> {
            Ok(Vec::new())
        }

        async fn ticket_messages(
            &self,
            _ticket_id: Id,
            _user_id: Id,
        ) -> Result<Vec<TicketMessageView>> {
            Ok(Vec::new())
        }

        async fn profile(&self, user_id: Id) -> Result<CustomerProfile> {
            self.profile_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(CustomerProfile {
                id: user_id,
                email: "dave@example.com".to_string(),
                display_name: None,
                role: events::schema::Role::Customer,
            })
        }

        async fn claim_room(&self, room_id: Id, agent_id: Id) -> Result<RoomView> {
            self.answer_room(room_id, |room| {
                room.status = RoomStatus::Active;
                room.agent_id = Some(agent_id);
            })
        }

        async fn return_room(&self, room_id: Id, _agent_id: Id) -> Result<RoomView> {
            self.answer_room(room_id, |room| {
                room.status = RoomStatus::Waiting;
                room.agent_id = None;
            })
        }

        async fn conclude_room(&self, room_id: Id, _agent_id: Id) -> Result<RoomView> {
            self.answer_room(room_id, |room| {
                room.status = RoomStatus::Waiting;
                room.agent_id = None;
            })
        }

        async fn send_room_message(
            &self,
            room_id: Id,
            sender_id: Id,
            message: &str,
        ) -> Result<ChatMessageView> {
            if let Some(err) = self.failure() {
                return Err(err);
            }
            Ok(ChatMessageView {
                id: Id::new_v4(),
                room_id,
                sender_type: SenderType::Agent,
                sender_id: Some(sender_id),
                message: message.to_string(),
                created_at: Utc::now(),
                source: MessageSource::Live,
            })
        }

        async fn create_ticket(
            &self,
            customer_id: Id,
            request: &NewTicketRequest,
        ) -> Result<TicketView> {
            if let Some(err) = self.failure() {
                return Err(err);
            }
            Ok(TicketView {
                customer_id,
                subject: request.subject.clone(),
                ..ticket(TicketStatus::Open, None)
            })
        }

        async fn claim_ticket(&self, _ticket_id: Id, _agent_id: Id) -> Result<TicketView> {
            Err(self
                .failure()
                .unwrap_or_else(|| anyhow::anyhow!("not scripted")))
        }

        async fn update_ticket_status(
            &self,
            _ticket_id: Id,
            _agent_id: Id,
            _status: TicketStatus,
        ) -> Result<TicketView> {
            Err(self
                .failure()
                .unwrap_or_else(|| anyhow::anyhow!("not scripted")))
        }

        async fn send_ticket_message(
            &self,
            _ticket_id: Id,
            _sender_id: Id,
            _message: &str,
        ) -> Result<TicketMessageView> {
            Err(self
                .failure()
                .unwrap_or_else(|| anyhow::anyhow!("not scripted")))
        }
    }

    fn conflict() -> ApiError {
        ApiError {
            status: 409,
            message: "chat was already claimed by another agent".to_string(),
        }
    }

    fn store_with(me: Id, rooms: Vec<RoomView>) -> (SupportStore, Arc<FakeApi>) {
        let api = Arc::new(FakeApi::default());
        *api.rooms.lock().unwrap() = rooms.clone();
        let store = SupportStore::new(me, api.clone());
        {
            let mut state = store.state();
            for room in rooms {
                state.rooms.insert(room.id, room);
            }
        }
        (store, api)
    }

    #[test]
    fn older_snapshots_never_replace_newer_ones() {
        let mut rooms = HashMap::new();
        let newer = room(RoomStatus::Active, Some(Id::new_v4()), 10);
        let older = RoomView {
            status: RoomStatus::Waiting,
            agent_id: None,
            modified_at: base_time(),
            ..newer.clone()
        };

        assert!(upsert_room(&mut rooms, newer.clone()));
        assert!(!upsert_room(&mut rooms, older));
        assert!(upsert_room(&mut rooms, newer.clone()));
        assert_eq!(rooms[&newer.id], newer);
    }

    #[test]
    fn returned_to_waiting_event_clears_the_agent() {
        let agent = Id::new_v4();
        let active = room(RoomStatus::Active, Some(agent), 0);
        let mut state = SupportState::default();
        state.rooms.insert(active.id, active.clone());

        let waiting = RoomView {
            status: RoomStatus::Waiting,
            agent_id: None,
            modified_at: active.modified_at + Duration::seconds(5),
            ..active.clone()
        };
        reduce(
            &mut state,
            &PushEvent::RoomReturnedToWaiting {
                room: waiting,
                previous_agent_id: Some(agent),
            },
        );

        assert_eq!(state.rooms[&active.id].status, RoomStatus::Waiting);
        assert_eq!(state.rooms[&active.id].agent_id, None);
    }

    #[test]
    fn duplicate_message_events_appear_once_in_order() {
        let open = room(RoomStatus::Active, None, 0);
        let mut state = SupportState {
            selected_room: Some(open.id),
            ..SupportState::default()
        };
        let message = |seconds: i64, body: &str| ChatMessageView {
            id: Id::new_v4(),
            room_id: open.id,
            sender_type: SenderType::Customer,
            sender_id: Some(open.customer_id),
            message: body.to_string(),
            created_at: base_time() + Duration::seconds(seconds),
            source: MessageSource::Live,
        };
        let late = message(20, "second");
        let early = message(10, "first");

        for event in [&late, &early, &late] {
            reduce(
                &mut state,
                &PushEvent::NewMessage {
                    room: open.clone(),
                    message: event.clone(),
                },
            );
        }

        let bodies: Vec<&str> = state.timeline.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);
    }

    #[test]
    fn messages_for_unselected_rooms_only_update_the_room() {
        let open = room(RoomStatus::Active, None, 0);
        let mut state = SupportState::default();

        reduce(
            &mut state,
            &PushEvent::NewMessage {
                room: open.clone(),
                message: ChatMessageView {
                    id: Id::new_v4(),
                    room_id: open.id,
                    sender_type: SenderType::Customer,
                    sender_id: None,
                    message: "hi".to_string(),
                    created_at: base_time(),
                    source: MessageSource::Live,
                },
            },
        );

        assert!(state.timeline.is_empty());
        assert!(state.rooms.contains_key(&open.id));
    }

    #[test]
    fn room_partitions_are_disjoint_and_scoped_to_me() {
        let me = Id::new_v4();
        let other = Id::new_v4();
        let rooms = vec![
            room(RoomStatus::Active, Some(me), 0),
            room(RoomStatus::Active, Some(other), 0),
            room(RoomStatus::Waiting, None, 0),
            room(RoomStatus::Concluded, None, 0),
            room(RoomStatus::Concluded, Some(other), 0),
        ];

        let partitions = partition_rooms(&rooms, me);

        assert_eq!(partitions.active.len(), 1);
        assert_eq!(partitions.waiting.len(), 1);
        assert_eq!(partitions.concluded.len(), 1);
        let mut seen: Vec<Id> = partitions
            .active
            .iter()
            .chain(&partitions.waiting)
            .chain(&partitions.concluded)
            .map(|room| room.id)
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 3);
        assert!(!partitions
            .active
            .iter()
            .any(|room| room.agent_id == Some(other)));
    }

    #[test]
    fn ticket_partitions_follow_status_and_assignment() {
        let me = Id::new_v4();
        let other = Id::new_v4();
        let tickets = vec![
            ticket(TicketStatus::Open, None),
            ticket(TicketStatus::InProgress, Some(me)),
            ticket(TicketStatus::WaitingCustomer, Some(me)),
            ticket(TicketStatus::InProgress, Some(other)),
            ticket(TicketStatus::Resolved, Some(me)),
            ticket(TicketStatus::Closed, Some(other)),
        ];

        let partitions = partition_tickets(&tickets, me);

        assert_eq!(partitions.unassigned.len(), 1);
        assert_eq!(partitions.mine.len(), 2);
        assert_eq!(partitions.resolved.len(), 1);
    }

    #[tokio::test]
    async fn successful_claim_keeps_the_room_active_for_me() {
        let me = Id::new_v4();
        let waiting = room(RoomStatus::Waiting, None, 0);
        let (store, _api) = store_with(me, vec![waiting.clone()]);

        let result = store.claim_room(waiting.id).await;

        assert_eq!(result, ActionResult::ok());
        let partitions = store.room_partitions();
        assert_eq!(partitions.active.len(), 1);
        assert_eq!(partitions.active[0].agent_id, Some(me));
    }

    #[tokio::test]
    async fn lost_claim_reverts_and_reports_the_conflict() {
        let me = Id::new_v4();
        let waiting = room(RoomStatus::Waiting, None, 0);
        let (store, api) = store_with(me, vec![waiting.clone()]);
        *api.fail_commands_with.lock().unwrap() = Some(conflict());

        let result = store.claim_room(waiting.id).await;

        assert!(!result.success);
        assert_eq!(
            result.message.as_deref(),
            Some("chat was already claimed by another agent")
        );
        assert_eq!(store.snapshot().rooms[&waiting.id], waiting);
        assert!(store.room_partitions().active.is_empty());
    }

    #[test]
    fn revert_keeps_an_authoritative_update_that_landed_meanwhile() {
        let me = Id::new_v4();
        let winner = Id::new_v4();
        let waiting = room(RoomStatus::Waiting, None, 0);
        let (store, _api) = store_with(me, vec![waiting.clone()]);

        let pending = store
            .begin_room_change(waiting.id, RoomTransition::Claim)
            .ok()
            .unwrap();
        let claimed_by_winner = RoomView {
            status: RoomStatus::Active,
            agent_id: Some(winner),
            modified_at: waiting.modified_at + Duration::seconds(1),
            ..waiting.clone()
        };
        store.apply(&Incoming::Event(PushEvent::AgentJoined {
            room: claimed_by_winner.clone(),
            agent_id: winner,
        }));
        let result = store.settle_room(pending, Err(conflict().into()));

        assert!(!result.success);
        assert_eq!(store.snapshot().rooms[&waiting.id], claimed_by_winner);
    }

    #[tokio::test]
    async fn local_state_rejects_impossible_transitions_without_a_request() {
        let me = Id::new_v4();
        let concluded = room(RoomStatus::Concluded, None, 0);
        let (store, api) = store_with(me, vec![concluded.clone()]);
        *api.fail_commands_with.lock().unwrap() = Some(conflict());

        let result = store.claim_room(concluded.id).await;

        assert_eq!(
            result,
            ActionResult::failed("cannot claim from status concluded")
        );
    }

    #[tokio::test]
    async fn failed_send_removes_the_pending_message_and_returns_the_text() {
        let me = Id::new_v4();
        let active = room(RoomStatus::Active, Some(me), 0);
        let (store, api) = store_with(me, vec![active.clone()]);
        store.select_room(active.id).await;
        *api.fail_commands_with.lock().unwrap() = Some(ApiError {
            status: 500,
            message: "INTERNAL SERVER ERROR".to_string(),
        });

        let outcome = store.send_room_message("Let me check".to_string()).await;

        assert!(!outcome.result.success);
        assert_eq!(outcome.unsent_text.as_deref(), Some("Let me check"));
        assert!(store.snapshot().timeline.is_empty());
    }

    #[tokio::test]
    async fn sent_message_replaces_the_pending_one() {
        let me = Id::new_v4();
        let active = room(RoomStatus::Active, Some(me), 0);
        let (store, _api) = store_with(me, vec![active.clone()]);
        store.select_room(active.id).await;

        let outcome = store.send_room_message("On it".to_string()).await;

        assert!(outcome.result.success);
        let timeline = store.snapshot().timeline;
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].message, "On it");
    }

    #[tokio::test]
    async fn sending_without_a_selection_hands_the_text_back() {
        let (store, _api) = store_with(Id::new_v4(), Vec::new());

        let outcome = store.send_room_message("hello?".to_string()).await;

        assert_eq!(outcome.unsent_text.as_deref(), Some("hello?"));
    }

    #[tokio::test]
    async fn rejected_ticket_creation_reports_the_policy_message() {
        let (store, api) = store_with(Id::new_v4(), Vec::new());
        *api.fail_commands_with.lock().unwrap() = Some(ApiError {
            status: 400,
            message: "a customer may hold at most 5 open tickets".to_string(),
        });

        let result = store
            .create_ticket(NewTicketRequest {
                subject: "Sixth".to_string(),
                category: "general".to_string(),
                priority: Priority::Normal,
                message: "one more".to_string(),
            })
            .await;

        assert!(!result.success);
        assert!(store.snapshot().tickets.is_empty());
    }

    #[tokio::test]
    async fn refresh_replaces_lists_but_keeps_newer_local_snapshots() {
        let me = Id::new_v4();
        let kept = room(RoomStatus::Active, Some(me), 30);
        let gone = room(RoomStatus::Waiting, None, 0);
        let (store, api) = store_with(me, vec![kept.clone(), gone.clone()]);
        *api.rooms.lock().unwrap() = vec![RoomView {
            status: RoomStatus::Waiting,
            agent_id: None,
            modified_at: base_time(),
            ..kept.clone()
        }];

        store.refresh().await.unwrap();

        let rooms = store.snapshot().rooms;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[&kept.id], kept);
    }

    #[tokio::test]
    async fn customer_profiles_are_fetched_once() {
        let (store, api) = store_with(Id::new_v4(), Vec::new());
        let customer = Id::new_v4();

        store.customer(customer).await.unwrap();
        store.customer(customer).await.unwrap();

        assert_eq!(api.profile_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_caches_profiles_of_listed_customers() {
        let me = Id::new_v4();
        let waiting = room(RoomStatus::Waiting, None, 0);
        let (store, api) = store_with(me, vec![waiting.clone()]);

        store.refresh().await.unwrap();
        store.refresh().await.unwrap();

        assert!(store.snapshot().customers.contains_key(&waiting.customer_id));
        assert_eq!(store.customer_label(waiting.customer_id), "dave@example.com");
        assert_eq!(api.profile_fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attached_store_receives_dispatched_events() {
        let dispatcher = Dispatcher::new();
        let api = Arc::new(FakeApi::default());
        let store = Arc::new(SupportStore::new(Id::new_v4(), api));
        let _subscriptions = store.attach(&dispatcher);

        dispatcher.dispatch(&Incoming::Event(PushEvent::SystemNotice {
            message: "Maintenance at 22:00".to_string(),
            role: None,
        }));
        dispatcher.dispatch(&Incoming::Event(PushEvent::Shipped {
            order_id: Id::new_v4(),
            customer_id: store.me(),
        }));

        let state = store.snapshot();
        assert_eq!(state.notices, vec!["Maintenance at 22:00"]);
        assert_eq!(state.order_notifications[0].status, OrderStatus::Shipped);
    }
}
