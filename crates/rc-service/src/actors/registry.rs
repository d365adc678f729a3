//! Relay-side room state.
//!
//! `RoomRegistry` is owned by the relay actor and is the only record of who
//! is connected to which room. Participants are kept in identifier order so
//! peer lists come out the same way every time.

use super::connection::ConnectionHandle;
use super::messages::{ParticipantSummary, RoomSnapshot};

use chrono::{DateTime, Utc};
use common::signaling::PeerInfo;
use common::types::{is_automated, ParticipantKind, ParticipantRole};
use std::collections::{BTreeMap, HashMap};

/// Whether `local` should send the first offer toward `remote`.
///
/// Automated participants never initiate. A human always initiates toward an
/// automated peer. Between two humans the smaller identifier initiates.
#[must_use]
pub fn should_create_offer(
    local_id: &str,
    local_automated: bool,
    remote_id: &str,
    remote_automated: bool,
) -> bool {
    if local_automated {
        return false;
    }
    if remote_automated {
        return true;
    }
    local_id < remote_id
}

/// A joined participant.
#[derive(Debug, Clone)]
pub struct Participant {
    pub participant_id: String,
    pub display_name: String,
    pub role: ParticipantRole,
    pub kind: ParticipantKind,
    pub connection: ConnectionHandle,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    #[must_use]
    pub fn is_automated(&self) -> bool {
        is_automated(self.role, self.kind)
    }

    /// This participant as described to `viewer`.
    #[must_use]
    pub fn peer_info_for(&self, viewer: &Participant) -> PeerInfo {
        PeerInfo {
            participant_id: self.participant_id.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            kind: self.kind,
            should_create_offer: should_create_offer(
                &viewer.participant_id,
                viewer.is_automated(),
                &self.participant_id,
                self.is_automated(),
            ),
        }
    }

    fn summary(&self) -> ParticipantSummary {
        ParticipantSummary {
            participant_id: self.participant_id.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            kind: self.kind,
            joined_at: self.joined_at.timestamp(),
        }
    }
}

/// One room's membership.
#[derive(Debug)]
pub struct Room {
    room_id: String,
    participants: BTreeMap<String, Participant>,
    created_at: DateTime<Utc>,
}

impl Room {
    #[must_use]
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            participants: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    #[must_use]
    pub fn get(&self, participant_id: &str) -> Option<&Participant> {
        self.participants.get(participant_id)
    }

    #[must_use]
    pub fn contains(&self, participant_id: &str) -> bool {
        self.participants.contains_key(participant_id)
    }

    /// Every participant except `participant_id`.
    pub fn others<'a>(&'a self, participant_id: &'a str) -> impl Iterator<Item = &'a Participant> {
        self.participants
            .values()
            .filter(move |p| p.participant_id != participant_id)
    }

    /// Peer-discovery list for `joiner`: everyone else, flagged from the
    /// joiner's side.
    #[must_use]
    pub fn peers_for(&self, joiner: &Participant) -> Vec<PeerInfo> {
        self.others(&joiner.participant_id)
            .map(|existing| existing.peer_info_for(joiner))
            .collect()
    }

    /// Adds or overwrites a participant. Returns the replaced entry.
    pub fn insert(&mut self, participant: Participant) -> Option<Participant> {
        self.participants
            .insert(participant.participant_id.clone(), participant)
    }

    /// Removes `participant_id` only if its entry belongs to `connection_id`.
    ///
    /// A connection that was replaced by a re-join cannot evict its successor.
    pub fn remove_if_connection(
        &mut self,
        participant_id: &str,
        connection_id: &str,
    ) -> Option<Participant> {
        let current = self.participants.get(participant_id)?;
        if current.connection.connection_id() != connection_id {
            return None;
        }
        self.participants.remove(participant_id)
    }

    /// Removes every participant.
    pub fn drain(&mut self) -> impl Iterator<Item = Participant> + '_ {
        std::mem::take(&mut self.participants).into_values()
    }

    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            participants: self.participants.values().map(Participant::summary).collect(),
            created_at: self.created_at.timestamp(),
        }
    }
}

/// All rooms known to the relay, keyed by room id.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Returns the room, creating it on first reference.
    pub fn get_or_create(&mut self, room_id: &str) -> &mut Room {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(room_id))
    }

    /// Deletes the room if nobody is left in it. Returns true if deleted.
    pub fn remove_if_empty(&mut self, room_id: &str) -> bool {
        if self.rooms.get(room_id).is_some_and(Room::is_empty) {
            self.rooms.remove(room_id);
            return true;
        }
        false
    }

    pub fn rooms_mut(&mut self) -> impl Iterator<Item = &mut Room> {
        self.rooms.values_mut()
    }

    pub fn clear(&mut self) {
        self.rooms.clear();
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.rooms.values().map(Room::len).sum()
    }
}
