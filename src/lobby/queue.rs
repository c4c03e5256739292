//! Pending-join queue filled from chat while the lobby is open

use std::collections::VecDeque;

use crate::game::agent::Weapon;

use super::chat::JoinRequest;

/// Participant waiting for the battle to start
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJoin {
    pub username: String,
    pub weapon: Option<Weapon>,
    pub avatar: Option<String>,
}

impl From<JoinRequest> for PendingJoin {
    fn from(req: JoinRequest) -> Self {
        Self {
            username: req.username,
            weapon: req.weapon,
            avatar: None,
        }
    }
}

/// Why a join was not queued
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinRejected {
    #[error("{0} is already in the lobby")]
    AlreadyQueued(String),

    #[error("lobby is full ({0} participants)")]
    Full(usize),

    #[error("lobby is not open")]
    LobbyClosed,
}

/// The lobby queue
#[derive(Debug, Clone)]
pub struct JoinQueue {
    queue: VecDeque<PendingJoin>,
    /// Maximum participants per match
    capacity: usize,
}

impl JoinQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity,
        }
    }

    /// Add a participant; the first join of a username wins
    pub fn enqueue(&mut self, join: PendingJoin) -> Result<(), JoinRejected> {
        if self.contains(&join.username) {
            return Err(JoinRejected::AlreadyQueued(join.username));
        }
        if self.queue.len() >= self.capacity {
            return Err(JoinRejected::Full(self.capacity));
        }
        self.queue.push_back(join);
        Ok(())
    }

    /// Attach a resolved avatar to a waiting participant
    pub fn set_avatar(&mut self, username: &str, avatar: Option<String>) -> bool {
        match self.queue.iter_mut().find(|p| p.username == username) {
            Some(entry) => {
                entry.avatar = avatar;
                true
            }
            None => false,
        }
    }

    /// Check if a participant is queued
    pub fn contains(&self, username: &str) -> bool {
        self.queue.iter().any(|p| p.username == username)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingJoin> {
        self.queue.iter()
    }

    /// Take every queued participant in join order
    pub fn drain(&mut self) -> Vec<PendingJoin> {
        self.queue.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
