//! Persistent tally of round winners

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::remote::RemoteTable;

/// Result of one won round, as handed to the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinRecord {
    pub username: String,
    pub avatar: Option<String>,
    pub kills: u32,
    pub points: u32,
}

/// Accumulated standing of one viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub avatar: Option<String>,
    pub wins: u32,
    pub points: u32,
    pub kills: u32,
    pub last_win_at: DateTime<Utc>,
}

/// Anything that wants to hear about winners
pub trait LeaderboardSink: Send + Sync {
    fn record_win(&self, record: &WinRecord);
}

/// In-memory leaderboard, optionally mirrored to a remote table
#[derive(Clone, Default)]
pub struct Leaderboard {
    entries: Arc<DashMap<String, LeaderboardEntry>>,
    remote: Option<RemoteTable>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote(remote: RemoteTable) -> Self {
        Self {
            entries: Arc::default(),
            remote: Some(remote),
        }
    }

    /// Highest points first, ties broken by wins then name
    pub fn top(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then(b.wins.cmp(&a.wins))
                .then_with(|| a.username.cmp(&b.username))
        });
        entries.truncate(limit);
        entries
    }

    pub fn get(&self, username: &str) -> Option<LeaderboardEntry> {
        self.entries.get(username).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn mirror(&self, entry: LeaderboardEntry) {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        // Outside a runtime (unit tests, shutdown) the mirror is skipped
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(username = %entry.username, "No runtime, skipping leaderboard mirror");
            return;
        };
        handle.spawn(async move {
            if let Err(e) = remote.upsert(&entry, "username").await {
                warn!(username = %entry.username, error = %e, "Failed to mirror leaderboard entry");
            }
        });
    }
}

impl LeaderboardSink for Leaderboard {
    fn record_win(&self, record: &WinRecord) {
        let entry = {
            let mut entry = self
                .entries
                .entry(record.username.clone())
                .or_insert_with(|| LeaderboardEntry {
                    username: record.username.clone(),
                    avatar: None,
                    wins: 0,
                    points: 0,
                    kills: 0,
                    last_win_at: Utc::now(),
                });
            entry.wins += 1;
            entry.points += record.points;
            entry.kills += record.kills;
            entry.last_win_at = Utc::now();
            if record.avatar.is_some() {
                entry.avatar = record.avatar.clone();
            }
            entry.value().clone()
        };

        self.mirror(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn win(username: &str, kills: u32, points: u32) -> WinRecord {
        WinRecord {
            username: username.into(),
            avatar: None,
            kills,
            points,
        }
    }

    #[test]
    fn wins_accumulate_per_viewer() {
        let board = Leaderboard::new();
        board.record_win(&win("layla", 3, 16));
        board.record_win(&win("layla", 1, 12));

        let entry = board.get("layla").expect("recorded");
        assert_eq!(entry.wins, 2);
        assert_eq!(entry.points, 28);
        assert_eq!(entry.kills, 4);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn top_orders_by_points_then_wins() {
        let board = Leaderboard::new();
        board.record_win(&win("a", 0, 10));
        board.record_win(&win("b", 5, 20));
        board.record_win(&win("c", 0, 10));
        board.record_win(&win("c", 0, 0));

        let names: Vec<String> = board.top(10).into_iter().map(|e| e.username).collect();
        assert_eq!(names, ["b", "c", "a"]);
        assert_eq!(board.top(1).len(), 1);
    }

    #[test]
    fn remote_mirror_is_skipped_without_runtime() {
        let board = Leaderboard::with_remote(RemoteTable::new("http://127.0.0.1:9", "k", "t"));
        board.record_win(&win("z", 0, 10));
        assert_eq!(board.get("z").map(|e| e.wins), Some(1));
    }
}
