//! Leaderboard persistence and avatar lookup

pub mod avatar;
pub mod leaderboard;
pub mod remote;

pub use avatar::{AvatarResolver, NoAvatars, TemplateAvatarResolver};
pub use leaderboard::{Leaderboard, LeaderboardEntry, LeaderboardSink, WinRecord};
pub use remote::RemoteTable;
