//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::game::{GameMatch, MatchHandle};
use crate::store::{
    AvatarResolver, Leaderboard, NoAvatars, RemoteTable, TemplateAvatarResolver,
};
use crate::util::rate_limit::ChatRateLimiter;

/// Remote table the leaderboard is mirrored into
const LEADERBOARD_TABLE: &str = "leaderboard";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_handle: MatchHandle,
    pub leaderboard: Leaderboard,
    pub chat_limiter: ChatRateLimiter,
}

impl AppState {
    /// Build the state together with the match loop it talks to.
    /// The caller is responsible for spawning `GameMatch::run`.
    pub fn new(config: Config) -> (Self, GameMatch) {
        let config = Arc::new(config);

        let leaderboard = match (&config.leaderboard_url, &config.leaderboard_key) {
            (Some(url), Some(key)) => {
                info!(url = %url, "Mirroring leaderboard to remote table");
                Leaderboard::with_remote(RemoteTable::new(url, key, LEADERBOARD_TABLE))
            }
            _ => Leaderboard::new(),
        };

        let avatars: Arc<dyn AvatarResolver> = match &config.avatar_url_template {
            Some(template) => Arc::new(TemplateAvatarResolver::new(template.clone())),
            None => Arc::new(NoAvatars),
        };

        let (game_match, match_handle) =
            GameMatch::new(config.game.clone(), Arc::new(leaderboard.clone()), avatars);

        let state = Self {
            config,
            match_handle,
            leaderboard,
            chat_limiter: ChatRateLimiter::default(),
        };

        (state, game_match)
    }
}
