//! Chat message parsing for lobby joins

use serde::{Deserialize, Serialize};

use crate::game::agent::Weapon;

/// A chat message delivered by the chat bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    pub username: String,
    #[serde(default)]
    pub message: String,
    /// Sticker/emote identifier attached to the message, if any
    #[serde(default)]
    pub sticker_id: Option<String>,
}

/// A parsed request to join the lobby
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub username: String,
    /// None = random weapon at battle start
    pub weapon: Option<Weapon>,
}

/// Turn a chat message into a join request if it carries the join keyword
/// or the join sticker. An unknown weapon word still joins, with a random weapon.
pub fn parse_join(event: &ChatEvent, keyword: &str, sticker: Option<&str>) -> Option<JoinRequest> {
    let username = event.username.trim();
    if username.is_empty() {
        return None;
    }

    let mut words = event.message.split_whitespace();
    let sticker_hit = matches!(
        (sticker, event.sticker_id.as_deref()),
        (Some(want), Some(got)) if want == got
    );

    let keyword_hit = words
        .next()
        .map(|first| first.trim_start_matches('!'))
        .is_some_and(|first| first.to_lowercase() == keyword.trim().to_lowercase());

    if !keyword_hit && !sticker_hit {
        return None;
    }

    // With a sticker the whole message may name the weapon
    let rest: Vec<&str> = if keyword_hit {
        words.collect()
    } else {
        event.message.split_whitespace().collect()
    };
    let weapon = rest.into_iter().find_map(Weapon::from_keyword);

    Some(JoinRequest {
        username: username.to_string(),
        weapon,
    })
}
