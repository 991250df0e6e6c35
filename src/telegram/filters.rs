//! Predicates deciding which passive (non-command) messages the bot reacts to.
//!
//! The route table is evaluated in order and the first match wins:
//!
//! 1. whole text is a supported platform URL -> [`MessageRoute::Track`]
//! 2. text contains a snap link -> [`MessageRoute::Snap`]
//! 3. text contains any other URL -> ignored
//! 4. private chat -> [`MessageRoute::Track`] (free-text search)
//!
//! Commands, forwards and messages sent via a bot never trigger a passive route.

use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::types::{Message, UserId};

use crate::provider::classify::ANY_URL_RE;
use crate::provider::is_supported_url;

static SNAP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)https?://(?:www\.)?(?:instagram\.com|instagr\.am)/(?:reel|stories|p|tv)/[^\s/?]+",
        r"(?i)https?://(?:[a-z]+\.)?(?:pinterest\.com|pin\.it)/\S+",
        r"(?i)https?://(?:www\.)?fb\.watch/[^\s/?]+",
        r"(?i)https?://(?:www\.)?facebook\.com/\S+/videos/\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("snap regex"))
    .collect()
});

/// What a passive message should trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRoute {
    /// Platform URL or free-text search
    Track,
    /// Social media post extraction
    Snap,
}

/// Message properties the route table looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageTraits {
    pub is_command: bool,
    pub is_forward: bool,
    pub via_bot: bool,
    pub is_private: bool,
}

impl MessageTraits {
    pub fn of(msg: &Message) -> Self {
        let text = msg.text().unwrap_or_default();
        Self {
            is_command: is_command_text(text),
            is_forward: msg.forward_origin().is_some(),
            via_bot: msg.via_bot.is_some(),
            is_private: msg.chat.is_private(),
        }
    }
}

/// `/cmd` or `!cmd`, optionally addressed as `/cmd@bot`.
pub fn is_command_text(text: &str) -> bool {
    let text = text.trim_start();
    let mut chars = text.chars();
    matches!(chars.next(), Some('/') | Some('!')) && chars.next().is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Returns true if `text` contains a supported social media link.
pub fn contains_snap_link(text: &str) -> bool {
    SNAP_PATTERNS.iter().any(|re| re.is_match(text))
}

/// First snap link inside `text`.
pub fn find_snap_link(text: &str) -> Option<&str> {
    SNAP_PATTERNS.iter().find_map(|re| re.find(text)).map(|m| m.as_str())
}

/// Routes a passive message. `None` means the bot stays silent.
pub fn message_route(text: &str, traits: MessageTraits) -> Option<MessageRoute> {
    let text = text.trim();
    if text.is_empty() || traits.is_command || traits.is_forward || traits.via_bot {
        return None;
    }
    if is_supported_url(text) {
        return Some(MessageRoute::Track);
    }
    if contains_snap_link(text) {
        return Some(MessageRoute::Snap);
    }
    if ANY_URL_RE.is_match(text) {
        return None;
    }
    traits.is_private.then_some(MessageRoute::Track)
}

/// Owner check for privileged commands.
pub fn is_owner(msg: &Message, owner_id: u64) -> bool {
    msg.from.as_ref().is_some_and(|u| u.id == UserId(owner_id))
}
