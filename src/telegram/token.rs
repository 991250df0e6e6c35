//! Callback token codec.
//!
//! A track button carries `spot_<body>_<uid>`:
//!
//! * `body` is a one-character tag naming a well-known URL prefix, followed by the
//!   unpadded URL-safe base64 of the rest of the reference. Unknown references use
//!   the [`RAW_TAG`] and encode the whole string.
//! * `uid` is the only user allowed to press the button, or `0` for anyone.
//!
//! The encoding is reversible; nothing is stored server-side, so buttons survive
//! restarts. `0` is never a real Telegram user id, which is what makes it usable as
//! the "unrestricted" sentinel.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

use crate::core::config::limits::MAX_CALLBACK_DATA_BYTES;

/// Prefix shared by every track callback payload.
pub const TOKEN_PREFIX: &str = "spot_";

/// Sentinel for "any user may press this button".
pub const UNRESTRICTED: u64 = 0;

/// Longest reference guaranteed to encode next to a 10-digit user id.
pub const MAX_REF_LEN: usize = 32;

const RAW_TAG: char = 'z';

const KNOWN_PREFIXES: &[(char, &str)] = &[
    ('s', "https://open.spotify.com/track/"),
    ('a', "https://open.spotify.com/album/"),
    ('p', "https://open.spotify.com/playlist/"),
    ('y', "https://www.youtube.com/watch?v="),
    ('u', "https://youtu.be/"),
    ('m', "https://music.youtube.com/watch?v="),
    ('c', "https://soundcloud.com/"),
    ('i', "https://music.apple.com/"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed callback token")]
    MalformedToken,
    #[error("callback token would be {0} bytes")]
    TooLong(usize),
}

/// Decoded button payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackToken {
    pub track_ref: String,
    /// `0` means unrestricted
    pub restrict_to: u64,
}

impl CallbackToken {
    pub fn new(track_ref: impl Into<String>, restrict_to: u64) -> Self {
        Self {
            track_ref: track_ref.into(),
            restrict_to,
        }
    }

    /// Returns true if `user_id` may act on this token.
    pub fn allows(&self, user_id: u64) -> bool {
        self.restrict_to == UNRESTRICTED || self.restrict_to == user_id
    }
}

/// Encodes a track reference and requester restriction into callback data.
pub fn encode(track_ref: &str, restrict_to: u64) -> Result<String, TokenError> {
    let body = match KNOWN_PREFIXES
        .iter()
        .find(|(_, prefix)| track_ref.starts_with(prefix) && track_ref.len() > prefix.len())
    {
        Some((tag, prefix)) => format!("{}{}", tag, URL_SAFE_NO_PAD.encode(&track_ref[prefix.len()..])),
        None => format!("{}{}", RAW_TAG, URL_SAFE_NO_PAD.encode(track_ref)),
    };

    let token = format!("{}{}_{}", TOKEN_PREFIX, body, restrict_to);
    if token.len() > MAX_CALLBACK_DATA_BYTES {
        return Err(TokenError::TooLong(token.len()));
    }
    Ok(token)
}

/// Decodes callback data produced by [`encode`].
///
/// Callback data comes back from the client and is untrusted; any deviation from
/// the expected shape yields [`TokenError::MalformedToken`].
pub fn decode(data: &str) -> Result<CallbackToken, TokenError> {
    let rest = data.strip_prefix(TOKEN_PREFIX).ok_or(TokenError::MalformedToken)?;
    // The body alphabet contains '_', the uid never does.
    let (body, uid) = rest.rsplit_once('_').ok_or(TokenError::MalformedToken)?;

    if uid.is_empty() || !uid.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TokenError::MalformedToken);
    }
    let restrict_to = uid.parse::<u64>().map_err(|_| TokenError::MalformedToken)?;

    let mut chars = body.chars();
    let tag = chars.next().ok_or(TokenError::MalformedToken)?;
    let encoded = chars.as_str();
    if encoded.is_empty() {
        return Err(TokenError::MalformedToken);
    }

    let bytes = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| TokenError::MalformedToken)?;
    let tail = String::from_utf8(bytes).map_err(|_| TokenError::MalformedToken)?;

    let track_ref = if tag == RAW_TAG {
        tail
    } else {
        let (_, prefix) = KNOWN_PREFIXES
            .iter()
            .find(|(t, _)| *t == tag)
            .ok_or(TokenError::MalformedToken)?;
        format!("{}{}", prefix, tail)
    };

    Ok(CallbackToken { track_ref, restrict_to })
}

/// Encodes the track URL, falling back to the shorter track id when the URL
/// does not fit into callback data.
pub fn encode_track(url: &str, id: &str, restrict_to: u64) -> Result<String, TokenError> {
    match encode(url, restrict_to) {
        Ok(token) => Ok(token),
        Err(TokenError::TooLong(len)) => {
            log::debug!("Track URL token too long ({} bytes), encoding id {}", len, id);
            encode(id, restrict_to)
        }
        Err(e) => Err(e),
    }
}
