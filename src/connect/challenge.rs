//! Dynamic challenge/response recognition
//!
//! An authentication failure whose reason carries the `CRV1:` marker is not
//! a rejection: the server wants an interactive credential challenge. The
//! supervisor only needs the predicate; consumers of the resulting event can
//! use [`DynamicChallenge::parse`] to drive a prompt.

use data_encoding::BASE64;

const DYNAMIC_PREFIX: &str = "CRV1:";

/// Whether an auth-failure reason is a dynamic challenge request
pub fn is_dynamic(reason: &str) -> bool {
    reason.starts_with(DYNAMIC_PREFIX)
}

/// Parsed dynamic challenge payload
///
/// Wire form: `CRV1:<flags>:<state_id>:<base64 username>:<challenge text>`.
/// Flags are comma-separated; `E` requests echoed input, `R` means a
/// response is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicChallenge {
    pub flags: Vec<String>,
    pub state_id: String,
    pub username: String,
    pub challenge: String,
}

impl DynamicChallenge {
    /// Parse a challenge reason string; `None` if it is not a well-formed
    /// dynamic challenge.
    pub fn parse(reason: &str) -> Option<Self> {
        let rest = reason.strip_prefix(DYNAMIC_PREFIX)?;
        let mut parts = rest.splitn(3, ':');
        let flags = parts.next()?;
        let state_id = parts.next()?;
        let tail = parts.next()?;

        // Username is base64; the challenge text after it may itself
        // contain colons, so split the tail once only.
        let (username_b64, challenge) = tail.split_once(':')?;
        let username_bytes = BASE64.decode(username_b64.as_bytes()).ok()?;
        let username = String::from_utf8(username_bytes).ok()?;

        if state_id.is_empty() || challenge.is_empty() {
            return None;
        }

        Some(Self {
            flags: flags.split(',').map(str::to_string).collect(),
            state_id: state_id.to_string(),
            username,
            challenge: challenge.to_string(),
        })
    }

    /// Whether the response should be echoed while typed
    pub fn echo(&self) -> bool {
        self.flags.iter().any(|f| f == "E")
    }

    /// Whether a response is required
    pub fn response_required(&self) -> bool {
        self.flags.iter().any(|f| f == "R")
    }
}
