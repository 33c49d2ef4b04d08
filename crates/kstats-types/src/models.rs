use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A channel enrolled for analytics. The id is store-assigned; the name
/// is unique and case-sensitive; the salt scopes pseudonymization to
/// this channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub name: String,
    pub salt: String,
}

/// Pseudonymous identity token: lowercase hex over a salted digest.
/// The same nick yields unrelated digests under different channel salts,
/// so identities are not linkable across channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Digest {
    fn from(hex: String) -> Self {
        Self(hex)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shallow per-message features. These are heuristics over the raw text,
/// not sentiment analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFeatures {
    /// Token count from naive single-space splitting. Consecutive
    /// whitespace yields empty tokens that are still counted, and empty
    /// text counts as one token.
    pub words: usize,
    /// Byte length of the trimmed text.
    pub characters: usize,
    pub question: bool,
    pub exclamation: bool,
    pub caps: bool,
    /// Reserved for a detector that does not exist yet; always false.
    pub aggression: bool,
    pub emoji_happy: bool,
    pub emoji_sad: bool,
}

impl MessageFeatures {
    /// Names of the flags that are set, for log rendering.
    pub fn flag_names(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.question {
            flags.push("Question");
        }
        if self.exclamation {
            flags.push("Exclamation");
        }
        if self.caps {
            flags.push("Caps");
        }
        if self.aggression {
            flags.push("Aggression");
        }
        if self.emoji_happy {
            flags.push("EmojiHappy");
        }
        if self.emoji_sad {
            flags.push("EmojiSad");
        }
        flags
    }
}

/// One row per observed channel message. Written once, never mutated.
/// Message content itself is never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub time: DateTime<Utc>,
    pub channel: i64,
    pub sender: Digest,
    #[serde(flatten)]
    pub features: MessageFeatures,
}

impl fmt::Display for MessageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "message time={} channel={} sender={} words={} characters={} flags=[{}]",
            self.time.to_rfc3339(),
            self.channel,
            self.sender,
            self.features.words,
            self.features.characters,
            self.features.flag_names().join(","),
        )
    }
}

/// A detected textual mention of one roster member by another. Zero or
/// more per message, one per mentioned member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub time: DateTime<Utc>,
    pub channel: i64,
    pub source: Digest,
    pub target: Digest,
}

/// Opt-in marker, keyed by digest. Existence means opted in; removal is
/// the only history kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentEntry {
    pub digest: Digest,
    pub nick: String,
}
