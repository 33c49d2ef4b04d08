//! Cross-mention detection against a roster snapshot.

use chrono::{DateTime, Utc};
use tracing::warn;

use kstats_types::models::{Digest, ReferenceRecord};

use crate::pseudonym;

/// Scan `text` for roster members, emitting one reference record per
/// member whose nickname occurs as a literal, case-sensitive,
/// unanchored substring.
///
/// A sender whose own nick appears in the text references themselves;
/// that is not excluded. Only matched members are hashed. A member
/// whose digest cannot be derived is logged and skipped.
pub fn detect(
    text: &str,
    roster: &[String],
    salt: &str,
    source: &Digest,
    channel: i64,
    time: DateTime<Utc>,
) -> Vec<ReferenceRecord> {
    let mut records = Vec::new();
    for member in roster {
        if !text.contains(member.as_str()) {
            continue;
        }
        match pseudonym::digest(salt, member) {
            Ok(target) => records.push(ReferenceRecord {
                time,
                channel,
                source: source.clone(),
                target,
            }),
            Err(error) => warn!(%error, member = %member, "skipping unresolvable mention"),
        }
    }
    records
}
