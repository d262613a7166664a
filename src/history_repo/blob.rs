// Log blob codec: a JSON array of {timestamp, values} objects.
// Decoding never fails: an unparseable blob reads as an empty log, a malformed entry is skipped.

use crate::models::Snapshot;

pub(super) struct DecodedLog {
    pub(super) entries: Vec<Snapshot>,
    /// The blob was not a JSON array; `entries` is empty.
    pub(super) corrupt: bool,
}

pub(super) fn encode_log(log: &[Snapshot]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(log)
}

pub(super) fn decode_log(bytes: &[u8]) -> DecodedLog {
    let raw: Vec<serde_json::Value> = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            // reported at warn by the caller through the corrupt flag
            tracing::debug!(error = %e, bytes = bytes.len(), "log blob unparseable, treating as empty");
            return DecodedLog {
                entries: Vec::new(),
                corrupt: true,
            };
        }
    };

    let mut entries = Vec::with_capacity(raw.len());
    let mut skipped = 0;
    for value in raw {
        match serde_json::from_value::<Snapshot>(value) {
            Ok(s) => entries.push(s),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed log entry");
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, kept = entries.len(), "log blob had malformed entries");
    }
    DecodedLog {
        entries,
        corrupt: false,
    }
}
