//! Line codecs for the event log and the block timeline.
//!
//! `events.log` carries one tab-separated event per line; `blockdata.dat`
//! starts with a `# got-soup blockdata` header followed by one
//! tab-separated block per line. Payloads and event-id lists are hex
//! encoded so tabs and newlines inside them can never break a line.
//! Legacy 9-field block lines (no psz timestamp) are still accepted on
//! read.

use soupnet_types::{EventEnvelope, EventKind};

/// One slot in the hash-linked block timeline.
#[derive(Clone, Debug, Default)]
pub struct BlockRecord {
    pub index: u64,
    pub opened_unix: i64,
    /// Slot was opened ahead of time and has no events yet.
    pub reserved: bool,
    pub confirmed: bool,
    /// Events landed after the slot was reserved.
    pub backfilled: bool,
    pub event_ids: Vec<String>,
    /// Genesis anchor text; only set on block 0.
    pub psz_timestamp: String,
    pub prev_hash: String,
    pub merkle_root: String,
    pub content_hash: String,
    pub block_hash: String,
}

// ---------------------------------------------------------------------------
// Shared parse helpers
// ---------------------------------------------------------------------------

pub(crate) fn parse_boolish(text: &str) -> bool {
    matches!(text, "1" | "true" | "TRUE" | "yes" | "YES")
}

pub(crate) fn join_event_ids(event_ids: &[String]) -> String {
    event_ids.join(",")
}

pub(crate) fn split_event_ids(text: &str) -> Vec<String> {
    text.split(',')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn hex_to_string(hex_text: &str) -> String {
    hex::decode(hex_text)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Event lines
// ---------------------------------------------------------------------------

/// `event_id \t kind \t author \t unix_ts \t hex(payload) \t signature`.
pub(crate) fn serialize_event_line(event: &EventEnvelope) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\n",
        event.event_id,
        event.kind.name(),
        event.author_cid,
        event.unix_ts,
        hex::encode(event.payload.as_bytes()),
        event.signature
    )
}

/// Parses one event line; `None` marks the line corrupt.
pub(crate) fn parse_event_line(line: &str) -> Option<EventEnvelope> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 6 {
        return None;
    }

    let kind = EventKind::from_name(fields[1])?;
    let unix_ts = fields[3].parse().ok()?;
    let payload = hex_to_string(fields[4]);

    let event = EventEnvelope {
        event_id: fields[0].to_string(),
        kind,
        author_cid: fields[2].to_string(),
        unix_ts,
        payload,
        signature: fields[5].to_string(),
    };
    if event.event_id.is_empty() || event.payload.is_empty() {
        return None;
    }
    Some(event)
}

// ---------------------------------------------------------------------------
// Block lines
// ---------------------------------------------------------------------------

/// Current 11-field block line.
pub(crate) fn serialize_block_line(block: &BlockRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
        block.index,
        block.opened_unix,
        u8::from(block.reserved),
        u8::from(block.confirmed),
        u8::from(block.backfilled),
        block.prev_hash,
        block.merkle_root,
        block.content_hash,
        block.block_hash,
        hex::encode(block.psz_timestamp.as_bytes()),
        hex::encode(join_event_ids(&block.event_ids).as_bytes())
    )
}

/// Parses one block line, current (11 fields) or legacy (9 fields).
pub(crate) fn parse_block_line(line: &str) -> Option<BlockRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 9 && fields.len() != 11 {
        return None;
    }

    let mut block = BlockRecord {
        index: fields[0].parse().ok()?,
        opened_unix: fields[1].parse().ok()?,
        reserved: parse_boolish(fields[2]),
        confirmed: parse_boolish(fields[3]),
        backfilled: parse_boolish(fields[4]),
        prev_hash: fields[5].to_string(),
        ..BlockRecord::default()
    };

    if fields.len() == 11 {
        block.merkle_root = fields[6].to_string();
        block.content_hash = fields[7].to_string();
        block.block_hash = fields[8].to_string();
        block.psz_timestamp = hex_to_string(fields[9]);
    } else {
        // Legacy lines carried no separate content hash or psz field.
        block.merkle_root = fields[6].to_string();
        block.content_hash = fields[6].to_string();
        block.block_hash = fields[7].to_string();
    }

    let encoded_event_ids = hex_to_string(fields[fields.len() - 1]);
    block.event_ids = split_event_ids(&encoded_event_ids);
    Some(block)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> EventEnvelope {
        EventEnvelope {
            event_id: "evt-abc".into(),
            kind: EventKind::ThreadCreated,
            author_cid: "cid-author".into(),
            unix_ts: 1_700_000_123,
            payload: "thread_id=thr-1\ntitle=With\ttab and\nnewline\n".into(),
            signature: "sig-hex".into(),
        }
    }

    #[test]
    fn event_line_roundtrip() {
        let event = sample_event();
        let line = serialize_event_line(&event);
        let parsed = parse_event_line(line.trim_end()).expect("line parses");
        assert_eq!(parsed, event);
    }

    #[test]
    fn event_line_with_unknown_kind_is_corrupt() {
        let line = "evt-a\tWeirdKind\tcid\t1\t70\tsig";
        assert!(parse_event_line(line).is_none());
    }

    #[test]
    fn event_line_with_wrong_field_count_is_corrupt() {
        assert!(parse_event_line("evt-a\tRecipeCreated\tcid").is_none());
    }

    #[test]
    fn event_line_with_empty_payload_is_corrupt() {
        let line = "evt-a\tRecipeCreated\tcid\t1\t\tsig";
        assert!(parse_event_line(line).is_none());
    }

    #[test]
    fn block_line_roundtrip() {
        let block = BlockRecord {
            index: 7,
            opened_unix: 1_700_000_000,
            reserved: false,
            confirmed: true,
            backfilled: true,
            event_ids: vec!["evt-a".into(), "evt-b".into()],
            psz_timestamp: "genesis text | anchor".into(),
            prev_hash: "prev".into(),
            merkle_root: "merkle".into(),
            content_hash: "content".into(),
            block_hash: "hash".into(),
        };
        let line = serialize_block_line(&block);
        let parsed = parse_block_line(line.trim_end()).expect("line parses");
        assert_eq!(parsed.index, 7);
        assert_eq!(parsed.event_ids, block.event_ids);
        assert_eq!(parsed.psz_timestamp, block.psz_timestamp);
        assert_eq!(parsed.content_hash, "content");
        assert!(parsed.confirmed && parsed.backfilled && !parsed.reserved);
    }

    #[test]
    fn legacy_nine_field_block_line_parses() {
        let encoded_ids = hex::encode("evt-a,evt-b");
        let line = format!("3\t1700000000\t0\t1\t0\tprev\tmerkle\thash\t{encoded_ids}");
        let parsed = parse_block_line(&line).expect("legacy line parses");
        assert_eq!(parsed.index, 3);
        assert_eq!(parsed.merkle_root, "merkle");
        assert_eq!(parsed.content_hash, "merkle");
        assert_eq!(parsed.block_hash, "hash");
        assert!(parsed.psz_timestamp.is_empty());
        assert_eq!(parsed.event_ids, vec!["evt-a", "evt-b"]);
    }

    #[test]
    fn garbage_block_line_is_rejected() {
        assert!(parse_block_line("not\ta\tblock").is_none());
        assert!(parse_block_line("").is_none());
    }

    #[test]
    fn event_id_list_roundtrip() {
        let ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(split_event_ids(&join_event_ids(&ids)), ids);
        assert!(split_event_ids("").is_empty());
        assert_eq!(split_event_ids(",a,,b,"), vec!["a", "b"]);
    }
}
