//! Event extraction from Cooja simulation logs.
//!
//! Each line is matched against a fixed, ordered list of patterns and turned
//! into at most one [`Event`]. Lines that match nothing are skipped.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use color_eyre::eyre::{Context, Result};
use regex::{Captures, Regex};

use super::types::*;

/// Compiled regex patterns for log parsing
pub struct LogPatterns {
    /// Match: "<tick> <node> Sending message: '<payload>' to <addr>"
    pub send: Regex,
    /// Match: "<tick> <node> Data received from <addr> ... in <hops> hops with datalength <n>: '<payload>'"
    pub receive: Regex,
    /// Match: "<tick> <node> [INFO: TSCH      ] send packet to <addr>"
    pub confirm: Regex,
    /// Match: "<tick> <node> [WARN: CSMA      ] not for us"
    pub not_for_us: Regex,
    /// Match: "<tick> <node> [...] ! can't send packet ... queue a/b c/d"
    pub queue_full: Regex,
    /// Match: "<tick> <node> ... queue <d1>/<cap> <d2>/<cap>"
    pub queue_sample: Regex,
    /// Match: "<tick> <node> [INFO: TSCH      ] association done"
    pub association: Regex,
    /// Match: "<tick> <node> All messages send"
    pub sending_done: Regex,
    /// Match: "<tick> <node> ... DIO Timer interval doubled" or "... reset DIO timer"
    pub trickle_reset: Regex,
    /// Match tick (and optional node) at start of line
    pub tick: Regex,
}

impl LogPatterns {
    pub fn new() -> Self {
        Self {
            send: Regex::new(
                r"^(\d+)\s+(\d+)\s+Sending message: '(.+?)' to\b"
            ).expect("Invalid send regex"),
            receive: Regex::new(
                r"^(\d+)\s+(\d+)\s+Data received from .*? in (\d+) hops with datalength \d+: '(.+)'\s*$"
            ).expect("Invalid receive regex"),
            confirm: Regex::new(
                r"^(\d+)\s+(\d+)\s+\[INFO: TSCH\s*\] send packet to"
            ).expect("Invalid confirm regex"),
            not_for_us: Regex::new(
                r"^(\d+)\s+(\d+)\s+\[WARN: CSMA\s*\]\s+not for us"
            ).expect("Invalid not_for_us regex"),
            queue_full: Regex::new(
                r"^(\d+)\s+(\d+)\s+\[.*?\] ! can't send packet .*queue \d+/\d+ \d+/\d+"
            ).expect("Invalid queue_full regex"),
            queue_sample: Regex::new(
                r"^(\d+)\s+(\d+)\s+.*?queue\s+(\d+)/(\d+)\s+(\d+)/\d+"
            ).expect("Invalid queue_sample regex"),
            association: Regex::new(
                r"^(\d+)\s+(\d+)\s+\[INFO: TSCH\s*\] association done"
            ).expect("Invalid association regex"),
            sending_done: Regex::new(
                r"^(\d+)\s+(\d+)\s+All messages send"
            ).expect("Invalid sending_done regex"),
            trickle_reset: Regex::new(
                r"^(\d+)\s+(\d+)\s+.*(?:DIO Timer interval doubled|reset DIO timer)"
            ).expect("Invalid trickle_reset regex"),
            tick: Regex::new(
                r"^(\d+)(?:\s+(\d+)\b)?"
            ).expect("Invalid tick regex"),
        }
    }
}

impl Default for LogPatterns {
    fn default() -> Self {
        Self::new()
    }
}

/// Global patterns instance
pub static PATTERNS: LazyLock<LogPatterns> = LazyLock::new(LogPatterns::new);

/// Parse a numeric capture group; overflow or absence is a non-match
fn number<T: FromStr>(caps: &Captures<'_>, group: usize) -> Option<T> {
    caps.get(group)?.as_str().parse().ok()
}

fn text(caps: &Captures<'_>, group: usize) -> Option<String> {
    caps.get(group).map(|m| m.as_str().trim().to_string())
}

/// Apply `build` to the captures of `re`, if it matches
fn try_pattern<F>(re: &Regex, line: &str, build: F) -> Option<Event>
where
    F: FnOnce(&Captures<'_>) -> Option<Event>,
{
    re.captures(line).and_then(|caps| build(&caps))
}

fn node_event<F>(re: &Regex, line: &str, make: F) -> Option<Event>
where
    F: FnOnce(Tick, NodeId) -> Event,
{
    try_pattern(re, line, |c| Some(make(number(c, 1)?, number(c, 2)?)))
}

/// Extract the first matching event from a line.
///
/// Patterns are tried in priority order: send, receive, confirm, drop,
/// queue sample, association, sending done, trickle reset, plain tick.
pub fn extract_event(line: &str) -> Option<Event> {
    let line = line.trim_end_matches(['\r', '\n']);
    let p = &*PATTERNS;

    try_pattern(&p.send, line, |c| {
        Some(Event::Send {
            tick: number(c, 1)?,
            node: number(c, 2)?,
            payload: text(c, 3)?,
        })
    })
    .or_else(|| {
        try_pattern(&p.receive, line, |c| {
            Some(Event::Receive {
                tick: number(c, 1)?,
                node: number(c, 2)?,
                hop_count: number(c, 3)?,
                payload: text(c, 4)?,
            })
        })
    })
    .or_else(|| node_event(&p.confirm, line, |tick, node| Event::Confirm { tick, node }))
    .or_else(|| {
        node_event(&p.not_for_us, line, |tick, node| Event::Drop {
            tick,
            node,
            reason: DropReason::NotForUs,
        })
    })
    .or_else(|| {
        node_event(&p.queue_full, line, |tick, node| Event::Drop {
            tick,
            node,
            reason: DropReason::QueueFull,
        })
    })
    .or_else(|| {
        try_pattern(&p.queue_sample, line, |c| {
            Some(Event::QueueSample {
                tick: number(c, 1)?,
                node: number(c, 2)?,
                depth1: number(c, 3)?,
                capacity: number(c, 4)?,
                depth2: number(c, 5)?,
            })
        })
    })
    .or_else(|| {
        node_event(&p.association, line, |tick, node| {
            Event::AssociationComplete { tick, node }
        })
    })
    .or_else(|| node_event(&p.sending_done, line, |tick, node| Event::SendingDone { tick, node }))
    .or_else(|| node_event(&p.trickle_reset, line, |tick, node| Event::TrickleReset { tick, node }))
    .or_else(|| {
        try_pattern(&p.tick, line, |c| {
            // A node column that does not fit is dropped, the tick still counts
            Some(Event::Tick {
                tick: number(c, 1)?,
                node: number(c, 2),
            })
        })
    })
}

/// Extract events from any buffered reader.
///
/// Lines that are not valid UTF-8 are skipped. Any other read error ends
/// extraction and is returned.
pub fn extract_events<R: BufRead>(reader: R) -> io::Result<Vec<Event>> {
    let mut events = Vec::new();
    let mut skipped = 0usize;

    for line_result in reader.lines() {
        let line = match line_result {
            Ok(l) => l,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        if let Some(event) = extract_event(&line) {
            events.push(event);
        }
    }

    if skipped > 0 {
        log::debug!("Skipped {} lines with invalid UTF-8", skipped);
    }

    Ok(events)
}

/// Parse a single log file into its ordered event stream
pub fn parse_log_file(path: &Path) -> Result<Vec<Event>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    let reader = BufReader::with_capacity(64 * 1024, file);

    let events = extract_events(reader)
        .with_context(|| format!("Failed to read log file: {}", path.display()))?;
    log::debug!("Extracted {} events from {}", events.len(), path.display());

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_line() {
        let line = "61234567 7 Sending message: 'Msg fd00::207:7:7:7 12' to fd00::210:10:10:10";
        assert_eq!(
            extract_event(line),
            Some(Event::Send {
                tick: 61234567,
                node: 7,
                payload: "Msg fd00::207:7:7:7 12".to_string(),
            })
        );
    }

    #[test]
    fn test_receive_line() {
        let line = "61299999 16 Data received from fd00::207:7:7:7 on port 5678 from port 8765 in 3 hops with datalength 22: 'Msg fd00::207:7:7:7 12'";
        assert_eq!(
            extract_event(line),
            Some(Event::Receive {
                tick: 61299999,
                node: 16,
                payload: "Msg fd00::207:7:7:7 12".to_string(),
                hop_count: 3,
            })
        );
    }

    #[test]
    fn test_confirm_and_association() {
        let confirm = "1000 4 [INFO: TSCH      ] send packet to 0001.0001.0001.0001 with seqno 12";
        assert_eq!(extract_event(confirm), Some(Event::Confirm { tick: 1000, node: 4 }));

        let assoc = "2000 4 [INFO: TSCH      ] association done (1), sl 0, ch 20";
        assert_eq!(
            extract_event(assoc),
            Some(Event::AssociationComplete { tick: 2000, node: 4 })
        );
    }

    #[test]
    fn test_drop_lines() {
        let nfu = "3000 12 [WARN: CSMA      ] not for us";
        assert_eq!(
            extract_event(nfu),
            Some(Event::Drop { tick: 3000, node: 12, reason: DropReason::NotForUs })
        );

        // Queue-full lines also carry queue depths; drop wins by priority
        let full = "3100 5 [ERR : TSCH      ] ! can't send packet to 0001.0001.0001.0001 with seqno 4, queue 64/64 64/64";
        assert_eq!(
            extract_event(full),
            Some(Event::Drop { tick: 3100, node: 5, reason: DropReason::QueueFull })
        );
    }

    #[test]
    fn test_queue_sample() {
        let line = "4000 5 [INFO: TSCH-QUEUE] packet queued, queue 12/64 3/64";
        assert_eq!(
            extract_event(line),
            Some(Event::QueueSample {
                tick: 4000,
                node: 5,
                depth1: 12,
                depth2: 3,
                capacity: 64,
            })
        );
    }

    #[test]
    fn test_markers() {
        assert_eq!(
            extract_event("5000 9 All messages send"),
            Some(Event::SendingDone { tick: 5000, node: 9 })
        );
        assert_eq!(
            extract_event("5100 2 [INFO: RPL       ] Multicast DIS => reset DIO timer"),
            Some(Event::TrickleReset { tick: 5100, node: 2 })
        );
    }

    #[test]
    fn test_plain_tick_and_garbage() {
        assert_eq!(
            extract_event("6000 3 [DBG : RPL       ] something else"),
            Some(Event::Tick { tick: 6000, node: Some(3) })
        );
        assert_eq!(
            extract_event("6001 ID:3 text"),
            Some(Event::Tick { tick: 6001, node: None })
        );
        assert_eq!(extract_event("no tick here"), None);
        assert_eq!(extract_event(""), None);
    }

    #[test]
    fn test_overflowing_numbers_fall_through() {
        // Node id does not fit in u32: the send pattern is a non-match
        let line = "100 99999999999 Sending message: 'Msg x 1' to fd00::1";
        assert_eq!(extract_event(line), Some(Event::Tick { tick: 100, node: None }));

        // Tick does not fit in u64: nothing matches
        let line = "999999999999999999999999 3 Sending message: 'Msg x 1' to fd00::1";
        assert_eq!(extract_event(line), None);
    }

    #[test]
    fn test_extract_events_preserves_order() {
        let log = "10 2 Sending message: 'a' to fd00::1\nnoise\n20 2 [INFO: TSCH      ] send packet to 1\r\n";
        let events = extract_events(log.as_bytes()).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Send { .. }));
        assert!(matches!(events[1], Event::Confirm { tick: 20, node: 2 }));
    }

    #[test]
    fn test_payload_with_quote() {
        let send = "100 7 Sending message: 'it's 1' to fd00::210:10:10:10";
        let recv = "900 16 Data received from fd00::207 on port 5678 from port 8765 in 2 hops with datalength 6: 'it's 1'";

        let sent = match extract_event(send) {
            Some(Event::Send { payload, .. }) => payload,
            other => panic!("expected send, got {:?}", other),
        };
        let received = match extract_event(recv) {
            Some(Event::Receive { payload, .. }) => payload,
            other => panic!("expected receive, got {:?}", other),
        };
        assert_eq!(sent, "it's 1");
        assert_eq!(received, sent);
    }

    #[test]
    fn test_invalid_utf8_line_skipped() {
        let mut log = b"10 2 Sending message: 'a' to fd00::1\n".to_vec();
        log.extend_from_slice(b"15 2 \xff\xfe garbage\n");
        log.extend_from_slice(b"20 2 [INFO: TSCH      ] send packet to 1\n");

        let events = extract_events(log.as_slice()).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Event::Confirm { tick: 20, node: 2 }));
    }

    /// Reader whose every read fails, like a directory or a failing disk
    struct BrokenReader;

    impl io::Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device error"))
        }
    }

    #[test]
    fn test_persistent_read_error_is_returned() {
        let err = extract_events(BufReader::new(BrokenReader)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn test_directory_is_unreadable() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(parse_log_file(dir.path()).is_err());
    }
}
