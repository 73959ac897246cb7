//! Line protocol spoken with chat clients
//!
//! Every newline-terminated line a client sends is one protocol event. While a
//! client is naming itself the line is its desired name; afterwards a line is
//! either ignored (blank), a rename directive, or a chat message.

use chrono::Local;

/// Prefix of the rename directive
pub const RENAME_PREFIX: &str = "--rename=";

/// Prompt sent when a client still has to pick a name
pub const NAME_PROMPT: &str = "[ENTER YOUR NAME]: ";

/// Reply to a naming or rename request for a name already in use, or empty
pub const DUPLICATE_NAME: &str = "Rename failed due to duplicate name\n";

/// Single line written to a connection refused at admission
pub const SERVER_FULL: &str = "Server is full! Please try again later\n";

/// Cursor-up and clear-line: wipes the client's own echoed input
pub const ERASE_LAST_LINE: &str = "\x1b[A\x1b[K";

/// Timestamp layout used inside chat and rename events
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Classification of one line received from an active client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Empty or whitespace-only
    Blank,
    /// `--rename=<name>`; carries the requested name without the terminator
    Rename(&'a str),
    /// Anything else; carries the text without the terminator
    Text(&'a str),
}

impl<'a> Line<'a> {
    pub fn classify(raw: &'a str) -> Self {
        if raw.trim().is_empty() {
            return Line::Blank;
        }
        let line = strip_terminator(raw);
        match line.strip_prefix(RENAME_PREFIX) {
            Some(name) => Line::Rename(name),
            None => Line::Text(line),
        }
    }
}

/// Remove one trailing `\n` (and a preceding `\r`, if any)
pub fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Interpret a line received while naming. `None` means the line was blank.
pub fn parse_name(raw: &str) -> Option<&str> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(strip_terminator(raw))
    }
}

/// Current local time in [`TIMESTAMP_FORMAT`]
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

pub fn join_event(name: &str) -> String {
    format!("{} has joined the chat...\n", name)
}

pub fn leave_event(name: &str) -> String {
    format!("{} has left our chat...\n", name)
}

pub fn chat_event(timestamp: &str, name: &str, text: &str) -> String {
    format!("[{}] [{}]: {}\n", timestamp, name, text)
}

pub fn rename_event(timestamp: &str, old_name: &str, new_name: &str) -> String {
    format!(
        "[{}]: {} renamed their name to {}\n",
        timestamp, old_name, new_name
    )
}

/// Frame replayed history for a newly joined client
///
/// A non-empty transcript gets one trailing `\n`.
pub fn frame_transcript(mut text: String) -> String {
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_lines() {
        assert_eq!(Line::classify("\n"), Line::Blank);
        assert_eq!(Line::classify("  \t\r\n"), Line::Blank);
        assert_eq!(Line::classify("--rename=bob\n"), Line::Rename("bob"));
        assert_eq!(Line::classify("--rename=\n"), Line::Rename(""));
        assert_eq!(Line::classify("hello\r\n"), Line::Text("hello"));
        assert_eq!(Line::classify(" --rename=x\n"), Line::Text(" --rename=x"));
    }

    #[test]
    fn name_keeps_inner_whitespace() {
        assert_eq!(parse_name("alice\n"), Some("alice"));
        assert_eq!(parse_name(" al ice \n"), Some(" al ice "));
        assert_eq!(parse_name("   \n"), None);
    }

    #[test]
    fn event_texts() {
        assert_eq!(join_event("alice"), "alice has joined the chat...\n");
        assert_eq!(leave_event("alice"), "alice has left our chat...\n");
        assert_eq!(
            chat_event("2024-01-02 03:04:05", "alice", "hello"),
            "[2024-01-02 03:04:05] [alice]: hello\n"
        );
        assert_eq!(
            rename_event("2024-01-02 03:04:05", "alice", "bob"),
            "[2024-01-02 03:04:05]: alice renamed their name to bob\n"
        );
    }

    #[test]
    fn transcript_framing() {
        assert_eq!(frame_transcript(String::new()), "");
        assert_eq!(frame_transcript("a\nb".to_string()), "a\nb\n");
    }

    #[test]
    fn timestamp_has_expected_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), 19);
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).is_ok());
    }
}
