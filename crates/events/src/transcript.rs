//! Reducer turning display updates into an ordered row list.
//!
//! Because every update carries the full current text of its row, a
//! renderer that holds one `Transcript` and applies updates in order needs
//! no other state to show the conversation, including mid-stream output.

use crate::{MessageKind, MessageUpdate};

/// Marker prepended to model-load progress rows.
pub const INIT_PREFIX: &str = "[System Initialize] ";

/// One rendered row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub kind: MessageKind,
    pub text: String,
}

/// Ordered list of display rows.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one update.
    pub fn apply(&mut self, update: &MessageUpdate) {
        // An echoed prompt can race ahead of the first assistant row; drop
        // assistant updates that exactly repeat the latest user row.
        if update.kind == MessageKind::Assistant {
            if let Some(last) = self.entries.last() {
                if last.kind == MessageKind::User && last.text == update.text {
                    return;
                }
            }
        }

        let text = match update.kind {
            MessageKind::Init => format!("{INIT_PREFIX}{}", update.text),
            _ => update.text.clone(),
        };
        let entry = TranscriptEntry {
            kind: update.kind,
            text,
        };

        match self.entries.last_mut() {
            Some(last) if !update.append => *last = entry,
            _ => self.entries.push(entry),
        }
    }

    /// Discard every row.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(transcript: &Transcript) -> Vec<&str> {
        transcript
            .entries()
            .iter()
            .map(|e| e.text.as_str())
            .collect()
    }

    #[test]
    fn append_creates_rows_and_replace_overwrites_last() {
        let mut t = Transcript::new();
        t.apply(&MessageUpdate::append(MessageKind::User, "hello"));
        t.apply(&MessageUpdate::append(MessageKind::Assistant, ""));
        t.apply(&MessageUpdate::replace(MessageKind::Assistant, "Hi"));
        t.apply(&MessageUpdate::replace(MessageKind::Assistant, "Hi there"));

        assert_eq!(texts(&t), vec!["hello", "Hi there"]);
        assert_eq!(t.entries()[1].kind, MessageKind::Assistant);
    }

    #[test]
    fn replace_on_empty_transcript_creates_a_row() {
        let mut t = Transcript::new();
        t.apply(&MessageUpdate::replace(MessageKind::Assistant, "Hi"));
        assert_eq!(texts(&t), vec!["Hi"]);
    }

    #[test]
    fn assistant_echo_of_latest_user_row_is_suppressed() {
        let mut t = Transcript::new();
        t.apply(&MessageUpdate::append(MessageKind::User, "same"));
        t.apply(&MessageUpdate::append(MessageKind::Assistant, "same"));

        // Neither appended nor replaced.
        assert_eq!(t.len(), 1);
        assert_eq!(t.entries()[0].kind, MessageKind::User);
    }

    #[test]
    fn user_rows_are_never_deduplicated() {
        let mut t = Transcript::new();
        t.apply(&MessageUpdate::append(MessageKind::User, "same"));
        t.apply(&MessageUpdate::append(MessageKind::User, "same"));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn init_rows_carry_the_marker_prefix() {
        let mut t = Transcript::new();
        t.apply(&MessageUpdate::append(MessageKind::Init, ""));
        t.apply(&MessageUpdate::replace(MessageKind::Init, "downloading 40%"));

        assert_eq!(
            texts(&t),
            vec!["[System Initialize] downloading 40%"]
        );
    }

    #[test]
    fn clear_discards_all_rows() {
        let mut t = Transcript::new();
        t.apply(&MessageUpdate::append(MessageKind::User, "hello"));
        t.clear();
        assert!(t.is_empty());
    }
}
