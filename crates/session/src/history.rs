//! Conversation history owned by the session controller.

use palaver_engine::ChatMessage;

/// Append-only sequence of turns, cleared atomically by reset.
///
/// The epoch counter is bumped on every clear so a generation whose
/// conversation was discarded underneath it can tell, instead of
/// resurrecting its interrupted reply into the fresh conversation.
#[derive(Debug, Default)]
pub(crate) struct History {
    turns: Vec<ChatMessage>,
    epoch: u64,
}

impl History {
    pub fn push(&mut self, turn: ChatMessage) {
        self.turns.push(turn);
    }

    /// Push only if no clear happened since `epoch` was observed.
    pub fn push_if_epoch(&mut self, epoch: u64, turn: ChatMessage) -> bool {
        if self.epoch == epoch {
            self.turns.push(turn);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.epoch += 1;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.turns.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_empties_and_bumps_epoch() {
        let mut history = History::default();
        history.push(ChatMessage::user("hi"));
        let seen = history.epoch();

        history.clear();

        assert!(history.snapshot().is_empty());
        assert!(!history.push_if_epoch(seen, ChatMessage::assistant("late")));
        assert!(history.snapshot().is_empty());
    }

    #[test]
    fn push_if_epoch_appends_when_unchanged() {
        let mut history = History::default();
        let seen = history.epoch();
        assert!(history.push_if_epoch(seen, ChatMessage::assistant("ok")));
        assert_eq!(history.snapshot(), vec![ChatMessage::assistant("ok")]);
    }
}
