//! Renders sink updates to the terminal.

use std::io::Write as _;
use std::sync::Mutex;

use palaver_events::{ChatSink, MessageKind, MessageUpdate, INIT_PREFIX};

/// Streams assistant output incrementally by printing only the suffix each
/// replace update adds on top of what is already on screen.
#[derive(Default)]
pub struct StdoutSink {
    printed: Mutex<usize>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatSink for StdoutSink {
    fn message(&self, update: MessageUpdate) {
        match update.kind {
            MessageKind::Assistant => {
                let mut printed = self.printed.lock().unwrap();
                if update.append {
                    *printed = 0;
                }
                if update.text.len() > *printed {
                    print!("{}", &update.text[*printed..]);
                    let _ = std::io::stdout().flush();
                    *printed = update.text.len();
                }
            }
            MessageKind::Init => println!("{INIT_PREFIX}{}", update.text),
            MessageKind::Error => eprintln!("{}", update.text),
            MessageKind::User => {}
        }
    }

    fn stats(&self, text: String) {
        println!("\n[{text}]");
    }

    fn cleared(&self) {
        println!("(conversation cleared)");
    }
}
