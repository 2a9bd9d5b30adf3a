//! Terminal front end for a palaver chat session.
//!
//! Thin by design: it posts the user's row, forwards every line to the
//! session controller, and renders whatever the sink receives. All the
//! sequencing lives in `palaver-session`.

mod demo_engine;
mod stdout_sink;

use std::io::Write as _;
use std::sync::Arc;

use palaver_session::{SessionConfig, SessionController, SubmitOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::demo_engine::DemoEngine;
use crate::stdout_sink::StdoutSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,palaver=info")),
        )
        .init();

    tracing::info!("starting palaver demo chat");

    let controller = SessionController::new(
        Arc::new(DemoEngine::new()),
        Arc::new(StdoutSink::new()),
        SessionConfig::default(),
    );

    println!("palaver demo chat. Commands: :load, :reset, :quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            ":quit" => break,
            ":reset" => controller.reset().await,
            ":load" => controller.init_model().await,
            "" => {}
            prompt => {
                if controller.generate(prompt).await == SubmitOutcome::DroppedBusy {
                    println!("(busy, prompt dropped)");
                }
                println!();
            }
        }
    }
    Ok(())
}
