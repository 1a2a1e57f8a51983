//! Interactive chat against a remote agent over the run-stream API.
//!
//! Reads prompts from stdin, streams the answer as it is produced, and keeps
//! the session across turns. Ctrl-C cancels the in-flight run without
//! leaving the chat.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use tether::protocol::{MessagePart, RunStatus};
use tether::{AgentRunner, RunClient, RunObserver};

#[derive(Parser)]
#[command(name = "tether", about = "Chat with a remote agent over the run-stream API")]
struct Cli {
    /// Base URL of the agent API.
    #[arg(
        long,
        env = "TETHER_BASE_URL",
        default_value = "http://localhost:8333/api/v1"
    )]
    base_url: String,

    /// Name of the agent to run.
    agent: String,
}

struct Console;

impl RunObserver for Console {
    fn on_delta(&mut self, delta: &str) {
        print!("{delta}");
        let _ = std::io::stdout().flush();
    }

    fn on_artifact(&mut self, part: &MessagePart) {
        let name = part.name.as_deref().unwrap_or("unnamed");
        eprintln!("[artifact] {name} ({} bytes)", part.content.len());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let client = Arc::new(RunClient::new(cli.base_url));
    let runner = Arc::new(AgentRunner::new(client, cli.agent));
    let mut observer = Console;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut run = std::pin::pin!(runner.run(input, &mut observer));
        let outcome = loop {
            tokio::select! {
                outcome = &mut run => break outcome,
                _ = tokio::signal::ctrl_c() => {
                    eprintln!();
                    runner.cancel();
                }
            }
        };

        match outcome {
            Ok(outcome) => {
                println!();
                match outcome.status {
                    RunStatus::Failed => {
                        if let Some(error) = outcome.error {
                            eprintln!("run failed: {error}");
                        }
                    }
                    RunStatus::Cancelled => eprintln!("(cancelled)"),
                    _ => {}
                }
            }
            Err(error) => eprintln!("error: {error}"),
        }
    }

    Ok(())
}
