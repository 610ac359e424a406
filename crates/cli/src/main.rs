use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use rihla_chat::{ChatSession, ReplyScheduler, Submission};
use rihla_core::{City, QueryInterpreter, ResponseTemplates};
use rihla_observability::{init_tracing_stderr, AppMetrics};

#[derive(Debug, Parser)]
#[command(name = "rihla")]
#[command(about = "Morocco Travel Assistant")]
struct Cli {
    /// JSON file overriding the welcome, fallback or travel-options text.
    #[arg(long, env = "RIHLA_TEMPLATES")]
    templates: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat {
        #[arg(long, env = "RIHLA_REPLY_DELAY_MS", default_value_t = 1000)]
        delay_ms: u64,
    },
    Ask {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    Cities,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing_stderr();
    let cli = Cli::parse();

    let interpreter = Arc::new(load_interpreter(cli.templates.as_ref())?);
    let metrics = AppMetrics::shared();

    match cli.command {
        Command::Chat { delay_ms } => {
            let scheduler =
                ReplyScheduler::new(interpreter, metrics, Duration::from_millis(delay_ms));
            let stdin = BufReader::new(tokio::io::stdin());
            run_chat(ChatSession::new(scheduler), stdin, io::stdout()).await?;
        }
        Command::Ask { text, json } => {
            let scheduler = ReplyScheduler::new(interpreter, metrics, Duration::ZERO);
            let (interpretation, reply) = scheduler.answer(&text.join(" "));
            if json {
                let payload = serde_json::json!({
                    "interpretation": interpretation,
                    "reply_text": reply,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{reply}");
            }
        }
        Command::Cities => {
            for city in City::ALL {
                println!("{city}");
            }
        }
    }

    Ok(())
}

fn load_interpreter(templates: Option<&PathBuf>) -> Result<QueryInterpreter> {
    let templates = match templates {
        Some(path) => ResponseTemplates::load(path)
            .with_context(|| format!("failed loading templates from {}", path.display()))?,
        None => ResponseTemplates::default(),
    };

    QueryInterpreter::new(templates).context("invalid response templates")
}

async fn run_chat<R, W>(mut session: ChatSession, input: R, mut out: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    if let Some(welcome) = session.messages().first() {
        writeln!(out, "{}\n", welcome.text)?;
    }
    writeln!(out, "Type 'quit' to exit.")?;

    let mut lines = input.lines();
    loop {
        write!(out, "\nYou: ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let message = line.trim_end_matches('\r');
        if is_exit_command(message) {
            break;
        }

        if session.submit(message)? == Submission::Rejected {
            continue;
        }

        if let Some(reply) = session.next_reply().await {
            writeln!(out, "\nAssistant: {}", reply.text)?;
        }
    }

    session.close();
    Ok(())
}

fn is_exit_command(message: &str) -> bool {
    let message = message.trim();
    message.eq_ignore_ascii_case("quit") || message.eq_ignore_ascii_case("exit")
}
