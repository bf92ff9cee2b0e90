//! Line-oriented terminal client for a running starguide server.

use clap::Parser;
use dotenv::dotenv;
use log::info;
use starguide::cli::ClientArgs;
use starguide::client::{ ChatSession, Conversation, HttpTransport, Message };
use starguide::models::chat::Role;
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = ClientArgs::parse();
    info!("Chat endpoint: {}", args.endpoint);

    let session = ChatSession::new(
        HttpTransport::new(args.endpoint.clone()),
        Conversation::with_greeting(&args.greeting)
    );
    let mut printer = Printer::default();
    for message in session.snapshot().messages() {
        printer.print_finished(message);
    }
    printer.cursor = session.snapshot().len();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            let mut updates = session.subscribe();
            let (_, ()) = tokio::join!(session.submit(&line), printer.follow(&mut updates));
        }
        prompt()?;
    }

    Ok(())
}

/// Echoes assistant output as the conversation grows.
#[derive(Default)]
struct Printer {
    cursor: usize,
    printed: usize,
    started: bool,
    image_shown: bool,
}

impl Printer {
    /// Prints snapshots until the reply is no longer streaming.
    async fn follow(&mut self, updates: &mut watch::Receiver<Conversation>) {
        while updates.changed().await.is_ok() {
            let conversation = updates.borrow_and_update().clone();
            self.catch_up(&conversation);
            if !conversation.is_busy() {
                break;
            }
        }
    }

    fn catch_up(&mut self, conversation: &Conversation) {
        let messages = conversation.messages();
        while let Some(message) = messages.get(self.cursor) {
            if message.role == Role::Assistant {
                self.print_delta(message);
                if conversation.streaming_id() == Some(message.id) {
                    return;
                }
                println!();
            }
            self.cursor += 1;
            self.printed = 0;
            self.started = false;
            self.image_shown = false;
        }
    }

    fn print_delta(&mut self, message: &Message) {
        if !self.started {
            print!("{}> ", message.role);
            self.started = true;
        }
        if !self.image_shown {
            if let Some(url) = &message.image_url {
                print!("[image: {}] ", url);
                self.image_shown = true;
            }
        }
        if message.content.len() > self.printed {
            print!("{}", &message.content[self.printed..]);
            self.printed = message.content.len();
        }
        let _ = std::io::stdout().flush();
    }

    fn print_finished(&self, message: &Message) {
        if let Some(url) = &message.image_url {
            println!("[image: {}]", url);
        }
        println!("{}> {}", message.role, message.content);
    }
}

fn prompt() -> std::io::Result<()> {
    print!("you> ");
    std::io::stdout().flush()
}
