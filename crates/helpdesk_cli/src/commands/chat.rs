//! Chat command - Interactive helpdesk console.
//!
//! One terminal plays all three roles. Plain lines are sent as the current
//! persona; slash commands switch persona and drive agent actions.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

use helpdesk_core::{BroadcastEvent, Channel, ChatId, HelpdeskResult, Identity, MessageType};
use helpdesk_runtime::{Helpdesk, HelpdeskConfig, Subscription};

#[derive(Args)]
pub struct ChatArgs {
    /// Display name of the customer
    #[arg(long, default_value = "Customer")]
    user: String,

    /// Display name of the helpdesk agent
    #[arg(long, default_value = "Agent")]
    agent: String,

    /// Display name of the administrator
    #[arg(long, default_value = "Admin")]
    admin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persona {
    User,
    Agent,
    Admin,
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Say(String),
    As(Persona),
    New,
    Claim,
    Resolve,
    Close,
    Queue,
    History,
    Help,
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(Input::Say(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let input = match (parts.next().unwrap_or_default(), parts.next()) {
        ("as", Some("user")) => Input::As(Persona::User),
        ("as", Some("agent")) => Input::As(Persona::Agent),
        ("as", Some("admin")) => Input::As(Persona::Admin),
        ("new", _) => Input::New,
        ("claim", _) => Input::Claim,
        ("resolve", _) => Input::Resolve,
        ("close", _) => Input::Close,
        ("queue", _) => Input::Queue,
        ("history", _) => Input::History,
        ("help", _) => Input::Help,
        ("quit", _) | ("exit", _) => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    };
    Some(input)
}

const HELP: &str = "\
Type a message to send it as the current persona.
  /as user|agent|admin   switch persona
  /new                   start over with a new chat
  /claim                 agent claims the current chat
  /resolve               agent resolves the current chat
  /close                 admin closes the current chat
  /queue                 chats waiting for an agent
  /history               full transcript
  /quit                  leave";

struct Session {
    helpdesk: Helpdesk,
    user: Identity,
    agent: Identity,
    admin: Identity,
    persona: Persona,
    chat: Option<ChatId>,
    printer: Option<JoinHandle<()>>,
}

impl Session {
    fn identity(&self) -> &Identity {
        match self.persona {
            Persona::User => &self.user,
            Persona::Agent => &self.agent,
            Persona::Admin => &self.admin,
        }
    }

    /// Agent or admin, whichever persona is active; the agent otherwise.
    fn staff(&self) -> &Identity {
        match self.persona {
            Persona::Admin => &self.admin,
            Persona::User | Persona::Agent => &self.agent,
        }
    }

    fn current_chat(&self) -> Option<ChatId> {
        if self.chat.is_none() {
            println!("  (no chat yet: send a message as the user first)");
        }
        self.chat
    }

    fn follow(&mut self, chat_id: ChatId) -> HelpdeskResult<()> {
        if let Some(printer) = self.printer.take() {
            printer.abort();
        }
        let subscription = self.helpdesk.subscribe(Channel::Chat(chat_id), &self.user)?;
        self.printer = Some(tokio::spawn(print_events(subscription)));
        self.chat = Some(chat_id);
        Ok(())
    }

    fn say(&mut self, text: &str) -> HelpdeskResult<()> {
        match (self.chat, self.persona) {
            (None, Persona::User) => {
                let detail = self.helpdesk.create_chat(&self.user, text)?;
                println!("  chat #{} opened: {}", detail.chat.id, detail.chat.subject);
                self.follow(detail.chat.id)?;
            }
            (None, Persona::Agent | Persona::Admin) => {
                println!("  (no chat yet: send a message as the user first)");
            }
            (Some(chat_id), Persona::User) => {
                let message = self.helpdesk.send_message(chat_id, &self.user, text)?;
                if message.is_transfer_request {
                    debug!(chat_id = %chat_id, "Transfer requested from console");
                }
            }
            (Some(chat_id), Persona::Agent | Persona::Admin) => {
                let staff = self.identity().clone();
                self.helpdesk.agent_reply(chat_id, &staff, text)?;
            }
        }
        Ok(())
    }

    fn handle(&mut self, input: Input) -> HelpdeskResult<bool> {
        match input {
            Input::Say(text) => self.say(&text)?,
            Input::As(persona) => {
                self.persona = persona;
                println!("  now acting as {}", self.identity().name);
            }
            Input::New => {
                if let Some(printer) = self.printer.take() {
                    printer.abort();
                }
                self.chat = None;
                self.persona = Persona::User;
                println!("  ready for a new chat");
            }
            Input::Claim => {
                if let Some(chat_id) = self.current_chat() {
                    let staff = self.staff().clone();
                    self.helpdesk.assign_to_agent(chat_id, &staff)?;
                }
            }
            Input::Resolve => {
                if let Some(chat_id) = self.current_chat() {
                    let staff = self.staff().clone();
                    self.helpdesk.resolve_chat(chat_id, &staff)?;
                }
            }
            Input::Close => {
                if let Some(chat_id) = self.current_chat() {
                    let admin = self.admin.clone();
                    self.helpdesk.close_chat(chat_id, &admin)?;
                }
            }
            Input::Queue => {
                let queue = self.helpdesk.unassigned_chats(self.staff())?;
                if queue.is_empty() {
                    println!("  queue is empty");
                }
                for summary in queue {
                    println!(
                        "  #{} [{}] {}",
                        summary.chat.id,
                        summary.chat.status.label(),
                        summary.chat.subject
                    );
                }
            }
            Input::History => {
                if let Some(chat_id) = self.current_chat() {
                    let detail = self.helpdesk.chat_detail(chat_id, &self.user)?;
                    println!("  chat #{} [{}]", detail.chat.id, detail.chat.status.label());
                    for message in detail.messages {
                        println!("  {:>7} | {}", message.message_type.label(), message.content);
                    }
                }
            }
            Input::Help => println!("{HELP}"),
            Input::Quit => return Ok(false),
            Input::Unknown(line) => println!("  unknown command: {line} (try /help)"),
        }
        Ok(true)
    }
}

async fn print_events(mut subscription: Subscription) {
    while let Some(broadcast) = subscription.recv().await {
        match broadcast.event {
            BroadcastEvent::MessageSent { message } => {
                let who = match message.message_type {
                    MessageType::Ai => "ai",
                    MessageType::Agent => "agent",
                    MessageType::System => "system",
                    MessageType::User => "user",
                };
                println!("[{who}] {}", message.content);
            }
            BroadcastEvent::TransferRequested { chat } => {
                println!("[helpdesk-agents] chat #{} needs a human: {}", chat.id, chat.subject);
            }
        }
    }
}

pub async fn execute(args: ChatArgs, config_path: Option<&Path>) -> Result<()> {
    let config = HelpdeskConfig::load(config_path)?;
    let offline = !config.ai.has_api_key();
    let helpdesk = Helpdesk::builder(config).build()?;

    let user = Identity::user(1, args.user);
    let agent = Identity::agent(2, args.agent);
    let admin = Identity::admin(3, args.admin);

    let pool_watch = helpdesk.subscribe(Channel::HelpdeskAgents, &agent)?;
    let pool_printer = tokio::spawn(print_events(pool_watch));

    println!("helpdesk console. /help for commands.");
    if offline {
        println!("(OPENAI_API_KEY not set: AI replies use the fallback text)");
    }

    let mut session = Session {
        helpdesk,
        user,
        agent,
        admin,
        persona: Persona::User,
        chat: None,
        printer: None,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(input) = parse_input(&line) else {
            continue;
        };
        match session.handle(input) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => println!("  ! {err}"),
        }
    }

    session.helpdesk.shutdown().await?;
    if let Some(printer) = session.printer.take() {
        printer.abort();
    }
    pool_printer.abort();
    Ok(())
}
