//! opsdesk CLI client - create actions and follow notifications

mod client;
mod render;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use client::OpsClient;
use opsdesk::action::{mention, ActionDraft, Delivery, LoopIn, Priority, ReassignOutcome};
use opsdesk::models::{ActorContext, User};
use opsdesk::notify::{NotificationInbox, PushEvent};
use opsdesk::websocket::ServerMessage;

#[derive(Parser)]
#[command(name = "opsdesk")]
#[command(about = "CLI client for the opsdesk action and notification server")]
#[command(version)]
struct Cli {
    /// Server URL
    #[arg(short, long, env = "OPSDESK_SERVER", default_value = "ws://localhost:3000/ws")]
    server: String,

    /// Your user id
    #[arg(short, long, env = "OPSDESK_USER")]
    user: String,

    /// Your display name
    #[arg(short = 'n', long, env = "OPSDESK_NAME")]
    name: String,

    #[arg(long, default_value = "member")]
    role: String,

    #[arg(short, long, env = "OPSDESK_WORKSPACE", default_value = "default")]
    workspace: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print notifications as they arrive
    Watch,

    /// Create an action
    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        description: String,

        /// Stream title; omit for your personal stream
        #[arg(long)]
        stream: Option<String>,

        #[arg(long = "sub-stream")]
        sub_streams: Vec<String>,

        /// Assignee user id; defaults to yourself
        #[arg(long)]
        assignee: Option<String>,

        #[arg(long, requires = "assignee")]
        assignee_name: Option<String>,

        #[arg(short, long)]
        priority: Priority,

        /// Expected completion date (YYYY-MM-DD)
        #[arg(long)]
        due: NaiveDate,

        /// Posted as the first comment
        #[arg(long)]
        comment: Option<String>,
    },

    /// List actions you created, own or watch
    Actions,

    /// Hand an action to someone else
    Reassign {
        #[arg(short, long)]
        action: Uuid,

        /// New assignee's user id
        #[arg(long)]
        to: String,

        #[arg(long)]
        to_name: String,

        /// Confirm without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Show an action's comment thread
    Thread {
        #[arg(short, long)]
        action: Uuid,
    },

    /// Show one page of an action's change history
    History {
        #[arg(short, long)]
        action: Uuid,

        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },

    /// List your notifications
    Notifications,

    /// Mark everything you have seen as read
    MarkRead,

    /// Suggest members for the `@` mention at the end of some text
    Mention { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opsdesk_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let actor = ActorContext::new(&cli.user, &cli.name, &cli.role, &cli.workspace);
    let mut client = OpsClient::connect(&cli.server, &actor).await?;

    match cli.command {
        Commands::Watch => run_watch(&mut client).await,
        Commands::Create {
            title,
            description,
            stream,
            sub_streams,
            assignee,
            assignee_name,
            priority,
            due,
            comment,
        } => {
            let assignee = match assignee {
                Some(id) => User {
                    name: assignee_name.unwrap_or_else(|| id.clone()),
                    id,
                    role: "member".to_string(),
                },
                None => actor.as_user(),
            };
            let mut draft = ActionDraft::new(title, description)
                .in_sub_streams(sub_streams)
                .assigned_to(assignee)
                .with_priority(priority)
                .due(due);
            if let Some(stream) = stream {
                draft = draft.in_stream(stream);
            }
            if let Some(comment) = comment {
                draft = draft.with_initial_comment(comment);
            }
            run_create(&mut client, draft).await
        }
        Commands::Actions => {
            for action in client.list_actions().await? {
                println!("{}", render::action_line(&action));
            }
            Ok(())
        }
        Commands::Reassign {
            action,
            to,
            to_name,
            yes,
        } => {
            let assignee = User {
                id: to,
                name: to_name,
                role: "member".to_string(),
            };
            run_reassign(&mut client, action, assignee, yes).await
        }
        Commands::Thread { action } => {
            let thread = client.thread(action).await?;
            if thread.is_empty() {
                println!("No comments.");
            }
            for line in render::thread_lines(&thread) {
                println!("{}", line);
            }
            Ok(())
        }
        Commands::History { action, page } => {
            let history = client.history(action, page).await?;
            println!("{} change(s) in total", history.total);
            for line in render::history_lines(&history) {
                println!("{}", line);
            }
            Ok(())
        }
        Commands::Notifications => {
            let mut inbox = NotificationInbox::new();
            let ticket = inbox.begin_fetch();
            inbox.apply_fetch(ticket, client.notifications().await?);
            print_inbox(&inbox);
            Ok(())
        }
        Commands::MarkRead => run_mark_read(&mut client).await,
        Commands::Mention { text } => {
            let members = client.workspace_members().await?;
            let suggestions = mention::suggest(&text, text.len(), &members);
            if suggestions.is_empty() {
                println!("No matching members.");
            }
            for member in suggestions {
                let (completed, _) = mention::complete(&text, text.len(), &member.name);
                println!("{:<10} {}", member.id, completed);
            }
            Ok(())
        }
    }
}

fn print_inbox(inbox: &NotificationInbox) {
    println!("{} unread of {}", inbox.unread_count(), inbox.len());
    for notification in inbox.entries() {
        println!("{}", render::notification_line(notification));
    }
}

async fn run_create(client: &mut OpsClient, draft: ActionDraft) -> Result<()> {
    let created = client.create_action(draft).await?;
    println!("Created {}", render::action_line(&created.action));

    if let Delivery::Failed { error } = &created.notification {
        eprintln!("Assignee was not notified: {}", error);
    }
    if let Some(comment) = &created.initial_comment {
        println!("Comment {} posted", comment.id);
    }
    Ok(())
}

async fn run_reassign(
    client: &mut OpsClient,
    action_id: Uuid,
    assignee: User,
    yes: bool,
) -> Result<()> {
    let name = assignee.name.clone();
    let applied = match client.propose_reassignment(action_id, assignee).await? {
        ReassignOutcome::Applied(applied) => applied,
        ReassignOutcome::NeedsConfirmation { proposal } => {
            if !yes && !confirm(&format!("Reassign this action to {}?", name))? {
                println!("Reassignment left pending as {}", proposal.id);
                return Ok(());
            }
            client.confirm_reassignment(proposal.id).await?
        }
    };
    println!("Reassigned {}", render::action_line(&applied.action));

    if let LoopIn::Failed { error } = &applied.loop_in {
        eprintln!("{} was not added to the loop: {}", name, error);
    }
    if let Delivery::Failed { error } = &applied.notification {
        eprintln!("{} was not notified: {}", name, error);
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    use std::io::Write;

    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

async fn run_mark_read(client: &mut OpsClient) -> Result<()> {
    let mut inbox = NotificationInbox::new();
    let ticket = inbox.begin_fetch();
    inbox.apply_fetch(ticket, client.notifications().await?);

    let Some(call) = inbox.begin_mark_all_read() else {
        println!("Nothing to mark.");
        return Ok(());
    };
    match client.mark_all_read(call.through).await {
        Ok(marked) => {
            inbox.complete_mark_all_read(&call);
            println!("Marked {} notification(s) read", marked);
            Ok(())
        }
        Err(e) => {
            inbox.fail_mark_all_read(&call);
            Err(e)
        }
    }
}

async fn run_watch(client: &mut OpsClient) -> Result<()> {
    let mut inbox = NotificationInbox::new();
    let ticket = inbox.begin_fetch();
    inbox.apply_fetch(ticket, client.notifications().await?);
    print_inbox(&inbox);

    while let Some(msg) = client.recv().await {
        match msg {
            ServerMessage::Push {
                event,
                notification,
            } => {
                let line = render::notification_line(&notification);
                if inbox.receive_push(PushEvent {
                    event,
                    notification,
                }) {
                    println!("{}  ({} unread)", line, inbox.unread_count());
                }
            }
            ServerMessage::ActionChanged { event } => {
                tracing::debug!(action_id = %event.action_id(), "Action changed");
            }
            ServerMessage::Error { kind, message } => {
                tracing::warn!(?kind, "{}", message);
            }
            _ => {}
        }
    }

    Err(anyhow!("Connection closed"))
}
