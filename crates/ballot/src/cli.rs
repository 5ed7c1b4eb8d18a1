// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line front end.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::client::BallotClient;
use crate::config::ClientConfig;
use crate::session::{Route, Session, SessionEvent, SessionState};

#[derive(Debug, Parser)]
#[command(name = "ballot", version, about = "Create polls, vote, and view results")]
pub struct Cli {
    #[command(flatten)]
    pub config: ClientConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register a new account and log in.
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "BALLOT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in with email and password.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BALLOT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Revoke the session server-side (best effort) and forget it locally.
    Logout,
    /// Show the current session.
    Whoami,
    /// Poll operations.
    #[command(subcommand)]
    Polls(PollsCommand),
    /// Vote for an option.
    Vote { id: String, option: String },
    /// Withdraw your vote.
    Unvote { id: String },
    /// Vote queries.
    #[command(subcommand)]
    Votes(VotesCommand),
}

#[derive(Debug, Subcommand)]
pub enum PollsCommand {
    List,
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Repeat for each option.
        #[arg(long = "option", required = true)]
        options: Vec<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "option")]
        options: Vec<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum VotesCommand {
    /// Vote counts per option.
    Counts { id: String },
    /// Who voted for an option.
    Voters { id: String, option: String },
}

/// Run one command against the backend.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = BallotClient::new(&cli.config)?;
    let mut events = client.session().subscribe();
    client.start().await;

    let expect_login_redirect = matches!(cli.command, Command::Logout);
    let result = execute(&client, cli.command).await;

    if !expect_login_redirect && login_requested(&mut events) {
        eprintln!("session expired, run `ballot login`");
    }
    result
}

async fn execute(client: &BallotClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Signup { email, username, password } => {
            let session = client.signup(&email, &username, &password).await?;
            print_json(&Identity::from(&session))
        }
        Command::Login { email, password } => {
            print_json(&Identity::from(&client.login(&email, &password).await?))
        }
        Command::Logout => {
            client.logout().await;
            print_json(&StateView::from(&client.session().state()))
        }
        Command::Whoami => print_json(&StateView::from(&client.session().state())),
        Command::Polls(cmd) => match cmd {
            PollsCommand::List => print_json(&client.list_polls().await?),
            PollsCommand::Show { id } => print_json(&client.get_poll(&id).await?),
            PollsCommand::Create { title, description, options } => {
                print_json(&client.create_poll(&title, description.as_deref(), &options).await?)
            }
            PollsCommand::Update { id, title, description, options } => {
                let options = if options.is_empty() { None } else { Some(options.as_slice()) };
                let poll = client
                    .update_poll(&id, title.as_deref(), description.as_deref(), options)
                    .await?;
                print_json(&poll)
            }
            PollsCommand::Delete { id } => {
                client.delete_poll(&id).await?;
                print_json(&serde_json::json!({ "deleted": id }))
            }
        },
        Command::Vote { id, option } => print_json(&client.vote(&id, &option).await?),
        Command::Unvote { id } => {
            client.delete_vote(&id).await?;
            print_json(&serde_json::json!({ "unvoted": id }))
        }
        Command::Votes(cmd) => match cmd {
            VotesCommand::Counts { id } => print_json(&client.vote_counts(&id).await?),
            VotesCommand::Voters { id, option } => {
                print_json(&client.voters_by_option(&id, &option).await?)
            }
        },
    }
}

/// Who is signed in, without the bearer tokens.
#[derive(Debug, Serialize)]
struct Identity<'a> {
    user_id: &'a str,
    email: &'a str,
    username: &'a str,
}

impl<'a> From<&'a Session> for Identity<'a> {
    fn from(session: &'a Session) -> Self {
        Self { user_id: &session.user_id, email: &session.email, username: &session.username }
    }
}

/// Printable session state.
#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum StateView<'a> {
    Loading,
    Authenticated { session: Identity<'a> },
    Unauthenticated,
}

impl<'a> From<&'a SessionState> for StateView<'a> {
    fn from(state: &'a SessionState) -> Self {
        match state {
            SessionState::Loading => Self::Loading,
            SessionState::Authenticated { session } => {
                Self::Authenticated { session: Identity::from(session) }
            }
            SessionState::Unauthenticated => Self::Unauthenticated,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Drain pending events and report whether a login redirect was requested.
fn login_requested(events: &mut broadcast::Receiver<SessionEvent>) -> bool {
    let mut requested = false;
    loop {
        match events.try_recv() {
            Ok(SessionEvent::Navigate { route: Route::Login }) => requested = true,
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    requested
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
