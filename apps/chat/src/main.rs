mod command;
mod view;

use anyhow::{Context, Result};
use clap::Parser;
use parlor_chats::{Room, Sender};
use parlor_client::{ClientError, SessionUpdate, ViewState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::command::Command;
use crate::view::TerminalView;

/// Chat in Parlor rooms from the terminal.
#[derive(Debug, Parser)]
#[command(name = "parlor-chat", version)]
struct Cli {
    /// Server base url, overriding `client.base_url`
    #[arg(long)]
    server: Option<String>,

    /// Your user id
    #[arg(long)]
    user_id: String,

    /// Display name; defaults to the user id
    #[arg(long)]
    name: Option<String>,

    /// Room to join on start
    #[arg(long)]
    room: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = parlor_config::load().context("failed to load configuration")?;
    if let Some(server) = cli.server {
        config.client.base_url = server;
    }

    let http = reqwest::Client::new();
    let rooms = fetch_rooms(&http, &config.client.base_url).await?;

    let user = Sender::new(cli.user_id.clone(), cli.name.unwrap_or(cli.user_id));
    let mut session = parlor_client::connect(&config.client, user);
    let mut view = TerminalView::default();

    println!("connected to {} as {}", config.client.base_url, session.user().name);
    print_rooms(&rooms);
    if let Some(room) = cli.room {
        join(&mut session, &mut view, &rooms, &room)?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match Command::parse(&line) {
                    Command::Quit => break,
                    Command::Rooms => print_rooms(&rooms),
                    Command::Join(room) => join(&mut session, &mut view, &rooms, &room)?,
                    Command::Leave => {
                        session.leave()?;
                        view.reset();
                        println!("left room");
                    }
                    Command::Who => {
                        let names: Vec<&str> =
                            session.participants().iter().map(|u| u.name.as_str()).collect();
                        println!("online: {}", names.join(", "));
                    }
                    Command::Say(body) => match session.send(&body) {
                        Ok(_) => {}
                        Err(ClientError::NoRoom) => println!("join a room first: /join <room>"),
                        Err(ClientError::EmptyMessage) => {}
                        Err(error) => return Err(error.into()),
                    },
                    Command::Empty => {}
                    Command::Unknown(input) => println!("unknown command {input}, try /help"),
                    Command::Help => println!("{}", command::HELP),
                }
            }
            update = session.next_update() => {
                let Some(update) = update else {
                    println!("connection closed");
                    break;
                };
                report(&update, session.view_state());
                if session.take_autoscroll() {
                    for line in view.fresh_lines(&session.render()) {
                        println!("{line}");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn fetch_rooms(http: &reqwest::Client, base_url: &str) -> Result<Vec<Room>> {
    let url = format!("{}/api/rooms", base_url.trim_end_matches('/'));
    http.get(&url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .with_context(|| format!("failed to list rooms from {url}"))?
        .json()
        .await
        .context("failed to decode room list")
}

fn print_rooms(rooms: &[Room]) {
    if rooms.is_empty() {
        println!("no rooms on this server");
        return;
    }
    println!("rooms:");
    for room in rooms {
        println!("  {:<16} {}", room.id, room.name);
    }
}

fn join<H, R>(
    session: &mut parlor_client::RoomSession<H, R>,
    view: &mut TerminalView,
    rooms: &[Room],
    wanted: &str,
) -> Result<()>
where
    H: parlor_client::HistorySource + 'static,
    R: parlor_client::Realtime,
{
    let Some(room) = rooms
        .iter()
        .find(|room| room.id == wanted || room.name.eq_ignore_ascii_case(wanted))
    else {
        println!("no such room: {wanted}");
        return Ok(());
    };

    view.reset();
    println!("-- {} --", room.name);
    session.select_room(Some(room.clone()))?;
    Ok(())
}

fn report(update: &SessionUpdate, state: &ViewState) {
    match update {
        SessionUpdate::HistoryFailed { error, .. } => println!("could not load history: {error}"),
        SessionUpdate::HistoryLoaded { count: 0, .. } => println!("no messages yet"),
        SessionUpdate::ServerError(message) => println!("server: {message}"),
        SessionUpdate::SendDropped { .. } => println!("a queued message could not be delivered"),
        SessionUpdate::ConnectionLost => println!("connection lost, reconnecting..."),
        SessionUpdate::ConnectionRestored => println!("reconnected"),
        _ => {}
    }
    if let ViewState::Error(error) = state {
        tracing::debug!(%error, "session in error state");
    }
}
