use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use radiotation_collab::{Collab, CollabError, Database};
use radiotation_core::{
    EntryId, QueueFilter, QueueId, QueueTrack, RoomId, RotatorKind, Track, TrackEntry, TrackId,
    User, UserId,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "radiotation")]
#[command(about = "Rooms where everyone takes turns picking the music", long_about = None)]
pub struct Cli {
    /// Path to the SQLite database, created if it doesn't exist
    #[arg(
        short,
        long,
        env = "RADIOTATION_DATABASE",
        default_value = "radiotation.db"
    )]
    pub database: PathBuf,

    /// JSON file with the tracks that can be queued
    #[arg(short, long, env = "RADIOTATION_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a room
    CreateRoom {
        name: String,
        /// round-robin, shuffle or random
        #[arg(long, default_value = "round-robin")]
        rotator: RotatorKind,
    },
    /// Register a user
    AddUser { id: String, name: String },
    /// Make a user a member of a room
    Join { room: String, user: String },
    /// Search rooms by name
    Rooms { query: String },
    /// List the members of a room in join order
    Members { room: String },
    /// Search the catalog
    Tracks { query: String },
    /// Add a catalog track to a member's queue
    Add {
        room: String,
        user: String,
        track: String,
        /// Entry to insert after, the track goes to the front when omitted
        #[arg(long)]
        after: Option<String>,
    },
    /// Remove an unplayed entry from a member's queue
    Remove {
        room: String,
        user: String,
        entry: String,
    },
    /// Show a member's queue
    Queue {
        room: String,
        user: String,
        #[arg(long, value_enum, default_value_t = Filter::All)]
        filter: Filter,
    },
    /// Serve the next track of a room
    Next { room: String },
    /// Veto the track that was served last, and serve a replacement
    Veto { room: String, user: String },
    /// Show everything that was served in a room
    History { room: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Filter {
    All,
    Played,
    Unplayed,
}

impl From<Filter> for QueueFilter {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::All => QueueFilter::All,
            Filter::Played => QueueFilter::PlayedOnly,
            Filter::Unplayed => QueueFilter::UnplayedOnly,
        }
    }
}

/// Writes command results to stdout, either for people or as JSON
pub struct Output {
    pub json: bool,
}

impl Output {
    fn print<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) {
        if !self.json {
            return human(value);
        }

        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("Could not serialize output: {}", e),
        }
    }
}

pub async fn execute<Db: Database>(
    command: Command,
    collab: &Collab<Db>,
    output: &Output,
) -> Result<(), CollabError> {
    match command {
        Command::CreateRoom { name, rotator } => {
            let room = collab.rooms.create(&name, rotator).await?;

            output.print(&room, |room| {
                println!(
                    "Created {} with code {} ({})",
                    room.display_name.bold(),
                    room.id.as_str().bright_green().bold(),
                    room.rotator
                )
            });
        }
        Command::AddUser { id, name } => {
            let user = collab.users.register(UserId::new(id), &name).await?;
            output.print(&user, print_user);
        }
        Command::Join { room, user } => {
            let user = collab
                .rooms
                .join(&RoomId::new(room.clone()), &UserId::new(user))
                .await?;

            output.print(&user, |user| {
                println!("{} joined {}", user.display_name.bold(), room)
            });
        }
        Command::Rooms { query } => {
            let rooms = collab.rooms.search(&query).await?;

            output.print(&rooms, |rooms| {
                for room in rooms {
                    println!(
                        "{} {} ({})",
                        room.id.as_str().bright_green(),
                        room.display_name,
                        room.rotator
                    );
                }
            });
        }
        Command::Members { room } => {
            let members = collab.rooms.members(&RoomId::new(room)).await?;
            output.print(&members, |members| members.iter().for_each(print_user));
        }
        Command::Tracks { query } => {
            let tracks = collab.queues.search_tracks(&query).await?;
            output.print(&tracks, |tracks| tracks.iter().for_each(print_track));
        }
        Command::Add {
            room,
            user,
            track,
            after,
        } => {
            let queue_id = QueueId::new(&RoomId::new(room), &UserId::new(user));
            let entry_id = collab
                .queues
                .add(&queue_id, &TrackId::new(track), after.map(EntryId::new))
                .await?;

            output.print(&entry_id, |entry_id| println!("Queued as {}", entry_id));
        }
        Command::Remove { room, user, entry } => {
            let queue_id = QueueId::new(&RoomId::new(room), &UserId::new(user));
            let entry_id = EntryId::new(entry);

            collab.queues.remove(&queue_id, &entry_id).await?;
            output.print(&entry_id, |entry_id| println!("Removed {}", entry_id));
        }
        Command::Queue { room, user, filter } => {
            let queue_id = QueueId::new(&RoomId::new(room), &UserId::new(user));
            let tracks = collab.queues.list(&queue_id, filter.into()).await?;

            output.print(&tracks, |tracks| tracks.iter().for_each(print_queue_track));
        }
        Command::Next { room } => {
            let (user, track) = collab.rooms.next_track(&RoomId::new(room)).await?;
            output.print(&(user, track), print_now_playing);
        }
        Command::Veto { room, user } => {
            let room_id = RoomId::new(room);

            match collab.rooms.veto(&room_id, &UserId::new(user)).await {
                Ok(veto) => {
                    let served = (veto.user, veto.track);

                    output.print(&(veto.vetoed, &served), |(vetoed, served)| {
                        print_vetoed(vetoed);
                        print_now_playing(served);
                    });
                }
                Err(CollabError::NoTracksLeft) => {
                    // The veto itself went through
                    let history = collab.rooms.history(&room_id).await?;

                    if let Some(vetoed) = history.last() {
                        output.print(vetoed, print_vetoed);
                    }

                    return Err(CollabError::NoTracksLeft);
                }
                Err(e) => return Err(e),
            }
        }
        Command::History { room } => {
            let history = collab.rooms.history(&RoomId::new(room)).await?;
            output.print(&history, |history| history.iter().for_each(print_history));
        }
    }

    Ok(())
}

fn print_user(user: &User) {
    println!("{} {}", user.id.as_str().bright_black(), user.display_name);
}

fn print_track(track: &Track) {
    let artists = track.artist_line();

    if artists.is_empty() {
        println!("{} {}", track.id.as_str().bright_black(), track.name.bold());
    } else {
        println!(
            "{} {} - {}",
            track.id.as_str().bright_black(),
            track.name.bold(),
            artists
        );
    }
}

fn print_queue_track(queued: &QueueTrack) {
    let line = format!("{} {}", queued.id, queued.track.name);

    if queued.played {
        println!("{} {}", "played".bright_black(), line.bright_black());
    } else {
        println!("{} {}", "queued".bright_blue(), line);
    }
}

fn print_now_playing((user, track): &(User, Track)) {
    println!(
        "{} {} from {}",
        "Now playing".bright_green().bold(),
        track.name.bold(),
        user.display_name
    );
}

fn print_vetoed(entry: &TrackEntry) {
    let by = entry.vetoed_by.as_ref().map(|u| u.as_str()).unwrap_or("?");
    println!("{} {} (by {})", "Vetoed".red().bold(), entry.track.name, by);
}

fn print_history(entry: &TrackEntry) {
    let time = entry.played_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let name = if entry.vetoed {
        entry.track.name.strikethrough().to_string()
    } else {
        entry.track.name.clone()
    };

    println!("{} {} from {}", time.bright_black(), name, entry.user_id);
}
