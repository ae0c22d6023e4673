use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use radiotation_core::{
    next_turn, veto_target, Config, EntryId, Queue, QueueEntry, QueueError, QueueFilter, QueueId,
    QueueTrack, Room, RoomId, Rotate, Rotator, Track, TrackEntry, TrackId, User, UserId,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Connection, Decode, Executor, Row, Sqlite, SqliteConnection, Type};

use crate::normalize_name;

use super::schema::SCHEMA;
use super::{
    Database, DatabaseError, DatabaseResult, IntoDatabaseError, NewRoom, NewUser, Result, Writer,
};

/// A SQLite database implementation for radiotation.
///
/// All writes, and reads that must agree with concurrent writes, go through a
/// single [Writer]. Plain lookups of committed rows use a read-only pool.
pub struct SqliteDatabase {
    writer: Writer,
    readers: SqlitePool,
    config: Config,
}

impl SqliteDatabase {
    /// Opens or creates the database at `path`.
    pub async fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref();

        let options = SqliteConnectOptions::new()
            .filename(path)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let write_options = options
            .clone()
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let mut connection = SqliteConnection::connect_with(&write_options)
            .await
            .map_err(|e| e.any())?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&mut connection)
                .await
                .map_err(|e| e.any())?;
        }

        let readers = SqlitePoolOptions::new()
            .max_connections(config.read_connections.max(1))
            .connect_with(options.read_only(true))
            .await
            .map_err(|e| e.any())?;

        info!("Opened database at {}", path.display());

        Ok(Self {
            writer: Writer::spawn(connection, config.writer_capacity),
            readers,
            config,
        })
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn room(&self, room_id: &RoomId) -> Result<Room> {
        fetch_room(&self.readers, room_id).await
    }

    async fn search_rooms(&self, query: &str) -> Result<Vec<Room>> {
        let query = normalize_name(query);

        if query.is_empty() {
            return Ok(vec![]);
        }

        // Normalized names only contain [a-z0-9-], so there is nothing to escape
        let rows = sqlx::query(
            "SELECT id, display_name, rotator_type FROM rooms
            WHERE normalized_name LIKE ?
            ORDER BY display_name",
        )
        .bind(format!("%{}%", query))
        .fetch_all(&self.readers)
        .await
        .map_err(|e| e.any())?;

        rows.iter().map(room_from_row).collect()
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<Room> {
        let config = self.config.clone();

        self.writer
            .execute(move |conn| {
                Box::pin(async move {
                    let mut tx = conn.begin().await.map_err(|e| e.any())?;

                    let room_id = claim_room_id(&mut tx, &config).await?;
                    let rotator = Rotator::new(new_room.rotator);

                    sqlx::query(
                        "INSERT INTO rooms (id, display_name, normalized_name, rotator_type, rotator)
                        VALUES (?, ?, ?, ?, ?)",
                    )
                    .bind(room_id.as_str())
                    .bind(&new_room.display_name)
                    .bind(normalize_name(&new_room.display_name))
                    .bind(new_room.rotator.as_str())
                    .bind(rotator.encode()?)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| e.any())?;

                    tx.commit().await.map_err(|e| e.any())?;
                    info!("Created room {} ({})", room_id, new_room.display_name);

                    Ok(Room {
                        id: room_id,
                        display_name: new_room.display_name,
                        rotator: new_room.rotator,
                    })
                })
            })
            .await
    }

    async fn add_user_to_room(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        let queue_id = QueueId::new(room_id, user_id);

        self.writer
            .execute(move |conn| {
                Box::pin(async move {
                    let mut tx = conn.begin().await.map_err(|e| e.any())?;

                    let mut rotator = load_rotator(&mut tx, &queue_id.room_id).await?;
                    fetch_user(&mut *tx, &queue_id.user_id).await?;

                    fetch_queue_pointer(&mut tx, &queue_id)
                        .await
                        .conflict_or_ok(
                            "membership",
                            format!(
                                "{} is already in room {}",
                                queue_id.user_id, queue_id.room_id
                            ),
                        )?;

                    let join_order: i64 =
                        sqlx::query_scalar("SELECT COUNT(*) FROM queues WHERE room_id = ?")
                            .bind(queue_id.room_id.as_str())
                            .fetch_one(&mut *tx)
                            .await
                            .map_err(|e| e.any())?;

                    sqlx::query(
                        "INSERT INTO queues (room_id, user_id, join_order, next_entry_id)
                        VALUES (?, ?, ?, NULL)",
                    )
                    .bind(queue_id.room_id.as_str())
                    .bind(queue_id.user_id.as_str())
                    .bind(join_order)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| e.any())?;

                    rotator.add();
                    save_rotator(&mut tx, &queue_id.room_id, &rotator).await?;

                    tx.commit().await.map_err(|e| e.any())
                })
            })
            .await
    }

    async fn members(&self, room_id: &RoomId) -> Result<Vec<User>> {
        fetch_room(&self.readers, room_id).await?;

        let rows = sqlx::query(
            "SELECT users.id, users.display_name FROM queues
                INNER JOIN users ON users.id = queues.user_id
            WHERE queues.room_id = ?
            ORDER BY queues.join_order",
        )
        .bind(room_id.as_str())
        .fetch_all(&self.readers)
        .await
        .map_err(|e| e.any())?;

        rows.iter().map(user_from_row).collect()
    }

    async fn user(&self, user_id: &UserId) -> Result<User> {
        fetch_user(&self.readers, user_id).await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        self.writer
            .execute(move |conn| {
                Box::pin(async move {
                    fetch_user(&mut *conn, &new_user.id)
                        .await
                        .conflict_or_ok("user", format!("{} already exists", new_user.id))?;

                    sqlx::query("INSERT INTO users (id, display_name) VALUES (?, ?)")
                        .bind(new_user.id.as_str())
                        .bind(&new_user.display_name)
                        .execute(&mut *conn)
                        .await
                        .map_err(|e| e.any())?;

                    Ok(User {
                        id: new_user.id,
                        display_name: new_user.display_name,
                    })
                })
            })
            .await
    }

    async fn tracks(&self, queue_id: &QueueId, filter: QueueFilter) -> Result<Vec<QueueTrack>> {
        let queue_id = queue_id.clone();

        self.writer
            .execute(move |conn| {
                Box::pin(async move {
                    let next_to_serve = fetch_queue_pointer(&mut *conn, &queue_id).await?;

                    let rows = sqlx::query(
                        "SELECT queue_entries.*, tracks.track FROM queue_entries
                            INNER JOIN tracks ON tracks.id = queue_entries.track_id
                        WHERE room_id = ? AND user_id = ?",
                    )
                    .bind(queue_id.room_id.as_str())
                    .bind(queue_id.user_id.as_str())
                    .fetch_all(&mut *conn)
                    .await
                    .map_err(|e| e.any())?;

                    let mut entries = Vec::with_capacity(rows.len());
                    let mut tracks = std::collections::HashMap::with_capacity(rows.len());

                    for row in &rows {
                        let entry = entry_from_row(row)?;
                        let track = decode_track(&column::<String>(row, "track")?)?;

                        tracks.insert(entry.id.clone(), track);
                        entries.push(entry);
                    }

                    let queue = Queue::from_entries(entries, next_to_serve).map_err(|e| {
                        error!(
                            "Queue of {} in {} is broken: {}",
                            queue_id.user_id, queue_id.room_id, e
                        );
                        DatabaseError::from(e)
                    })?;

                    Ok(queue
                        .entries(filter)
                        .into_iter()
                        .filter_map(|e| {
                            tracks.remove(&e.id).map(|track| QueueTrack {
                                id: e.id.clone(),
                                played: e.played,
                                track,
                            })
                        })
                        .collect())
                })
            })
            .await
    }

    async fn add_track(
        &self,
        queue_id: &QueueId,
        track: Track,
        after: Option<EntryId>,
    ) -> Result<EntryId> {
        let queue_id = queue_id.clone();
        let id = EntryId::random(self.config.entry_id_length);

        self.writer
            .execute(move |conn| {
                Box::pin(async move {
                    let mut tx = conn.begin().await.map_err(|e| e.any())?;

                    let next_to_serve = fetch_queue_pointer(&mut tx, &queue_id).await?;

                    let next = match &after {
                        Some(after) => fetch_entry(&mut tx, &queue_id, after).await?.next,
                        None => fetch_head(&mut tx, &queue_id).await?,
                    };

                    if let Some(next) = &next {
                        if fetch_entry(&mut tx, &queue_id, next).await?.played {
                            return Err(QueueError::InsertBeforePlayed(next.clone()).into());
                        }
                    }

                    save_track(&mut tx, &track).await?;

                    sqlx::query(
                        "INSERT INTO queue_entries (id, previous_id, next_id, track_id, room_id, user_id, played)
                        VALUES (?, ?, ?, ?, ?, ?, 0)",
                    )
                    .bind(id.as_str())
                    .bind(after.as_ref().map(|a| a.as_str()))
                    .bind(next.as_ref().map(|n| n.as_str()))
                    .bind(track.id.as_str())
                    .bind(queue_id.room_id.as_str())
                    .bind(queue_id.user_id.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| e.any())?;

                    if let Some(after) = &after {
                        link_next(&mut tx, after, Some(&id)).await?;
                    }

                    if let Some(next) = &next {
                        link_previous(&mut tx, next, Some(&id)).await?;
                    }

                    // Everything was played, or the new entry now precedes the first unplayed one
                    if next_to_serve.is_none() || next_to_serve == next {
                        save_queue_pointer(&mut tx, &queue_id, Some(&id)).await?;
                    }

                    tx.commit().await.map_err(|e| e.any())?;
                    Ok(id)
                })
            })
            .await
    }

    async fn remove_track(&self, queue_id: &QueueId, entry_id: &EntryId) -> Result<()> {
        let queue_id = queue_id.clone();
        let entry_id = entry_id.clone();

        self.writer
            .execute(move |conn| {
                Box::pin(async move {
                    let mut tx = conn.begin().await.map_err(|e| e.any())?;

                    let next_to_serve = fetch_queue_pointer(&mut tx, &queue_id).await?;
                    let entry = fetch_entry(&mut tx, &queue_id, &entry_id).await?;

                    if entry.played {
                        return Err(QueueError::RemovePlayed(entry.id).into());
                    }

                    if let Some(previous) = &entry.previous {
                        link_next(&mut tx, previous, entry.next.as_ref()).await?;
                    }

                    if let Some(next) = &entry.next {
                        link_previous(&mut tx, next, entry.previous.as_ref()).await?;
                    }

                    sqlx::query("DELETE FROM queue_entries WHERE id = ?")
                        .bind(entry.id.as_str())
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| e.any())?;

                    if next_to_serve.as_ref() == Some(&entry.id) {
                        save_queue_pointer(&mut tx, &queue_id, entry.next.as_ref()).await?;
                    }

                    tx.commit().await.map_err(|e| e.any())
                })
            })
            .await
    }

    async fn next_track(&self, room_id: &RoomId) -> Result<(User, Track)> {
        let room_id = room_id.clone();

        self.writer
            .execute(move |conn| {
                Box::pin(async move {
                    let mut tx = conn.begin().await.map_err(|e| e.any())?;

                    let mut rotator = load_rotator(&mut tx, &room_id).await?;

                    let rows = sqlx::query(
                        "SELECT users.id, users.display_name, queues.next_entry_id FROM queues
                            INNER JOIN users ON users.id = queues.user_id
                        WHERE queues.room_id = ?
                        ORDER BY queues.join_order",
                    )
                    .bind(room_id.as_str())
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(|e| e.any())?;

                    let mut members = Vec::with_capacity(rows.len());
                    let mut candidates = Vec::with_capacity(rows.len());

                    for row in &rows {
                        members.push(user_from_row(row)?);
                        candidates.push(
                            column::<Option<String>>(row, "next_entry_id")?.map(EntryId::from),
                        );
                    }

                    let index = match next_turn(&mut rotator, &candidates) {
                        Ok(Some(index)) => index,
                        // Dropping the transaction leaves the rotator where it was
                        Ok(None) => return Err(DatabaseError::Exhausted),
                        Err(e) => {
                            error!(
                                "Rotator of room {} is out of sync with its members: {}",
                                room_id, e
                            );
                            return Err(e.into());
                        }
                    };

                    let user = members.swap_remove(index);
                    let entry_id = candidates.swap_remove(index).ok_or_else(|| {
                        DatabaseError::Integrity(
                            "picked a member with nothing to serve".to_string(),
                        )
                    })?;

                    let queue_id = QueueId::new(&room_id, &user.id);
                    let entry = fetch_entry(&mut tx, &queue_id, &entry_id).await.map_err(|e| {
                        error!("Next to serve of {} in {} is dangling: {}", user.id, room_id, e);
                        DatabaseError::Integrity(e.to_string())
                    })?;

                    sqlx::query("UPDATE queue_entries SET played = 1 WHERE id = ?")
                        .bind(entry.id.as_str())
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| e.any())?;

                    save_queue_pointer(&mut tx, &queue_id, entry.next.as_ref()).await?;
                    save_rotator(&mut tx, &room_id, &rotator).await?;

                    let track = fetch_track(&mut tx, &entry.track_id).await?;

                    sqlx::query(
                        "INSERT INTO history (room_id, user_id, track_id, vetoed, vetoed_by, played_at)
                        VALUES (?, ?, ?, 0, NULL, ?)",
                    )
                    .bind(room_id.as_str())
                    .bind(user.id.as_str())
                    .bind(track.id.as_str())
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| e.any())?;

                    tx.commit().await.map_err(|e| e.any())?;
                    Ok((user, track))
                })
            })
            .await
    }

    async fn history(&self, room_id: &RoomId) -> Result<Vec<TrackEntry>> {
        fetch_room(&self.readers, room_id).await?;

        let rows = sqlx::query(
            "SELECT history.*, tracks.track FROM history
                INNER JOIN tracks ON tracks.id = history.track_id
            WHERE room_id = ?
            ORDER BY history.id",
        )
        .bind(room_id.as_str())
        .fetch_all(&self.readers)
        .await
        .map_err(|e| e.any())?;

        rows.iter().map(history_from_row).collect()
    }

    async fn mark_vetoed(&self, room_id: &RoomId, user_id: &UserId) -> Result<TrackEntry> {
        let queue_id = QueueId::new(room_id, user_id);
        let config = self.config.clone();

        self.writer
            .execute(move |conn| {
                Box::pin(async move {
                    let mut tx = conn.begin().await.map_err(|e| e.any())?;

                    fetch_room(&mut *tx, &queue_id.room_id).await?;
                    // Only members get a say
                    fetch_queue_pointer(&mut tx, &queue_id).await?;

                    let member_count: i64 =
                        sqlx::query_scalar("SELECT COUNT(*) FROM queues WHERE room_id = ?")
                            .bind(queue_id.room_id.as_str())
                            .fetch_one(&mut *tx)
                            .await
                            .map_err(|e| e.any())?;

                    let cooldown = config.veto_cooldown(member_count as usize);

                    let rows = sqlx::query(
                        "SELECT history.*, tracks.track FROM history
                            INNER JOIN tracks ON tracks.id = history.track_id
                        WHERE room_id = ?
                        ORDER BY history.id DESC
                        LIMIT ?",
                    )
                    .bind(queue_id.room_id.as_str())
                    .bind(cooldown.max(1) as i64)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(|e| e.any())?;

                    let mut ids = Vec::with_capacity(rows.len());
                    let mut recent = Vec::with_capacity(rows.len());

                    for row in rows.iter().rev() {
                        ids.push(column::<i64>(row, "id")?);
                        recent.push(history_from_row(row)?);
                    }

                    let position = veto_target(&recent, &queue_id.user_id, cooldown)?;

                    sqlx::query("UPDATE history SET vetoed = 1, vetoed_by = ? WHERE id = ?")
                        .bind(queue_id.user_id.as_str())
                        .bind(ids[position])
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| e.any())?;

                    tx.commit().await.map_err(|e| e.any())?;

                    let mut entry = recent.swap_remove(position);
                    entry.vetoed = true;
                    entry.vetoed_by = Some(queue_id.user_id);

                    Ok(entry)
                })
            })
            .await
    }

    async fn close(&self) {
        self.writer.shutdown().await;
        self.readers.close().await;
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name).map_err(|e| e.any())
}

fn decode_track(json: &str) -> Result<Track> {
    serde_json::from_str(json)
        .map_err(|e| DatabaseError::Integrity(format!("stored track is unreadable: {}", e)))
}

fn room_from_row(row: &SqliteRow) -> Result<Room> {
    Ok(Room {
        id: RoomId::from(column::<String>(row, "id")?),
        display_name: column(row, "display_name")?,
        rotator: column::<String>(row, "rotator_type")?.parse()?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: UserId::from(column::<String>(row, "id")?),
        display_name: column(row, "display_name")?,
    })
}

fn entry_from_row(row: &SqliteRow) -> Result<QueueEntry> {
    Ok(QueueEntry {
        id: EntryId::from(column::<String>(row, "id")?),
        track_id: TrackId::from(column::<String>(row, "track_id")?),
        played: column(row, "played")?,
        previous: column::<Option<String>>(row, "previous_id")?.map(EntryId::from),
        next: column::<Option<String>>(row, "next_id")?.map(EntryId::from),
    })
}

fn history_from_row(row: &SqliteRow) -> Result<TrackEntry> {
    Ok(TrackEntry {
        user_id: UserId::from(column::<String>(row, "user_id")?),
        track: decode_track(&column::<String>(row, "track")?)?,
        vetoed: column(row, "vetoed")?,
        vetoed_by: column::<Option<String>>(row, "vetoed_by")?.map(UserId::from),
        played_at: column::<DateTime<Utc>>(row, "played_at")?,
    })
}

async fn fetch_room<'e, E>(executor: E, room_id: &RoomId) -> Result<Room>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT id, display_name, rotator_type FROM rooms WHERE id = ?")
        .bind(room_id.as_str())
        .fetch_one(executor)
        .await
        .map_err(|e| e.not_found_or("room", room_id))?;

    room_from_row(&row)
}

async fn fetch_user<'e, E>(executor: E, user_id: &UserId) -> Result<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT id, display_name FROM users WHERE id = ?")
        .bind(user_id.as_str())
        .fetch_one(executor)
        .await
        .map_err(|e| e.not_found_or("user", user_id))?;

    user_from_row(&row)
}

async fn fetch_track(conn: &mut SqliteConnection, track_id: &TrackId) -> Result<Track> {
    let json: String = sqlx::query_scalar("SELECT track FROM tracks WHERE id = ?")
        .bind(track_id.as_str())
        .fetch_one(conn)
        .await
        .map_err(|e| e.not_found_or("track", track_id))?;

    decode_track(&json)
}

async fn save_track(conn: &mut SqliteConnection, track: &Track) -> Result<()> {
    let json = serde_json::to_string(track).map_err(|e| DatabaseError::Internal(Box::new(e)))?;

    sqlx::query(
        "INSERT INTO tracks (id, track) VALUES (?, ?)
        ON CONFLICT (id) DO UPDATE SET track = excluded.track",
    )
    .bind(track.id.as_str())
    .bind(json)
    .execute(conn)
    .await
    .map_err(|e| e.any())?;

    Ok(())
}

async fn claim_room_id(conn: &mut SqliteConnection, config: &Config) -> Result<RoomId> {
    for _ in 0..config.room_code_attempts {
        let candidate = RoomId::code(config.room_code_length);

        let taken = sqlx::query("SELECT 1 FROM rooms WHERE id = ?")
            .bind(candidate.as_str())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| e.any())?;

        if taken.is_none() {
            return Ok(candidate);
        }
    }

    Err(DatabaseError::conflict(
        "room",
        format!(
            "no free room code after {} attempts",
            config.room_code_attempts
        ),
    ))
}

async fn load_rotator(conn: &mut SqliteConnection, room_id: &RoomId) -> Result<Rotator> {
    let state: String = sqlx::query_scalar("SELECT rotator FROM rooms WHERE id = ?")
        .bind(room_id.as_str())
        .fetch_one(conn)
        .await
        .map_err(|e| e.not_found_or("room", room_id))?;

    Ok(Rotator::decode(&state)?)
}

async fn save_rotator(
    conn: &mut SqliteConnection,
    room_id: &RoomId,
    rotator: &Rotator,
) -> Result<()> {
    sqlx::query("UPDATE rooms SET rotator = ? WHERE id = ?")
        .bind(rotator.encode()?)
        .bind(room_id.as_str())
        .execute(conn)
        .await
        .map_err(|e| e.any())?;

    Ok(())
}

/// Returns the next-to-serve pointer of a queue, failing if the member isn't in the room
async fn fetch_queue_pointer(
    conn: &mut SqliteConnection,
    queue_id: &QueueId,
) -> Result<Option<EntryId>> {
    let pointer: Option<String> =
        sqlx::query_scalar("SELECT next_entry_id FROM queues WHERE room_id = ? AND user_id = ?")
            .bind(queue_id.room_id.as_str())
            .bind(queue_id.user_id.as_str())
            .fetch_one(conn)
            .await
            .map_err(|e| {
                e.not_found_or(
                    "queue",
                    format!("{}/{}", queue_id.room_id, queue_id.user_id),
                )
            })?;

    Ok(pointer.map(EntryId::from))
}

async fn save_queue_pointer(
    conn: &mut SqliteConnection,
    queue_id: &QueueId,
    entry_id: Option<&EntryId>,
) -> Result<()> {
    sqlx::query("UPDATE queues SET next_entry_id = ? WHERE room_id = ? AND user_id = ?")
        .bind(entry_id.map(|e| e.as_str()))
        .bind(queue_id.room_id.as_str())
        .bind(queue_id.user_id.as_str())
        .execute(conn)
        .await
        .map_err(|e| e.any())?;

    Ok(())
}

async fn fetch_entry(
    conn: &mut SqliteConnection,
    queue_id: &QueueId,
    entry_id: &EntryId,
) -> Result<QueueEntry> {
    let row =
        sqlx::query("SELECT * FROM queue_entries WHERE id = ? AND room_id = ? AND user_id = ?")
            .bind(entry_id.as_str())
            .bind(queue_id.room_id.as_str())
            .bind(queue_id.user_id.as_str())
            .fetch_one(conn)
            .await
            .map_err(|e| e.not_found_or("queue entry", entry_id))?;

    entry_from_row(&row)
}

async fn fetch_head(conn: &mut SqliteConnection, queue_id: &QueueId) -> Result<Option<EntryId>> {
    let head: Option<String> = sqlx::query_scalar(
        "SELECT id FROM queue_entries WHERE room_id = ? AND user_id = ? AND previous_id IS NULL",
    )
    .bind(queue_id.room_id.as_str())
    .bind(queue_id.user_id.as_str())
    .fetch_optional(conn)
    .await
    .map_err(|e| e.any())?;

    Ok(head.map(EntryId::from))
}

async fn link_next(
    conn: &mut SqliteConnection,
    entry_id: &EntryId,
    next: Option<&EntryId>,
) -> Result<()> {
    sqlx::query("UPDATE queue_entries SET next_id = ? WHERE id = ?")
        .bind(next.map(|n| n.as_str()))
        .bind(entry_id.as_str())
        .execute(conn)
        .await
        .map_err(|e| e.any())?;

    Ok(())
}

async fn link_previous(
    conn: &mut SqliteConnection,
    entry_id: &EntryId,
    previous: Option<&EntryId>,
) -> Result<()> {
    sqlx::query("UPDATE queue_entries SET previous_id = ? WHERE id = ?")
        .bind(previous.map(|p| p.as_str()))
        .bind(entry_id.as_str())
        .execute(conn)
        .await
        .map_err(|e| e.any())?;

    Ok(())
}

#[cfg(test)]
mod test {
    use radiotation_core::RotatorKind;
    use tempfile::TempDir;

    use super::*;

    async fn open() -> (TempDir, SqliteDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radiotation.db");
        let database = SqliteDatabase::open(path, Config::default()).await.unwrap();

        (dir, database)
    }

    async fn room_with(db: &SqliteDatabase, kind: RotatorKind, members: &[&str]) -> RoomId {
        let room = db
            .create_room(NewRoom {
                display_name: "Rollback".to_string(),
                rotator: kind,
            })
            .await
            .unwrap();

        for id in members {
            let user = db
                .create_user(NewUser {
                    id: UserId::new(*id),
                    display_name: id.to_string(),
                })
                .await
                .unwrap();

            db.add_user_to_room(&room.id, &user.id).await.unwrap();
        }

        room.id
    }

    async fn stored_rotator(db: &SqliteDatabase, room_id: &RoomId) -> String {
        sqlx::query_scalar("SELECT rotator FROM rooms WHERE id = ?")
            .bind(room_id.as_str())
            .fetch_one(&db.readers)
            .await
            .unwrap()
    }

    async fn stored_pointer(db: &SqliteDatabase, queue_id: &QueueId) -> Option<String> {
        sqlx::query_scalar("SELECT next_entry_id FROM queues WHERE room_id = ? AND user_id = ?")
            .bind(queue_id.room_id.as_str())
            .bind(queue_id.user_id.as_str())
            .fetch_one(&db.readers)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_exhausted_room_keeps_rotator() {
        let (_dir, db) = open().await;
        let room_id = room_with(&db, RotatorKind::Shuffle, &["a", "b"]).await;

        let before = stored_rotator(&db, &room_id).await;

        for _ in 0..3 {
            assert!(matches!(
                db.next_track(&room_id).await,
                Err(DatabaseError::Exhausted)
            ));
        }

        assert_eq!(
            stored_rotator(&db, &room_id).await,
            before,
            "an exhausted room must not advance its rotator"
        );

        db.close().await;
    }

    #[tokio::test]
    async fn test_out_of_sync_rotator_changes_nothing() {
        let (_dir, db) = open().await;
        let room_id = room_with(&db, RotatorKind::RoundRobin, &["a"]).await;
        let queue_id = QueueId::new(&room_id, &UserId::new("a"));

        db.add_track(&queue_id, Track::new("t1", "One"), None)
            .await
            .unwrap();

        // Three slots for one member, with the cursor on a slot past the end
        let mut rotator = Rotator::with_seed(RotatorKind::RoundRobin, 0);
        (0..3).for_each(|_| rotator.add());
        rotator.next_index();
        let corrupt = rotator.encode().unwrap();

        let state = corrupt.clone();
        let id = room_id.clone();
        db.writer
            .execute(move |conn| {
                Box::pin(async move {
                    sqlx::query("UPDATE rooms SET rotator = ? WHERE id = ?")
                        .bind(state)
                        .bind(id.as_str())
                        .execute(conn)
                        .await
                        .map(|_| ())
                        .map_err(|e| e.any())
                })
            })
            .await
            .unwrap();

        let pointer = stored_pointer(&db, &queue_id).await;
        assert!(pointer.is_some());

        assert!(matches!(
            db.next_track(&room_id).await,
            Err(DatabaseError::Integrity(_))
        ));

        assert_eq!(stored_rotator(&db, &room_id).await, corrupt);
        assert_eq!(stored_pointer(&db, &queue_id).await, pointer);
        assert!(db.history(&room_id).await.unwrap().is_empty());

        let unplayed = db
            .tracks(&queue_id, QueueFilter::UnplayedOnly)
            .await
            .unwrap();
        assert_eq!(unplayed.len(), 1);

        db.close().await;
    }
}
