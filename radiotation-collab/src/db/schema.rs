/// Statements run on every open, in order.
pub(super) const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS rooms (
        id TEXT PRIMARY KEY NOT NULL,
        display_name TEXT NOT NULL,
        normalized_name TEXT NOT NULL,
        rotator_type TEXT NOT NULL,
        rotator TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS rooms_normalized_name ON rooms (normalized_name)",
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY NOT NULL,
        display_name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tracks (
        id TEXT PRIMARY KEY NOT NULL,
        track TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS queues (
        room_id TEXT NOT NULL REFERENCES rooms (id),
        user_id TEXT NOT NULL REFERENCES users (id),
        join_order INTEGER NOT NULL,
        next_entry_id TEXT,
        PRIMARY KEY (room_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS queue_entries (
        id TEXT PRIMARY KEY NOT NULL,
        previous_id TEXT,
        next_id TEXT,
        track_id TEXT NOT NULL REFERENCES tracks (id),
        room_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        played INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY (room_id, user_id) REFERENCES queues (room_id, user_id)
    )",
    "CREATE INDEX IF NOT EXISTS queue_entries_queue ON queue_entries (room_id, user_id)",
    "CREATE TABLE IF NOT EXISTS history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        room_id TEXT NOT NULL REFERENCES rooms (id),
        user_id TEXT NOT NULL REFERENCES users (id),
        track_id TEXT NOT NULL REFERENCES tracks (id),
        vetoed INTEGER NOT NULL DEFAULT 0,
        vetoed_by TEXT REFERENCES users (id),
        played_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS history_room ON history (room_id, id)",
];
