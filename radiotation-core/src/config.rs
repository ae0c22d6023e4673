/// The configuration of the queue engine
#[derive(Debug, Clone)]
pub struct Config {
    /// The length of the codes rooms are identified by
    pub room_code_length: usize,
    /// How many codes to try before giving up on creating a room
    pub room_code_attempts: usize,
    /// The length of queue entry ids
    pub entry_id_length: usize,
    /// A member can veto once every `factor * members` served tracks
    pub veto_cooldown_factor: usize,
    /// How many jobs can wait for the writer before submitters have to wait
    pub writer_capacity: usize,
    /// How many read-only connections to keep open
    pub read_connections: u32,
}

impl Config {
    /// How many of the most recent tracks a member has to wait out between vetoes
    pub fn veto_cooldown(&self, member_count: usize) -> usize {
        self.veto_cooldown_factor * member_count
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // 26^4 codes is plenty for a single instance
            room_code_length: 4,
            room_code_attempts: 100,
            entry_id_length: 32,
            veto_cooldown_factor: 2,
            writer_capacity: 64,
            read_connections: 4,
        }
    }
}
