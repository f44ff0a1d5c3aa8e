use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Timestamps are stored as integer milliseconds since the epoch. Friendship
/// slot columns are suffixed `_a`/`_b`; slot A is the requester.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                push_token  TEXT,
                muted_all   INTEGER NOT NULL DEFAULT 0,
                created_ms  INTEGER NOT NULL
            );

            CREATE TABLE friendships (
                id            TEXT PRIMARY KEY,
                pair_key      TEXT NOT NULL UNIQUE,
                user_a        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                user_b        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status        TEXT NOT NULL DEFAULT 'pending',
                requested_ms  INTEGER NOT NULL,
                accepted_ms   INTEGER,
                muted_a       INTEGER NOT NULL DEFAULT 0,
                muted_b       INTEGER NOT NULL DEFAULT 0,
                cooldown_a    INTEGER NOT NULL DEFAULT 60,
                cooldown_b    INTEGER NOT NULL DEFAULT 60
            );

            CREATE INDEX idx_friendships_user_a ON friendships(user_a, status);
            CREATE INDEX idx_friendships_user_b ON friendships(user_b, status);

            CREATE TABLE cooldowns (
                id            TEXT PRIMARY KEY,
                initiator     TEXT NOT NULL,
                target        TEXT NOT NULL,
                triggered_ms  INTEGER NOT NULL,
                expires_ms    INTEGER NOT NULL
            );

            CREATE INDEX idx_cooldowns_pair ON cooldowns(initiator, target, expires_ms);
            CREATE INDEX idx_cooldowns_expiry ON cooldowns(expires_ms);

            CREATE TABLE history (
                id               TEXT PRIMARY KEY,
                sender_id        TEXT NOT NULL,
                receiver_id      TEXT NOT NULL,
                sender_username  TEXT NOT NULL,
                triggered_ms     INTEGER NOT NULL
            );

            CREATE INDEX idx_history_pair ON history(sender_id, receiver_id, triggered_ms);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
