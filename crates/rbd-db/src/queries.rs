use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use uuid::Uuid;

use rbd_core::store::{ConditionalInsert, CooldownStore, FriendshipStore, HistoryStore, UserStore};
use rbd_types::models::{Cooldown, Friendship, FriendshipStatus, FriendshipUpdate, History, User, UserId};

use crate::Database;
use crate::models::{CooldownRow, FriendshipRow, HistoryRow, UserRow, to_ms};

const USER_COLUMNS: &str = "id, username, password, push_token, muted_all, created_ms";
const FRIENDSHIP_COLUMNS: &str =
    "id, user_a, user_b, status, requested_ms, accepted_ms, muted_a, muted_b, cooldown_a, cooldown_b";
const COOLDOWN_COLUMNS: &str = "id, initiator, target, triggered_ms, expires_ms";

// -- Users --

impl UserStore for Database {
    fn insert_user(&self, user: &User) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (id, username, password, push_token, muted_all, created_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id.to_string(),
                    user.username,
                    user.password_hash,
                    user.push_token,
                    user.muted_all,
                    to_ms(user.created_at),
                ],
            )?;
            Ok(inserted == 1)
        })
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id.to_string()))
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    fn set_muted_all(&self, id: UserId, muted_all: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET muted_all = ?2 WHERE id = ?1",
                params![id.to_string(), muted_all],
            )?;
            Ok(n == 1)
        })
    }

    fn set_push_token(&self, id: UserId, push_token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET push_token = ?2 WHERE id = ?1",
                params![id.to_string(), push_token],
            )?;
            Ok(n == 1)
        })
    }

    fn search_users(&self, prefix: &str, limit: usize) -> Result<Vec<User>> {
        // LIKE is case-insensitive for ASCII; usernames are ASCII only
        let pattern = format!("{}%", escape_like(prefix));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users WHERE username LIKE ?1 ESCAPE '\\' ORDER BY username LIMIT ?2",
                USER_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![pattern, limit as i64], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(User::try_from).collect()
        })
    }
}

fn query_user(conn: &Connection, filter: &str, value: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, filter))?;
    let row = stmt.query_row([value], map_user).optional()?;
    row.map(User::try_from).transpose()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        push_token: row.get(3)?,
        muted_all: row.get(4)?,
        created_ms: row.get(5)?,
    })
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// -- Friendships --

impl FriendshipStore for Database {
    fn insert_friendship_if_absent(&self, record: &Friendship) -> Result<ConditionalInsert<Friendship>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let key = pair_key(record.users.a, record.users.b);

            if let Some(existing) = query_friendship(&tx, "pair_key = ?1", &key)? {
                return Ok(ConditionalInsert::Existing(existing));
            }

            tx.execute(
                "INSERT INTO friendships
                    (id, pair_key, user_a, user_b, status, requested_ms, accepted_ms,
                     muted_a, muted_b, cooldown_a, cooldown_b)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.id.to_string(),
                    key,
                    record.users.a.to_string(),
                    record.users.b.to_string(),
                    record.status.as_str(),
                    to_ms(record.requested_at),
                    record.accepted_at.map(to_ms),
                    record.muted_peer.a,
                    record.muted_peer.b,
                    record.cooldown_minutes.a,
                    record.cooldown_minutes.b,
                ],
            )?;
            tx.commit()?;
            Ok(ConditionalInsert::Inserted)
        })
    }

    fn friendship_by_id(&self, id: Uuid) -> Result<Option<Friendship>> {
        self.with_conn(|conn| query_friendship(conn, "id = ?1", &id.to_string()))
    }

    fn friendship_between(&self, u: UserId, v: UserId) -> Result<Option<Friendship>> {
        self.with_conn(|conn| query_friendship(conn, "pair_key = ?1", &pair_key(u, v)))
    }

    fn update_friendship(&self, id: Uuid, update: FriendshipUpdate) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(mut record) = query_friendship(&tx, "id = ?1", &id.to_string())? else {
                return Ok(false);
            };
            if !update.apply(&mut record) {
                return Ok(false);
            }

            tx.execute(
                "UPDATE friendships
                 SET status = ?2, accepted_ms = ?3, muted_a = ?4, muted_b = ?5,
                     cooldown_a = ?6, cooldown_b = ?7
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    record.status.as_str(),
                    record.accepted_at.map(to_ms),
                    record.muted_peer.a,
                    record.muted_peer.b,
                    record.cooldown_minutes.a,
                    record.cooldown_minutes.b,
                ],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    fn delete_friendship(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM friendships WHERE id = ?1", [id.to_string()])?;
            Ok(n == 1)
        })
    }

    fn friendships_for(&self, user: UserId, status: FriendshipStatus) -> Result<Vec<Friendship>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM friendships
                 WHERE (user_a = ?1 OR user_b = ?1) AND status = ?2
                 ORDER BY requested_ms",
                FRIENDSHIP_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![user.to_string(), status.as_str()], map_friendship)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(Friendship::try_from).collect()
        })
    }
}

/// Order-independent key for the unordered pair.
fn pair_key(u: UserId, v: UserId) -> String {
    if u <= v { format!("{}:{}", u, v) } else { format!("{}:{}", v, u) }
}

fn query_friendship(conn: &Connection, filter: &str, value: &str) -> Result<Option<Friendship>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM friendships WHERE {}", FRIENDSHIP_COLUMNS, filter))?;
    let row = stmt.query_row([value], map_friendship).optional()?;
    row.map(Friendship::try_from).transpose()
}

fn map_friendship(row: &Row<'_>) -> rusqlite::Result<FriendshipRow> {
    Ok(FriendshipRow {
        id: row.get(0)?,
        user_a: row.get(1)?,
        user_b: row.get(2)?,
        status: row.get(3)?,
        requested_ms: row.get(4)?,
        accepted_ms: row.get(5)?,
        muted_a: row.get(6)?,
        muted_b: row.get(7)?,
        cooldown_a: row.get(8)?,
        cooldown_b: row.get(9)?,
    })
}

// -- Cooldowns --

impl CooldownStore for Database {
    fn insert_cooldown_if_idle(&self, record: &Cooldown) -> Result<ConditionalInsert<Cooldown>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if let Some(active) = query_active_cooldown(&tx, record.initiator, record.target, record.triggered_at)? {
                return Ok(ConditionalInsert::Existing(active));
            }

            tx.execute(
                "INSERT INTO cooldowns (id, initiator, target, triggered_ms, expires_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id.to_string(),
                    record.initiator.to_string(),
                    record.target.to_string(),
                    to_ms(record.triggered_at),
                    to_ms(record.expires_at),
                ],
            )?;
            tx.commit()?;
            Ok(ConditionalInsert::Inserted)
        })
    }

    fn active_cooldown(&self, initiator: UserId, target: UserId, now: DateTime<Utc>) -> Result<Option<Cooldown>> {
        self.with_conn(|conn| query_active_cooldown(conn, initiator, target, now))
    }

    fn set_cooldown_expiry(&self, id: Uuid, expires_at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE cooldowns SET expires_ms = ?2 WHERE id = ?1",
                params![id.to_string(), to_ms(expires_at)],
            )?;
            Ok(n == 1)
        })
    }

    fn delete_expired_cooldowns(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM cooldowns WHERE expires_ms < ?1", [to_ms(now)])?))
    }
}

fn query_active_cooldown(
    conn: &Connection,
    initiator: UserId,
    target: UserId,
    now: DateTime<Utc>,
) -> Result<Option<Cooldown>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM cooldowns
         WHERE initiator = ?1 AND target = ?2 AND expires_ms > ?3
         ORDER BY expires_ms DESC
         LIMIT 1",
        COOLDOWN_COLUMNS
    ))?;

    let row = stmt
        .query_row(params![initiator.to_string(), target.to_string(), to_ms(now)], |row| {
            Ok(CooldownRow {
                id: row.get(0)?,
                initiator: row.get(1)?,
                target: row.get(2)?,
                triggered_ms: row.get(3)?,
                expires_ms: row.get(4)?,
            })
        })
        .optional()?;

    row.map(Cooldown::try_from).transpose()
}

// -- History --

impl HistoryStore for Database {
    fn insert_history(&self, entry: &History) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO history (id, sender_id, receiver_id, sender_username, triggered_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.id.to_string(),
                    entry.sender_id.to_string(),
                    entry.receiver_id.to_string(),
                    entry.sender_username,
                    to_ms(entry.triggered_at),
                ],
            )?;
            Ok(())
        })
    }

    fn history_between(&self, u: UserId, v: UserId, offset: usize, limit: usize) -> Result<(Vec<History>, usize)> {
        let (u, v) = (u.to_string(), v.to_string());
        self.with_conn(|conn| {
            const PAIR: &str = "(sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)";

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM history WHERE {}", PAIR),
                params![u, v],
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT id, sender_id, receiver_id, sender_username, triggered_ms
                 FROM history
                 WHERE {}
                 ORDER BY triggered_ms DESC, rowid DESC
                 LIMIT ?3 OFFSET ?4",
                PAIR
            ))?;
            let rows = stmt
                .query_map(params![u, v, limit as i64, offset as i64], |row| {
                    Ok(HistoryRow {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        receiver_id: row.get(2)?,
                        sender_username: row.get(3)?,
                        triggered_ms: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let entries = rows.into_iter().map(History::try_from).collect::<Result<Vec<_>>>()?;
            Ok((entries, total as usize))
        })
    }
}
