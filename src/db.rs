use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::normalize::NormalizedRecord;

/// Channels seeded by `init`. The pipeline never creates channels itself.
pub const SEED_CHANNELS: [&str; 9] = [
    "MBC",
    "SBS",
    "JTBC",
    "TVN",
    "KBS",
    "MNET",
    "CHANNEL S",
    "YOUTUBE",
    "TV ING",
];

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

/// Open an existing, initialized database without writing to it. `None` when
/// the file is missing or `init` never created the tables; nothing is created
/// on disk either way.
pub fn connect_read_only(path: &str) -> Result<Option<Connection>> {
    if !Path::new(path).is_file() {
        return Ok(None);
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open {:?} read-only", path))?;
    let initialized: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'tv_channel')",
        [],
        |row| row.get(0),
    )?;
    Ok(initialized.then_some(conn))
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tv_channel (
            id    INTEGER PRIMARY KEY,
            name  TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS tv_show (
            id            INTEGER PRIMARY KEY,
            title         TEXT NOT NULL,
            description   TEXT,
            tv_channel_id INTEGER NOT NULL REFERENCES tv_channel(id)
        );
        CREATE INDEX IF NOT EXISTS idx_show_title ON tv_show(title);

        CREATE TABLE IF NOT EXISTS tv_episode (
            id           INTEGER PRIMARY KEY,
            name         TEXT NOT NULL,
            publish_date TEXT,
            tv_show_id   INTEGER NOT NULL REFERENCES tv_show(id),
            source_link  TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_episode_show ON tv_episode(tv_show_id);
        ",
    )?;
    Ok(())
}

pub fn seed_channels(conn: &Connection) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO tv_channel (name) VALUES (?1)")?;
        for name in SEED_CHANNELS {
            count += stmt.execute(params![name])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Reference data ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: i64,
    pub name: String,
}

pub fn load_channels(conn: &Connection) -> Result<Vec<Channel>, PersistenceError> {
    let mut stmt = conn.prepare("SELECT id, name FROM tv_channel ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Channel {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// `(id, title)` of every show.
pub fn load_shows(conn: &Connection) -> Result<Vec<(i64, String)>, PersistenceError> {
    let mut stmt = conn.prepare("SELECT id, title FROM tv_show")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Upsert ──

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub shows_created: usize,
    pub episodes: usize,
}

/// Attach every record to its show (reused by exact title, created when
/// missing) and insert one episode per record, all in one transaction.
///
/// Show lookup happens before insert inside this transaction only; two runs
/// writing at the same time can still both create the same title.
pub fn store(
    conn: &mut Connection,
    records: &[NormalizedRecord],
) -> Result<StoreStats, PersistenceError> {
    let tx = conn.transaction()?;

    let channel_ids: HashMap<String, i64> = load_channels(&tx)?
        .into_iter()
        .map(|c| (c.name, c.id))
        .collect();
    let mut show_ids: HashMap<String, i64> = load_shows(&tx)?
        .into_iter()
        .map(|(id, title)| (title, id))
        .collect();

    let mut stats = StoreStats::default();
    {
        let mut show_stmt = tx.prepare(
            "INSERT INTO tv_show (title, description, tv_channel_id) VALUES (?1, ?2, ?3)",
        )?;
        let mut episode_stmt = tx.prepare(
            "INSERT INTO tv_episode (name, publish_date, tv_show_id, source_link)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        for r in records {
            let show_id = match show_ids.get(&r.show_title) {
                Some(&id) => id,
                None => {
                    let channel_id = channel_ids
                        .get(&r.channel_name)
                        .copied()
                        .or(r.channel_id)
                        .ok_or_else(|| PersistenceError::UnknownChannel(r.channel_name.clone()))?;
                    let id = show_stmt.insert(params![r.show_title, r.description, channel_id])?;
                    debug!(show = %r.show_title, id, "Created show");
                    show_ids.insert(r.show_title.clone(), id);
                    stats.shows_created += 1;
                    id
                }
            };

            episode_stmt.execute(params![
                r.episode_label,
                r.publish_date,
                show_id,
                r.source_link_csv,
            ])?;
            stats.episodes += 1;
        }
    }
    tx.commit()?;

    info!(
        "Stored {} episodes ({} new shows)",
        stats.episodes, stats.shows_created
    );
    Ok(stats)
}

// ── Reporting ──

pub struct Stats {
    pub channels: usize,
    pub shows: usize,
    pub episodes: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let channels: usize = conn.query_row("SELECT COUNT(*) FROM tv_channel", [], |r| r.get(0))?;
    let shows: usize = conn.query_row("SELECT COUNT(*) FROM tv_show", [], |r| r.get(0))?;
    let episodes: usize = conn.query_row("SELECT COUNT(*) FROM tv_episode", [], |r| r.get(0))?;
    Ok(Stats {
        channels,
        shows,
        episodes,
    })
}

#[derive(Debug, Serialize)]
pub struct ShowRow {
    pub title: String,
    pub channel: Option<String>,
    pub episodes: usize,
}

pub fn list_shows(conn: &Connection) -> Result<Vec<ShowRow>> {
    let mut stmt = conn.prepare(
        "SELECT s.title, c.name, COUNT(e.id)
         FROM tv_show s
         LEFT JOIN tv_channel c ON c.id = s.tv_channel_id
         LEFT JOIN tv_episode e ON e.tv_show_id = s.id
         GROUP BY s.id
         ORDER BY s.title",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ShowRow {
                title: row.get(0)?,
                channel: row.get(1)?,
                episodes: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
