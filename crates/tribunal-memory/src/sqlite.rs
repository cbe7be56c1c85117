use chrono::SecondsFormat;
use rusqlite::Connection;
use tribunal_models::agent_message::SpecialistEstimate;

use crate::error::MemoryError;

/// Schema for the signal history table.
///
/// `recorded_at` is fixed-width RFC 3339 (microseconds, `Z`) so that string
/// order matches time order.
pub const SIGNAL_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS signal_history (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    market_id        TEXT NOT NULL,
    agent_name       TEXT NOT NULL,
    recorded_at      TEXT NOT NULL,
    fair_probability REAL NOT NULL,
    confidence       REAL NOT NULL,
    estimate_json    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_signal_market_agent
    ON signal_history(market_id, agent_name, recorded_at);
";

/// SQLite signal history accessor.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the history database. Creates the schema and enables WAL
    /// so readers are not blocked while a run writes back its estimates.
    pub fn open(path: &str) -> Result<Self, MemoryError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SIGNAL_TABLE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SIGNAL_TABLE_DDL)?;
        Ok(Self { conn })
    }

    /// Newest-first history for one specialist on one market.
    pub fn recent(
        &self,
        market_id: &str,
        agent_name: &str,
        limit: usize,
    ) -> Result<Vec<SpecialistEstimate>, MemoryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT estimate_json FROM signal_history \
             WHERE market_id = ?1 AND agent_name = ?2 \
             ORDER BY recorded_at DESC, id DESC LIMIT ?3",
        )?;

        let rows = stmt
            .query_map(
                rusqlite::params![market_id, agent_name, limit as i64],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(MemoryError::from))
            .collect()
    }

    /// Insert a batch of estimates within one transaction.
    pub fn insert_batch(
        &mut self,
        market_id: &str,
        estimates: &[SpecialistEstimate],
    ) -> Result<(), MemoryError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO signal_history \
                 (market_id, agent_name, recorded_at, fair_probability, confidence, estimate_json) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for estimate in estimates {
                stmt.execute(rusqlite::params![
                    market_id,
                    estimate.agent_name,
                    estimate
                        .timestamp
                        .to_rfc3339_opts(SecondsFormat::Micros, true),
                    estimate.fair_probability,
                    estimate.confidence,
                    serde_json::to_string(estimate)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Count stored estimates for a market.
    pub fn count(&self, market_id: &str) -> Result<usize, MemoryError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM signal_history WHERE market_id = ?1",
            rusqlite::params![market_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
