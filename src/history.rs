use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::warn;

use crate::model::PredictionResult;
use crate::store;

/// Local record of every prediction shown, real or synthetic.
pub struct PredictionLog {
    conn: Connection,
}

impl PredictionLog {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = store::open_db(path)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite")?;
        store::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn append(&self, prediction: &PredictionResult) -> Result<()> {
        let payload = serde_json::to_string(prediction).context("serialize prediction")?;
        let created_at = prediction
            .timestamp
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339());
        self.conn
            .execute(
                "INSERT INTO prediction_history
                 (created_at, home_team, away_team, league, is_mock, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    created_at,
                    prediction.home_team,
                    prediction.away_team,
                    prediction.league,
                    bool_to_i64(prediction.is_mock),
                    payload
                ],
            )
            .context("insert prediction history")?;
        Ok(())
    }

    /// Newest first. Rows whose payload no longer decodes are skipped.
    pub fn recent(&self, limit: usize) -> Result<Vec<PredictionResult>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, payload FROM prediction_history ORDER BY id DESC LIMIT ?1")?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, payload) = row?;
            match serde_json::from_str::<PredictionResult>(&payload) {
                Ok(prediction) => out.push(prediction),
                Err(err) => warn!(id, "skipping undecodable history row: {err}"),
            }
        }
        Ok(out)
    }

    pub fn len(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM prediction_history", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
