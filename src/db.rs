use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::path::Path;
use uuid::Uuid;

use crate::models::{Evaluation, EvaluationStatus, Metrics};

const EVALUATION_COLUMNS: &str =
    "id, agent_card_url, chat_url, status, metrics, html_report, error, created_at, updated_at";

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub struct Database {
    conn: Connection,
    name: String,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "memory".to_string());
        Self::init(conn, name)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, "memory".to_string())
    }

    fn init(conn: Connection, name: String) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS evaluation (
                id TEXT PRIMARY KEY,
                agent_card_url TEXT NOT NULL,
                chat_url TEXT,
                status TEXT NOT NULL DEFAULT 'queued',
                metrics TEXT,
                html_report TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_evaluation_status ON evaluation(status);
            CREATE INDEX IF NOT EXISTS idx_evaluation_created_at ON evaluation(created_at);
        "#,
        )?;

        Ok(Database { conn, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a new evaluation in the `running` state.
    pub fn create_evaluation(
        &self,
        agent_card_url: &str,
        chat_url: Option<&str>,
    ) -> Result<Evaluation> {
        let id = Uuid::new_v4().to_string();
        let created_at = now();
        let status = EvaluationStatus::Running;

        self.conn.execute(
            "INSERT INTO evaluation (id, agent_card_url, chat_url, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, agent_card_url, chat_url, status.as_str(), created_at],
        )?;

        Ok(Evaluation {
            id,
            agent_card_url: agent_card_url.to_string(),
            chat_url: chat_url.map(|s| s.to_string()),
            status,
            metrics: None,
            html_report: None,
            error: None,
            updated_at: created_at.clone(),
            created_at,
        })
    }

    /// Completed and failed are terminal; updating such a record is a no-op.
    pub fn complete_evaluation(&self, id: &str, metrics: &Metrics, html_report: &str) -> Result<()> {
        let metrics_str = serde_json::to_string(metrics)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        let updated_at = now();

        self.conn.execute(
            "UPDATE evaluation SET status = ?1, metrics = ?2, html_report = ?3, error = NULL, updated_at = ?4 WHERE id = ?5 AND status IN ('queued', 'running')",
            params![
                EvaluationStatus::Completed.as_str(),
                metrics_str,
                html_report,
                updated_at,
                id
            ],
        )?;
        Ok(())
    }

    pub fn fail_evaluation(&self, id: &str, error: Option<&str>) -> Result<()> {
        let updated_at = now();
        self.conn.execute(
            "UPDATE evaluation SET status = ?1, error = ?2, updated_at = ?3 WHERE id = ?4 AND status IN ('queued', 'running')",
            params![EvaluationStatus::Failed.as_str(), error, updated_at, id],
        )?;
        Ok(())
    }

    pub fn get_evaluation(&self, id: &str) -> Result<Option<Evaluation>> {
        let sql = format!("SELECT {} FROM evaluation WHERE id = ?1", EVALUATION_COLUMNS);
        self.conn
            .query_row(&sql, params![id], row_to_evaluation)
            .optional()
    }

    /// Most recent evaluations first.
    pub fn list_evaluations(&self, limit: usize) -> Result<Vec<Evaluation>> {
        let sql = format!(
            "SELECT {} FROM evaluation ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            EVALUATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], row_to_evaluation)?;
        rows.collect()
    }

    /// Names of the user tables, for diagnostics.
    pub fn list_collections(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }
}

fn row_to_evaluation(row: &Row<'_>) -> Result<Evaluation> {
    let status_str: String = row.get(3)?;
    let status = status_str.parse::<EvaluationStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })?;

    let metrics_str: Option<String> = row.get(4)?;
    let metrics = metrics_str
        .map(|s| serde_json::from_str::<Metrics>(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Evaluation {
        id: row.get(0)?,
        agent_card_url: row.get(1)?,
        chat_url: row.get(2)?,
        status,
        metrics,
        html_report: row.get(5)?,
        error: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
