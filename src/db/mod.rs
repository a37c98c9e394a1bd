pub mod models;

use models::{PublishedSnippet, User};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub struct Database {
    conn: Mutex<Connection>,
}

fn snippet_from_row(row: &Row<'_>) -> Result<PublishedSnippet> {
    Ok(PublishedSnippet {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        html_content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn user_from_row(row: &Row<'_>) -> Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        salt: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// True when `err` is a UNIQUE/PRIMARY KEY violation.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    )
}

impl Database {
    pub fn new(data_dir: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).ok();
        let db_path = data_dir.join("probsolver.db");
        let conn = Connection::open(db_path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS published_codes (
                id TEXT PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                description TEXT,
                html_content TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                salt TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS auth_sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            ",
        )?;
        Ok(())
    }

    // ── Published snippets ──

    pub fn publish_snippet(
        &self,
        slug: &str,
        title: &str,
        description: Option<&str>,
        html_content: &str,
    ) -> Result<PublishedSnippet> {
        let conn = self.conn();
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO published_codes (id, slug, title, description, html_content) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, slug, title, description, html_content],
        )?;
        conn.query_row(
            "SELECT id, slug, title, description, html_content, created_at FROM published_codes WHERE id = ?1",
            params![id],
            snippet_from_row,
        )
    }

    pub fn get_published(&self, slug: &str) -> Result<Option<PublishedSnippet>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, slug, title, description, html_content, created_at FROM published_codes WHERE slug = ?1",
            params![slug],
            snippet_from_row,
        )
        .optional()
    }

    // ── Settings ──

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Users ──

    pub fn create_user(&self, email: &str, password_hash: &str, salt: &str) -> Result<User> {
        let conn = self.conn();
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO users (id, email, password_hash, salt) VALUES (?1, ?2, ?3, ?4)",
            params![id, email, password_hash, salt],
        )?;
        conn.query_row(
            "SELECT id, email, password_hash, salt, created_at FROM users WHERE id = ?1",
            params![id],
            user_from_row,
        )
    }

    pub fn find_user(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, email, password_hash, salt, created_at FROM users WHERE email = ?1",
            params![email],
            user_from_row,
        )
        .optional()
    }

    // ── Auth sessions ──

    pub fn create_auth_session(&self, user_id: &str) -> Result<String> {
        let conn = self.conn();
        let token = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO auth_sessions (token, user_id) VALUES (?1, ?2)",
            params![token, user_id],
        )?;
        Ok(token)
    }

    pub fn session_user(&self, token: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT u.id, u.email, u.password_hash, u.salt, u.created_at
             FROM auth_sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1",
            params![token],
            user_from_row,
        )
        .optional()
    }

    /// Returns whether a session was actually removed.
    pub fn delete_auth_session(&self, token: &str) -> Result<bool> {
        let conn = self.conn();
        let removed = conn.execute("DELETE FROM auth_sessions WHERE token = ?1", params![token])?;
        Ok(removed > 0)
    }
}
