//! Demo dataset: a small recruiting schema with one admin and one restricted
//! user. Used by `sqlwarden init --demo` and by tests.

use crate::error::Result;
use crate::WardenDb;
use sqlx::Row;
use tracing::info;

pub const DEMO_ADMIN_EMAIL: &str = "admin@example.com";
pub const DEMO_USER_EMAIL: &str = "user@example.com";

const CITIES: &[&str] = &["Delhi", "Noida", "Gurgaon", "Bangalore", "Pune"];
const DEPARTMENTS: &[&str] = &["Engineering", "HR", "Product"];
const STATUSES: &[&str] = &["scheduled", "completed", "cancelled"];

/// Ids of the seeded principals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoUsers {
    pub admin_id: i64,
    pub user_id: i64,
}

impl WardenDb {
    /// Create and populate the demo tables. Safe to run repeatedly: data is
    /// only inserted into empty tables and grants are upserted.
    pub async fn seed_demo(&self) -> Result<DemoUsers> {
        let mut tx = self.pool.begin().await?;

        for ddl in [
            r#"CREATE TABLE IF NOT EXISTS candidates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT,
                city TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"#,
            r#"CREATE TABLE IF NOT EXISTS interviewers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                department TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"#,
            r#"CREATE TABLE IF NOT EXISTS interviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                candidate_id INTEGER NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
                interviewer_id INTEGER NOT NULL REFERENCES interviewers(id) ON DELETE CASCADE,
                scheduled_at TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"#,
        ] {
            sqlx::query(ddl).execute(&mut *tx).await?;
        }

        for (email, role) in [(DEMO_ADMIN_EMAIL, "admin"), (DEMO_USER_EMAIL, "user")] {
            sqlx::query("INSERT OR IGNORE INTO users (email, role) VALUES (?, ?)")
                .bind(email)
                .bind(role)
                .execute(&mut *tx)
                .await?;
        }

        let admin_id: i64 = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(DEMO_ADMIN_EMAIL)
            .fetch_one(&mut *tx)
            .await?
            .try_get("id")?;
        let user_id: i64 = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(DEMO_USER_EMAIL)
            .fetch_one(&mut *tx)
            .await?
            .try_get("id")?;

        let grants: [(i64, &str, bool, bool, Option<&str>); 5] = [
            (user_id, "candidates", true, false, Some(r#"["id","full_name","email","city"]"#)),
            (
                user_id,
                "interviews",
                true,
                false,
                Some(r#"["id","candidate_id","interviewer_id","scheduled_at","status"]"#),
            ),
            (admin_id, "candidates", true, true, None),
            (admin_id, "interviewers", true, true, None),
            (admin_id, "interviews", true, true, None),
        ];
        for (owner, table, can_read, can_write, columns) in grants {
            sqlx::query(
                r#"
                INSERT INTO user_permissions (user_id, table_name, can_read, can_write, allowed_columns)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (user_id, table_name) DO UPDATE SET
                    can_read = excluded.can_read,
                    can_write = excluded.can_write,
                    allowed_columns = excluded.allowed_columns
                "#,
            )
            .bind(owner)
            .bind(table)
            .bind(can_read)
            .bind(can_write)
            .bind(columns)
            .execute(&mut *tx)
            .await?;
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM candidates")
            .fetch_one(&mut *tx)
            .await?;
        if existing == 0 {
            for i in 1..=20usize {
                sqlx::query(
                    "INSERT INTO candidates (full_name, email, phone, city) VALUES (?, ?, ?, ?)",
                )
                .bind(format!("Candidate {}", i))
                .bind(format!("candidate{}@example.com", i))
                .bind(format!("90000000{:02}", i))
                .bind(CITIES[i % CITIES.len()])
                .execute(&mut *tx)
                .await?;
            }
            for i in 1..=5usize {
                sqlx::query("INSERT INTO interviewers (full_name, email, department) VALUES (?, ?, ?)")
                    .bind(format!("Interviewer {}", i))
                    .bind(format!("interviewer{}@example.com", i))
                    .bind(DEPARTMENTS[i % DEPARTMENTS.len()])
                    .execute(&mut *tx)
                    .await?;
            }
            let now = chrono::Utc::now();
            for i in 0..30i64 {
                let scheduled = now + chrono::Duration::days((i % 21) - 10);
                sqlx::query(
                    r#"
                    INSERT INTO interviews (candidate_id, interviewer_id, scheduled_at, status)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(i % 20 + 1)
                .bind(i % 5 + 1)
                .bind(scheduled.to_rfc3339())
                .bind(STATUSES[(i as usize) % STATUSES.len()])
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        info!(admin_id, user_id, "Demo dataset seeded");
        Ok(DemoUsers { admin_id, user_id })
    }
}
