//! # Flock SQL runner
//!
//! Applies a single ad-hoc SQL file (data fixes, seed data, one-off schema
//! patches) against the administrative connection. The file runs inside one
//! transaction together with its ledger row in `_flock_sql_runs`, so a failed
//! script leaves neither partial changes nor a record behind.
//!
//! Scripts therefore may not manage transactions themselves. Files that
//! contain `BEGIN`, `COMMIT`, `ROLLBACK` and the like, or statements Postgres
//! refuses inside a transaction block (`VACUUM`, `CREATE INDEX CONCURRENTLY`,
//! `CREATE DATABASE`, ...), are rejected before anything is executed. Run those
//! with `psql` instead.
//!
//! Schema migrations proper are embedded in `flock_shared::db::migrations`;
//! this runner is for everything that does not belong in that history.

use sha2::{Digest, Sha256};
use sqlx::{Executor, PgPool};
use std::path::{Path, PathBuf};

/// Ledger of executed files
pub const LEDGER_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS _flock_sql_runs (
    id BIGSERIAL PRIMARY KEY,
    file_name TEXT NOT NULL,
    checksum TEXT NOT NULL,
    executed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

#[derive(Debug, thiserror::Error)]
pub enum SqlRunError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} contains no SQL")]
    Empty(PathBuf),

    #[error("{path}: `{statement}` cannot run inside the runner's transaction")]
    TransactionControl { path: PathBuf, statement: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A loaded SQL file
#[derive(Debug, Clone)]
pub struct SqlScript {
    pub file_name: String,
    pub checksum: String,
    pub sql: String,
}

impl SqlScript {
    /// Reads a script from disk, rejecting files with nothing to run
    pub fn load(path: &Path) -> Result<Self, SqlRunError> {
        let sql = std::fs::read_to_string(path).map_err(|source| SqlRunError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_source(path, sql)
    }

    fn from_source(path: &Path, sql: String) -> Result<Self, SqlRunError> {
        let statements = statement_words(&sql);
        if statements.is_empty() {
            return Err(SqlRunError::Empty(path.to_path_buf()));
        }
        if let Some(statement) = statements.iter().find_map(|words| transaction_control(words)) {
            return Err(SqlRunError::TransactionControl {
                path: path.to_path_buf(),
                statement,
            });
        }

        Ok(SqlScript {
            file_name: file_name(path),
            checksum: checksum(&sql),
            sql,
        })
    }
}

/// Lowercase hex SHA-256 of the file contents
pub fn checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// Final path component, or the whole path if it has none
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Upper-cased words of each non-empty statement
///
/// Comments, string literals, quoted identifiers and dollar-quoted bodies are
/// skipped, so keywords inside them never count.
fn statement_words(sql: &str) -> Vec<Vec<String>> {
    fn end_word(word: &mut String, words: &mut Vec<String>) {
        if !word.is_empty() {
            words.push(std::mem::take(word).to_uppercase());
        }
    }

    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut words: Vec<String> = Vec::new();
    let mut word = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '-' if next == Some('-') => {
                end_word(&mut word, &mut words);
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                end_word(&mut word, &mut words);
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 1;
            }
            '\'' | '"' => {
                end_word(&mut word, &mut words);
                words.push(String::from("?"));
                i += 1;
                while i < chars.len() {
                    if chars[i] == c {
                        // Doubled quote is an escaped quote
                        if chars.get(i + 1) == Some(&c) {
                            i += 1;
                        } else {
                            break;
                        }
                    }
                    i += 1;
                }
            }
            '$' if word.is_empty() => {
                let tag_end = chars[i + 1..]
                    .iter()
                    .position(|&ch| !(ch.is_alphanumeric() || ch == '_'))
                    .map(|offset| i + 1 + offset);
                match tag_end {
                    Some(end) if chars[end] == '$' => {
                        let tag: String = chars[i..=end].iter().collect();
                        end_word(&mut word, &mut words);
                        words.push(String::from("?"));
                        let rest: String = chars[end + 1..].iter().collect();
                        // Leave `i` on the last character of the closing tag
                        i = match rest.find(&tag) {
                            Some(offset) => {
                                end + rest[..offset].chars().count() + tag.chars().count()
                            }
                            None => chars.len(),
                        };
                    }
                    _ => word.push(c),
                }
            }
            ';' => {
                end_word(&mut word, &mut words);
                if !words.is_empty() {
                    statements.push(std::mem::take(&mut words));
                }
            }
            c if c.is_alphanumeric() || c == '_' || c == '$' => word.push(c),
            _ => end_word(&mut word, &mut words),
        }
        i += 1;
    }

    end_word(&mut word, &mut words);
    if !words.is_empty() {
        statements.push(words);
    }
    statements
}

/// Names a statement that manages transactions or cannot run inside one
fn transaction_control(words: &[String]) -> Option<String> {
    let word = |n: usize| words.get(n).map(String::as_str).unwrap_or("");
    let head = || words.iter().take(3).cloned().collect::<Vec<_>>().join(" ");
    let concurrently = || words.iter().any(|w| w == "CONCURRENTLY");

    let refused = match word(0) {
        "BEGIN" | "START" | "COMMIT" | "END" | "ABORT" | "VACUUM" | "CHECKPOINT" => true,
        "ROLLBACK" => word(1) != "TO",
        "PREPARE" => word(1) == "TRANSACTION",
        "CREATE" | "DROP" => matches!(word(1), "DATABASE" | "TABLESPACE") || concurrently(),
        "ALTER" => word(1) == "SYSTEM",
        "REINDEX" => matches!(word(1), "DATABASE" | "SYSTEM") || concurrently(),
        "REFRESH" => concurrently(),
        _ => false,
    };

    refused.then(head)
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlRun {
    pub file_name: String,
    pub checksum: String,

    /// Earlier runs of a file with the same checksum
    pub previous_runs: i64,
}

/// Runs a script and records it in the ledger, all in one transaction
///
/// Scripts built with [`SqlScript::load`] have already been checked for
/// transaction control statements.
pub async fn run_script(pool: &PgPool, script: &SqlScript) -> Result<SqlRun, SqlRunError> {
    pool.execute(LEDGER_DDL).await?;

    let previous_runs: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _flock_sql_runs WHERE checksum = $1")
            .bind(&script.checksum)
            .fetch_one(pool)
            .await?;

    if previous_runs > 0 {
        tracing::warn!(
            file = %script.file_name,
            checksum = %script.checksum,
            previous_runs,
            "Script has been run before"
        );
    }

    let mut tx = pool.begin().await?;

    // Unprepared execution so a file may hold several statements
    (&mut *tx).execute(script.sql.as_str()).await?;

    sqlx::query("INSERT INTO _flock_sql_runs (file_name, checksum) VALUES ($1, $2)")
        .bind(&script.file_name)
        .bind(&script.checksum)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        file = %script.file_name,
        checksum = %script.checksum,
        "Script applied"
    );

    Ok(SqlRun {
        file_name: script.file_name.clone(),
        checksum: script.checksum.clone(),
        previous_runs,
    })
}

/// Loads and runs a file
pub async fn run_file(pool: &PgPool, path: &Path) -> Result<SqlRun, SqlRunError> {
    let script = SqlScript::load(path)?;
    run_script(pool, &script).await
}
