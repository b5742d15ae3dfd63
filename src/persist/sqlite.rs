//! SQLite storage: an append-only op journal, the enrollment and experience
//! tables it keeps current, and the catalog.
//!
//! Each appended op is checked against the stored row before it lands, so a
//! review computed from a stale version never reaches disk.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use tracing::debug;

use crate::{
    catalog::{Catalog, Flashcard, QuizItem},
    core::ledger::{EnrollmentLedger, LedgerState},
    enrollment::EnrollmentRecord,
    error::SchedulerResult,
    op::{OP_FORMAT_VERSION, Op, StoredOp, StoredOpEnvelope},
    types::{DifficultyTier, FlashcardId, OpSeq, UserId},
};

use super::{OpSink, PersistError, PersistResult};

/// SQLite implementation of [`crate::persist::OpSink`].
pub struct SqliteOpSink {
    conn: Connection,
}

impl SqliteOpSink {
    /// Opens or creates a database at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Builds a ledger from the enrollment and experience tables.
    ///
    /// Records come back in enrollment order and new ops continue after the
    /// last journaled sequence.
    pub fn load_ledger(&self) -> SchedulerResult<EnrollmentLedger> {
        let records = self.load_records()?;
        let experience = self.load_experience()?;
        let next_op_seq = self.latest_seq()? + 1;
        debug!(records = records.len(), next_op_seq, "ledger loaded");

        EnrollmentLedger::from_state(LedgerState {
            next_op_seq,
            records,
            experience,
        })
    }

    /// Journaled ops for one card, oldest first.
    pub fn history(&self, user: UserId, flashcard: FlashcardId) -> PersistResult<Vec<StoredOp>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, ts, payload FROM events
             WHERE user_id = ?1 AND flashcard_id = ?2 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![user as i64, flashcard as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, Vec<u8>>(2)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (seq, ts, payload) = row?;
            let mut stored = decode_op(&payload)?;
            stored.seq = seq as OpSeq;
            stored.ts = ts as u64;
            out.push(stored);
        }
        Ok(out)
    }

    /// Highest journaled sequence, 0 for an empty journal.
    pub fn latest_seq(&self) -> PersistResult<OpSeq> {
        let seq: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM events", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()?
            .flatten();
        Ok(seq.unwrap_or(0) as OpSeq)
    }

    /// Replaces the stored catalog, preserving `catalog`'s insertion order.
    pub fn save_catalog(&mut self, catalog: &Catalog) -> PersistResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM flashcards", [])?;
        tx.execute("DELETE FROM quiz_items", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO flashcards(id, front, back) VALUES (?1, ?2, ?3)")?;
            for card in catalog.flashcards() {
                stmt.execute(params![card.id as i64, card.front, card.back])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO quiz_items(id, tier, script, gloss) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for item in catalog.quiz_items() {
                stmt.execute(params![
                    item.id as i64,
                    item.tier.as_code(),
                    item.script,
                    item.gloss,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Loads the catalog in the order it was saved.
    pub fn load_catalog(&self) -> PersistResult<Catalog> {
        let mut catalog = Catalog::new();

        let mut stmt = self
            .conn
            .prepare("SELECT id, front, back FROM flashcards ORDER BY position ASC")?;
        let cards = stmt.query_map([], |row| {
            Ok(Flashcard {
                id: row.get::<_, i64>(0)? as u64,
                front: row.get(1)?,
                back: row.get(2)?,
            })
        })?;
        for card in cards {
            catalog
                .insert_flashcard(card?)
                .map_err(|e| PersistError::Message(format!("catalog: {e}")))?;
        }

        let mut stmt = self
            .conn
            .prepare("SELECT id, tier, script, gloss FROM quiz_items ORDER BY position ASC")?;
        let items = stmt.query_map([], |row| {
            let code: i64 = row.get(1)?;
            Ok((
                row.get::<_, i64>(0)? as u64,
                code,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        for row in items {
            let (id, code, script, gloss) = row?;
            let tier = DifficultyTier::from_code(code)
                .ok_or_else(|| PersistError::Message(format!("unknown tier code {code}")))?;
            catalog
                .insert_quiz_item(QuizItem {
                    id,
                    tier,
                    script,
                    gloss,
                })
                .map_err(|e| PersistError::Message(format!("catalog: {e}")))?;
        }

        Ok(catalog)
    }

    fn load_records(&self) -> PersistResult<Vec<EnrollmentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, flashcard_id, correct_streak, previous_interval, next_review_at, version
             FROM enrollments ORDER BY enrolled_seq ASC",
        )?;
        let rows = stmt.query_map([], record_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn load_experience(&self) -> PersistResult<Vec<(UserId, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id, total FROM experience ORDER BY user_id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)? as UserId, row.get::<_, i64>(1)? as u64))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl OpSink for SqliteOpSink {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        let tx = self.conn.transaction()?;
        for stored in ops {
            journal_op(&tx, stored)?;
            apply_op(&tx, stored)?;
        }
        tx.commit()?;
        Ok(ops.last().map_or(0, |o| o.seq))
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

fn journal_op(tx: &Transaction<'_>, stored: &StoredOp) -> PersistResult<()> {
    let (kind, record) = match &stored.op {
        Op::Enroll { record } => ("enroll", record),
        Op::Review { record, .. } => ("review", record),
    };
    let payload = serde_json::to_vec(&StoredOpEnvelope::new(stored.clone()))?;
    tx.prepare_cached(
        "INSERT INTO events(seq, ts, kind, user_id, flashcard_id, payload)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?
    .execute(params![
        stored.seq as i64,
        stored.ts as i64,
        kind,
        record.user as i64,
        record.flashcard as i64,
        payload,
    ])?;
    Ok(())
}

/// Brings the enrollment and experience tables in line with one op.
fn apply_op(tx: &Transaction<'_>, stored: &StoredOp) -> PersistResult<()> {
    match &stored.op {
        Op::Enroll { record } => {
            let inserted = tx
                .prepare_cached(
                    "INSERT INTO enrollments(user_id, flashcard_id, correct_streak,
                         previous_interval, next_review_at, version, enrolled_seq)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(user_id, flashcard_id) DO NOTHING",
                )?
                .execute(params![
                    record.user as i64,
                    record.flashcard as i64,
                    record.correct_streak,
                    record.previous_interval as i64,
                    record.next_review_at as i64,
                    record.version as i64,
                    stored.seq as i64,
                ])?;
            if inserted == 0 {
                return Err(PersistError::DuplicateEnrollment {
                    user: record.user,
                    flashcard: record.flashcard,
                });
            }
        }
        Op::Review {
            record,
            expected_version,
            experience,
            ..
        } => {
            let updated = tx
                .prepare_cached(
                    "UPDATE enrollments
                     SET correct_streak = ?1, previous_interval = ?2, next_review_at = ?3, version = ?4
                     WHERE user_id = ?5 AND flashcard_id = ?6 AND version = ?7",
                )?
                .execute(params![
                    record.correct_streak,
                    record.previous_interval as i64,
                    record.next_review_at as i64,
                    record.version as i64,
                    record.user as i64,
                    record.flashcard as i64,
                    *expected_version as i64,
                ])?;
            if updated == 0 {
                return Err(stale_review(tx, record, *expected_version)?);
            }

            if *experience > 0 {
                tx.prepare_cached(
                    "INSERT INTO experience(user_id, total) VALUES (?1, ?2)
                     ON CONFLICT(user_id) DO UPDATE SET total = total + excluded.total",
                )?
                .execute(params![record.user as i64, *experience as i64])?;
            }
        }
    }
    Ok(())
}

/// Explains why a review matched no row.
fn stale_review(
    tx: &Transaction<'_>,
    record: &EnrollmentRecord,
    expected: u64,
) -> PersistResult<PersistError> {
    let found: Option<i64> = tx
        .query_row(
            "SELECT version FROM enrollments WHERE user_id = ?1 AND flashcard_id = ?2",
            params![record.user as i64, record.flashcard as i64],
            |row| row.get(0),
        )
        .optional()?;

    Ok(match found {
        Some(found) => PersistError::VersionMismatch {
            user: record.user,
            flashcard: record.flashcard,
            expected,
            found: found as u64,
        },
        None => PersistError::MissingEnrollment {
            user: record.user,
            flashcard: record.flashcard,
        },
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<EnrollmentRecord> {
    Ok(EnrollmentRecord {
        user: row.get::<_, i64>(0)? as UserId,
        flashcard: row.get::<_, i64>(1)? as FlashcardId,
        correct_streak: row.get(2)?,
        previous_interval: row.get::<_, i64>(3)? as u64,
        next_review_at: row.get::<_, i64>(4)? as u64,
        version: row.get::<_, i64>(5)? as u64,
    })
}

fn decode_op(payload: &[u8]) -> PersistResult<StoredOp> {
    let envelope: StoredOpEnvelope = serde_json::from_slice(payload)?;
    if envelope.format_version != OP_FORMAT_VERSION {
        return Err(PersistError::Message(format!(
            "op format {} is not readable by this build",
            envelope.format_version
        )));
    }
    Ok(envelope.stored)
}
