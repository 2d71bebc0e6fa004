use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{FormDraft, NewFormDraft};
use crate::schema::form_drafts;

pub const DEFAULT_DRAFT_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct DraftRecord {
    pub payload: Value,
    pub updated_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

/// Storage seam for per-user form autosaves, keyed by `(user_id,
/// form_id)`. The portal ships a Postgres backend; tests use an
/// in-memory one.
pub trait DraftBackend {
    fn load(&mut self, user_id: Uuid, form_id: &str) -> Result<Option<DraftRecord>>;
    fn save(&mut self, user_id: Uuid, form_id: &str, record: DraftRecord) -> Result<()>;
    fn delete(&mut self, user_id: Uuid, form_id: &str) -> Result<()>;
}

/// Enforces the expiry policy on top of whatever backend holds the
/// bytes: saves stamp `now + ttl`, reads treat expired rows as absent
/// and clean them up.
pub struct DraftStore<B> {
    backend: B,
    ttl: Duration,
}

impl<B: DraftBackend> DraftStore<B> {
    pub fn new(backend: B, ttl_days: i64) -> Self {
        Self {
            backend,
            ttl: Duration::days(ttl_days),
        }
    }

    pub fn load(
        &mut self,
        user_id: Uuid,
        form_id: &str,
        now: NaiveDateTime,
    ) -> Result<Option<DraftRecord>> {
        match self.backend.load(user_id, form_id)? {
            Some(record) if record.expires_at <= now => {
                self.backend.delete(user_id, form_id)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub fn save(
        &mut self,
        user_id: Uuid,
        form_id: &str,
        payload: Value,
        now: NaiveDateTime,
    ) -> Result<DraftRecord> {
        let record = DraftRecord {
            payload,
            updated_at: now,
            expires_at: now + self.ttl,
        };
        self.backend.save(user_id, form_id, record.clone())?;
        Ok(record)
    }

    pub fn delete(&mut self, user_id: Uuid, form_id: &str) -> Result<()> {
        self.backend.delete(user_id, form_id)
    }
}

pub struct PgDraftBackend<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> PgDraftBackend<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }
}

impl DraftBackend for PgDraftBackend<'_> {
    fn load(&mut self, user_id: Uuid, form_id: &str) -> Result<Option<DraftRecord>> {
        let row: Option<FormDraft> = form_drafts::table
            .find((user_id, form_id))
            .first(self.conn)
            .optional()?;
        Ok(row.map(|draft| DraftRecord {
            payload: draft.payload,
            updated_at: draft.updated_at,
            expires_at: draft.expires_at,
        }))
    }

    fn save(&mut self, user_id: Uuid, form_id: &str, record: DraftRecord) -> Result<()> {
        let row = NewFormDraft {
            user_id,
            form_id: form_id.to_string(),
            payload: record.payload,
            updated_at: record.updated_at,
            expires_at: record.expires_at,
        };
        diesel::insert_into(form_drafts::table)
            .values(&row)
            .on_conflict((form_drafts::user_id, form_drafts::form_id))
            .do_update()
            .set((
                form_drafts::payload.eq(&row.payload),
                form_drafts::updated_at.eq(row.updated_at),
                form_drafts::expires_at.eq(row.expires_at),
            ))
            .execute(self.conn)?;
        Ok(())
    }

    fn delete(&mut self, user_id: Uuid, form_id: &str) -> Result<()> {
        diesel::delete(form_drafts::table.find((user_id, form_id))).execute(self.conn)?;
        Ok(())
    }
}
