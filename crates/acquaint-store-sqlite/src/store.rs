//! [`SqliteStore`]: the SQLite implementation of [`ContactStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use acquaint_core::{
  contact::{Account, Contact, NewContact, NewRecord, Record},
  normalize::keywords_of,
  payload::RawAnalysisPayload,
  store::{ContactQuery, ContactStore},
};

use crate::{
  Error, Result,
  encode::{
    CONTACT_COLUMNS, RECORD_COLUMNS, RawAccount, RawContact, RawRecord, encode_dt, encode_uuid,
    like_pattern, truncate_dt,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Acquaint contact store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a query returning contact rows.
  async fn query_contacts(
    &self,
    sql: String,
    params: Vec<rusqlite::types::Value>,
  ) -> Result<Vec<Contact>> {
    let raws: Vec<RawContact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContact::into_contact).collect()
  }

  /// Run a query returning record rows.
  async fn query_records(
    &self,
    sql: String,
    params: Vec<rusqlite::types::Value>,
  ) -> Result<Vec<Record>> {
    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  /// Execute one write and return the number of affected rows.
  async fn execute(&self, sql: &'static str, params: Vec<rusqlite::types::Value>) -> Result<usize> {
    self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params_from_iter(params))?))
      .await
      .map_err(Error::from_db)
  }
}

fn text(s: impl Into<String>) -> rusqlite::types::Value { rusqlite::types::Value::Text(s.into()) }

fn int(n: usize) -> rusqlite::types::Value {
  rusqlite::types::Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

fn opt_text(s: Option<String>) -> rusqlite::types::Value {
  s.map_or(rusqlite::types::Value::Null, rusqlite::types::Value::Text)
}

// ─── ContactStore impl ───────────────────────────────────────────────────────

impl ContactStore for SqliteStore {
  type Error = Error;

  fn is_username_taken(error: &Error) -> bool { matches!(error, Error::UsernameTaken(_)) }

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn add_account(&self, username: String, password_hash: String) -> Result<Account> {
    let account = Account {
      account_id: Uuid::new_v4(),
      username,
      password_hash,
      created_at: truncate_dt(Utc::now())?,
    };

    let inserted = self
      .execute(
        "INSERT INTO accounts (account_id, username, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        vec![
          text(encode_uuid(account.account_id)),
          text(account.username.clone()),
          text(account.password_hash.clone()),
          text(encode_dt(account.created_at)),
        ],
      )
      .await;

    match inserted {
      Ok(_) => Ok(account),
      Err(Error::Constraint(_)) => Err(Error::UsernameTaken(account.username)),
      Err(e) => Err(e),
    }
  }

  async fn get_account(&self, username: &str) -> Result<Option<Account>> {
    let username = username.to_owned();

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT account_id, username, password_hash, created_at
               FROM accounts WHERE username = ?1",
              rusqlite::params![username],
              |row| {
                Ok(RawAccount {
                  account_id:    row.get(0)?,
                  username:      row.get(1)?,
                  password_hash: row.get(2)?,
                  created_at:    row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  // ── Contacts ──────────────────────────────────────────────────────────────

  async fn add_contact(&self, input: NewContact) -> Result<Contact> {
    let now = truncate_dt(Utc::now())?;
    let contact = Contact {
      contact_id:   Uuid::new_v4(),
      user_id:      input.user_id,
      name:         input.name,
      summary:      None,
      avatar_url:   input.avatar_url,
      created_at:   now,
      last_updated: now,
    };

    self
      .execute(
        "INSERT INTO contacts (
           contact_id, user_id, name, summary, avatar_url, created_at, last_updated
         ) VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?5)",
        vec![
          text(encode_uuid(contact.contact_id)),
          text(encode_uuid(contact.user_id)),
          text(contact.name.clone()),
          text(contact.avatar_url.clone()),
          text(encode_dt(now)),
        ],
      )
      .await?;

    Ok(contact)
  }

  async fn find_contact_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Contact>> {
    let found = self
      .query_contacts(
        format!(
          "SELECT {CONTACT_COLUMNS} FROM contacts
           WHERE user_id = ?1 AND name = ?2
           ORDER BY created_at ASC, rowid ASC
           LIMIT 1"
        ),
        vec![text(encode_uuid(user_id)), text(name)],
      )
      .await?;
    Ok(found.into_iter().next())
  }

  async fn get_contact(&self, user_id: Uuid, contact_id: Uuid) -> Result<Option<Contact>> {
    let found = self
      .query_contacts(
        format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE user_id = ?1 AND contact_id = ?2"),
        vec![text(encode_uuid(user_id)), text(encode_uuid(contact_id))],
      )
      .await?;
    Ok(found.into_iter().next())
  }

  async fn list_contacts(&self, user_id: Uuid) -> Result<Vec<Contact>> {
    self.search_contacts(user_id, &ContactQuery::default()).await
  }

  async fn search_contacts(&self, user_id: Uuid, query: &ContactQuery) -> Result<Vec<Contact>> {
    let pattern = query
      .text
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(like_pattern);
    let limit = query.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

    // The keyword match only looks at the newest record, mirroring what the
    // list view displays.
    let sql = format!(
      "SELECT {CONTACT_COLUMNS} FROM contacts c
       WHERE c.user_id = ?1
         AND (?2 IS NULL
              OR c.name LIKE ?2 ESCAPE '\\'
              OR c.summary LIKE ?2 ESCAPE '\\'
              OR (SELECT r.keywords
                  FROM records r
                  WHERE r.contact_id = c.contact_id
                  ORDER BY r.created_at DESC, r.rowid DESC
                  LIMIT 1) LIKE ?2 ESCAPE '\\')
       ORDER BY c.last_updated DESC, c.rowid DESC
       LIMIT ?3 OFFSET ?4"
    );

    self
      .query_contacts(
        sql,
        vec![
          text(encode_uuid(user_id)),
          opt_text(pattern),
          rusqlite::types::Value::Integer(limit),
          int(query.offset.unwrap_or(0)),
        ],
      )
      .await
  }

  async fn find_contacts_named(
    &self,
    user_id: Option<Uuid>,
    names: &[&str],
  ) -> Result<Vec<Contact>> {
    if names.is_empty() {
      return Ok(Vec::new());
    }
    // ?1 is the optional user scope; names bind from ?2 on.
    let placeholders = (2..=names.len() + 1)
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    let mut params = vec![opt_text(user_id.map(encode_uuid))];
    params.extend(names.iter().map(|n| text(*n)));
    self
      .query_contacts(
        format!(
          "SELECT {CONTACT_COLUMNS} FROM contacts
           WHERE (?1 IS NULL OR user_id = ?1)
             AND name IN ({placeholders})
           ORDER BY created_at ASC, rowid ASC"
        ),
        params,
      )
      .await
  }

  async fn touch_contact(
    &self,
    contact_id: Uuid,
    summary: String,
    at: DateTime<Utc>,
  ) -> Result<()> {
    self
      .execute(
        "UPDATE contacts SET summary = ?2, last_updated = ?3 WHERE contact_id = ?1",
        vec![text(encode_uuid(contact_id)), text(summary), text(encode_dt(at))],
      )
      .await?;
    Ok(())
  }

  async fn rename_contact(
    &self,
    contact_id: Uuid,
    name: String,
    summary: Option<String>,
  ) -> Result<()> {
    self
      .execute(
        "UPDATE contacts SET name = ?2, summary = COALESCE(?3, summary)
         WHERE contact_id = ?1",
        vec![text(encode_uuid(contact_id)), text(name), opt_text(summary)],
      )
      .await?;
    Ok(())
  }

  async fn delete_contact(&self, user_id: Uuid, contact_id: Uuid) -> Result<bool> {
    let n = self
      .execute(
        "DELETE FROM contacts WHERE user_id = ?1 AND contact_id = ?2",
        vec![text(encode_uuid(user_id)), text(encode_uuid(contact_id))],
      )
      .await?;
    Ok(n > 0)
  }

  // ── Records ───────────────────────────────────────────────────────────────

  async fn add_record(&self, input: NewRecord) -> Result<Record> {
    let record = Record {
      record_id:     Uuid::new_v4(),
      user_id:       input.user_id,
      contact_id:    input.contact_id,
      image_url:     input.image_url,
      raw_payload:   input.raw_payload,
      key_takeaways: input.key_takeaways,
      created_at:    truncate_dt(Utc::now())?,
    };

    // Keywords usually sit inside a fenced text reply; store them parsed so
    // search can match them with plain SQL.
    let keywords = keywords_of(&RawAnalysisPayload::from_value(record.raw_payload.clone()));

    self
      .execute(
        "INSERT INTO records (
           record_id, user_id, contact_id, image_url, raw_payload, key_takeaways, keywords,
           created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        vec![
          text(encode_uuid(record.record_id)),
          text(encode_uuid(record.user_id)),
          text(encode_uuid(record.contact_id)),
          text(record.image_url.clone()),
          text(record.raw_payload.to_string()),
          text(record.key_takeaways.clone()),
          opt_text(keywords),
          text(encode_dt(record.created_at)),
        ],
      )
      .await?;

    Ok(record)
  }

  async fn list_records(&self, user_id: Uuid, contact_id: Uuid) -> Result<Vec<Record>> {
    self
      .query_records(
        format!(
          "SELECT {RECORD_COLUMNS} FROM records
           WHERE user_id = ?1 AND contact_id = ?2
           ORDER BY created_at DESC, rowid DESC"
        ),
        vec![text(encode_uuid(user_id)), text(encode_uuid(contact_id))],
      )
      .await
  }

  async fn latest_record(&self, contact_id: Uuid) -> Result<Option<Record>> {
    let found = self
      .query_records(
        format!(
          "SELECT {RECORD_COLUMNS} FROM records
           WHERE contact_id = ?1
           ORDER BY created_at DESC, rowid DESC
           LIMIT 1"
        ),
        vec![text(encode_uuid(contact_id))],
      )
      .await?;
    Ok(found.into_iter().next())
  }

  async fn delete_record(&self, user_id: Uuid, record_id: Uuid) -> Result<bool> {
    let n = self
      .execute(
        "DELETE FROM records WHERE user_id = ?1 AND record_id = ?2",
        vec![text(encode_uuid(user_id)), text(encode_uuid(record_id))],
      )
      .await?;
    Ok(n > 0)
  }

  async fn delete_records_for_contact(&self, user_id: Uuid, contact_id: Uuid) -> Result<usize> {
    self
      .execute(
        "DELETE FROM records WHERE user_id = ?1 AND contact_id = ?2",
        vec![text(encode_uuid(user_id)), text(encode_uuid(contact_id))],
      )
      .await
  }
}
