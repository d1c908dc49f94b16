//! Store trait and the SQLite implementation.

use crate::error::StoreResult;
use crate::repos::{ItemRepo, PkceRepo, SessionRepo, UserRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined store trait.
#[async_trait]
pub trait Store: UserRepo + SessionRepo + ItemRepo + PkceRepo + Send + Sync {
    /// Create the schema if needed.
    async fn migrate(&self) -> StoreResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> StoreResult<()>;
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id                  BLOB PRIMARY KEY,
    email               TEXT NOT NULL,
    password            TEXT NOT NULL,
    pw_cost             INTEGER NOT NULL DEFAULT 0,
    pw_nonce            TEXT NOT NULL DEFAULT '',
    pw_salt             TEXT NOT NULL DEFAULT '',
    pw_auth             TEXT NOT NULL DEFAULT '',
    version             TEXT NOT NULL,
    password_updated_at INTEGER NOT NULL DEFAULT 0,
    created_at          INTEGER NOT NULL,
    updated_at          INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email);

CREATE TABLE IF NOT EXISTS sessions (
    id            BLOB PRIMARY KEY,
    user_id       BLOB NOT NULL,
    user_agent    TEXT NOT NULL DEFAULT '',
    api_version   TEXT NOT NULL DEFAULT '',
    access_token  TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    expire_at     INTEGER NOT NULL,
    created_at    INTEGER NOT NULL,
    updated_at    INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_access_token ON sessions(access_token);
CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_refresh_token ON sessions(refresh_token);
CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expire_at ON sessions(expire_at);

CREATE TABLE IF NOT EXISTS items (
    id           BLOB PRIMARY KEY,
    user_id      BLOB NOT NULL,
    content      TEXT NOT NULL DEFAULT '',
    content_type TEXT,
    enc_item_key TEXT NOT NULL DEFAULT '',
    items_key_id TEXT,
    deleted      INTEGER NOT NULL DEFAULT 0,
    created_at   INTEGER NOT NULL,
    updated_at   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_items_user_updated ON items(user_id, updated_at);
CREATE INDEX IF NOT EXISTS idx_items_user_type_updated ON items(user_id, content_type, updated_at, deleted);

CREATE TABLE IF NOT EXISTS pkce (
    code_challenge TEXT PRIMARY KEY,
    expire_at      INTEGER NOT NULL,
    created_at     INTEGER NOT NULL,
    updated_at     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pkce_expire_at ON pkce(expire_at);
"#;

/// SQLite-backed store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and migrate.
    pub async fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // linearizes writes, which the sync conflict rule relies on.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!(path = %path.display(), "database ready");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{Item, Pkce, Session, User};
    use crate::repos::ItemQuery;
    use satchel_core::Timestamp;
    use uuid::Uuid;

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &mut User) -> StoreResult<()> {
            let now = Timestamp::now();
            user.created_at = now;
            user.updated_at = now;

            sqlx::query(
                r#"
                INSERT INTO users (
                    id, email, password, pw_cost, pw_nonce, pw_salt, pw_auth,
                    version, password_updated_at, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password)
            .bind(user.pw_cost)
            .bind(&user.pw_nonce)
            .bind(&user.pw_salt)
            .bind(&user.pw_auth)
            .bind(&user.version)
            .bind(user.password_updated_at)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn update_user(&self, user: &mut User) -> StoreResult<()> {
            user.updated_at = Timestamp::now();

            let result = sqlx::query(
                r#"
                UPDATE users SET
                    email = ?, password = ?, pw_cost = ?, pw_nonce = ?,
                    pw_salt = ?, pw_auth = ?, version = ?,
                    password_updated_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&user.email)
            .bind(&user.password)
            .bind(user.pw_cost)
            .bind(&user.pw_nonce)
            .bind(&user.pw_salt)
            .bind(&user.pw_auth)
            .bind(&user.version)
            .bind(user.password_updated_at)
            .bind(user.updated_at)
            .bind(user.id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("user {}", user.id)));
            }
            Ok(())
        }

        async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
            let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
            let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl SessionRepo for SqliteStore {
        async fn create_session(&self, session: &mut Session) -> StoreResult<()> {
            let now = Timestamp::now();
            session.created_at = now;
            session.updated_at = now;

            sqlx::query(
                r#"
                INSERT INTO sessions (
                    id, user_id, user_agent, api_version, access_token,
                    refresh_token, expire_at, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(session.id)
            .bind(session.user_id)
            .bind(&session.user_agent)
            .bind(&session.api_version)
            .bind(&session.access_token)
            .bind(&session.refresh_token)
            .bind(session.expire_at)
            .bind(session.created_at)
            .bind(session.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_session(&self, id: Uuid) -> StoreResult<Option<Session>> {
            let row = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_session_by_access_token(
            &self,
            id: Uuid,
            access_token: &str,
        ) -> StoreResult<Option<Session>> {
            let row = sqlx::query_as::<_, Session>(
                "SELECT * FROM sessions WHERE id = ? AND access_token = ?",
            )
            .bind(id)
            .bind(access_token)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_session_by_tokens(
            &self,
            id: Uuid,
            access_token: &str,
            refresh_token: &str,
        ) -> StoreResult<Option<Session>> {
            let row = sqlx::query_as::<_, Session>(
                "SELECT * FROM sessions WHERE id = ? AND access_token = ? AND refresh_token = ?",
            )
            .bind(id)
            .bind(access_token)
            .bind(refresh_token)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_user_session(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Session>> {
            let row =
                sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ? AND user_id = ?")
                    .bind(id)
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn list_active_sessions(
            &self,
            user_id: Uuid,
            now: Timestamp,
        ) -> StoreResult<Vec<Session>> {
            let rows = sqlx::query_as::<_, Session>(
                "SELECT * FROM sessions WHERE user_id = ? AND expire_at > ? ORDER BY created_at",
            )
            .bind(user_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn rotate_session_tokens(
            &self,
            id: Uuid,
            old_access_token: &str,
            old_refresh_token: &str,
            new_access_token: &str,
            new_refresh_token: &str,
            expire_at: Timestamp,
        ) -> StoreResult<bool> {
            // Compare-and-swap on the old token pair; concurrent refreshes
            // serialize here and exactly one of them wins.
            let result = sqlx::query(
                r#"
                UPDATE sessions SET
                    access_token = ?, refresh_token = ?, expire_at = ?, updated_at = ?
                WHERE id = ? AND access_token = ? AND refresh_token = ?
                "#,
            )
            .bind(new_access_token)
            .bind(new_refresh_token)
            .bind(expire_at)
            .bind(Timestamp::now())
            .bind(id)
            .bind(old_access_token)
            .bind(old_refresh_token)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn delete_session(&self, id: Uuid) -> StoreResult<()> {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn delete_sessions_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
            let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }

        async fn delete_other_sessions(&self, user_id: Uuid, keep: Uuid) -> StoreResult<u64> {
            let result = sqlx::query("DELETE FROM sessions WHERE user_id = ? AND id != ?")
                .bind(user_id)
                .bind(keep)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }
    }

    #[async_trait]
    impl ItemRepo for SqliteStore {
        async fn save_item(&self, item: &mut Item) -> StoreResult<()> {
            // Clients cannot forge updated_at; the server stamps it on
            // every write.
            item.updated_at = Timestamp::now();

            // Update guarded by the owner so an id collision with another
            // user's item falls through to the INSERT and surfaces as a
            // primary-key violation instead of overwriting foreign data.
            let existing_created_at = sqlx::query_scalar::<_, Timestamp>(
                r#"
                UPDATE items SET
                    content = ?, content_type = ?, enc_item_key = ?,
                    items_key_id = ?, deleted = ?, updated_at = ?
                WHERE id = ? AND user_id = ?
                RETURNING created_at
                "#,
            )
            .bind(&item.content)
            .bind(&item.content_type)
            .bind(&item.enc_item_key)
            .bind(&item.items_key_id)
            .bind(item.deleted)
            .bind(item.updated_at)
            .bind(item.id)
            .bind(item.user_id)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(created_at) = existing_created_at {
                item.created_at = created_at;
                return Ok(());
            }

            item.created_at = item.updated_at;
            sqlx::query(
                r#"
                INSERT INTO items (
                    id, user_id, content, content_type, enc_item_key,
                    items_key_id, deleted, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(item.id)
            .bind(item.user_id)
            .bind(&item.content)
            .bind(&item.content_type)
            .bind(&item.enc_item_key)
            .bind(&item.items_key_id)
            .bind(item.deleted)
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_item_by_user(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Item>> {
            let row = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_items(&self, query: &ItemQuery) -> StoreResult<(Vec<Item>, bool)> {
            let mut sql = String::from("SELECT * FROM items WHERE user_id = ?");
            if query.content_type.is_some() {
                sql.push_str(" AND content_type = ?");
            }
            if query.updated_after.is_some() {
                sql.push_str(if query.strict {
                    " AND updated_at > ?"
                } else {
                    " AND updated_at >= ?"
                });
            }
            if query.exclude_deleted {
                sql.push_str(" AND deleted = 0");
            }
            sql.push_str(" ORDER BY updated_at DESC");
            if query.limit > 0 {
                sql.push_str(" LIMIT ?");
            }

            let mut q = sqlx::query_as::<_, Item>(&sql).bind(query.user_id);
            if let Some(content_type) = &query.content_type {
                q = q.bind(content_type);
            }
            if let Some(updated_after) = query.updated_after {
                q = q.bind(updated_after);
            }
            if query.limit > 0 {
                // One extra row to learn whether the page overflowed.
                q = q.bind(query.limit + 1);
            }

            let mut items = q.fetch_all(&self.pool).await?;

            let mut over_limit = false;
            if query.limit > 0 && items.len() as i64 > query.limit {
                items.truncate(query.limit as usize);
                over_limit = true;
            }
            Ok((items, over_limit))
        }

        async fn list_items_for_integrity(&self, user_id: Uuid) -> StoreResult<Vec<Item>> {
            let rows = sqlx::query_as::<_, Item>(
                "SELECT * FROM items WHERE user_id = ? AND deleted = 0 AND content_type IS NOT NULL",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl PkceRepo for SqliteStore {
        async fn store_challenge(&self, challenge: &mut Pkce) -> StoreResult<()> {
            let now = Timestamp::now();
            challenge.created_at = now;
            challenge.updated_at = now;

            // Re-requesting login params with the same challenge refreshes
            // its TTL rather than failing on the primary key.
            sqlx::query(
                r#"
                INSERT INTO pkce (code_challenge, expire_at, created_at, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(code_challenge) DO UPDATE SET
                    expire_at = excluded.expire_at, updated_at = excluded.updated_at
                "#,
            )
            .bind(&challenge.code_challenge)
            .bind(challenge.expire_at)
            .bind(challenge.created_at)
            .bind(challenge.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn take_challenge(&self, code_challenge: &str) -> StoreResult<bool> {
            let result = sqlx::query("DELETE FROM pkce WHERE code_challenge = ?")
                .bind(code_challenge)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn sweep_expired_challenges(&self, now: Timestamp) -> StoreResult<u64> {
            let result = sqlx::query("DELETE FROM pkce WHERE expire_at <= ?")
                .bind(now)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{Item, Pkce, Session, User};
    use crate::repos::{ItemQuery, ItemRepo, PkceRepo, SessionRepo, UserRepo};
    use satchel_core::Timestamp;
    use uuid::Uuid;

    async fn open_store() -> (tempfile::TempDir, SqliteStore) {
        let temp = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("satchel.db"))
            .await
            .unwrap();
        (temp, store)
    }

    fn test_user(email: &str) -> User {
        User {
            email: email.to_string(),
            password: "$argon2id$stub".to_string(),
            version: "004".to_string(),
            ..User::new()
        }
    }

    fn test_session(user_id: Uuid, access: &str, refresh: &str) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id,
            user_agent: "tests".to_string(),
            api_version: "20200115".to_string(),
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expire_at: Timestamp::now().saturating_add(time::Duration::days(30)),
            created_at: Timestamp::EPOCH,
            updated_at: Timestamp::EPOCH,
        }
    }

    fn test_item(user_id: Uuid, content_type: &str) -> Item {
        Item {
            id: Uuid::new_v4(),
            user_id,
            content: "ciphertext".to_string(),
            content_type: Some(content_type.to_string()),
            enc_item_key: "enc-key".to_string(),
            items_key_id: None,
            deleted: false,
            created_at: Timestamp::EPOCH,
            updated_at: Timestamp::EPOCH,
        }
    }

    #[tokio::test]
    async fn user_email_is_unique() {
        let (_temp, store) = open_store().await;
        let mut user = test_user("george.abitbol@nowhere.lan");
        store.create_user(&mut user).await.unwrap();
        assert!(!user.created_at.is_epoch());

        let mut dup = test_user("george.abitbol@nowhere.lan");
        match store.create_user(&mut dup).await {
            Err(StoreError::Constraint(_)) => {}
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn user_lookup_round_trip() {
        let (_temp, store) = open_store().await;
        let mut user = test_user("lookup@nowhere.lan");
        store.create_user(&mut user).await.unwrap();

        let by_id = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, user.email);
        let by_mail = store
            .get_user_by_email("lookup@nowhere.lan")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_mail.id, user.id);
        assert!(store.get_user(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_item_stamps_timestamps() {
        let (_temp, store) = open_store().await;
        let user_id = Uuid::new_v4();
        let mut item = test_item(user_id, "Note");
        item.created_at = Timestamp::from_unix_nanos(42);
        item.updated_at = Timestamp::from_unix_nanos(42);

        store.save_item(&mut item).await.unwrap();
        assert!(item.updated_at.unix_nanos() > 42);
        assert_eq!(item.created_at, item.updated_at);

        let created = item.created_at;
        let first_update = item.updated_at;
        item.content = "new ciphertext".to_string();
        store.save_item(&mut item).await.unwrap();
        // created_at survives updates, updated_at moves forward.
        assert_eq!(item.created_at, created);
        assert!(item.updated_at > first_update);
    }

    #[tokio::test]
    async fn save_item_rejects_foreign_uuid() {
        let (_temp, store) = open_store().await;
        let mut item = test_item(Uuid::new_v4(), "Note");
        store.save_item(&mut item).await.unwrap();

        let mut stolen = item.clone();
        stolen.user_id = Uuid::new_v4();
        match store.save_item(&mut stolen).await {
            Err(StoreError::Constraint(_)) => {}
            other => panic!("expected constraint violation, got {other:?}"),
        }

        // The original row is untouched.
        let kept = store
            .get_item_by_user(item.id, item.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.user_id, item.user_id);
    }

    #[tokio::test]
    async fn list_items_strict_vs_inclusive() {
        let (_temp, store) = open_store().await;
        let user_id = Uuid::new_v4();
        let mut item = test_item(user_id, "Note");
        store.save_item(&mut item).await.unwrap();

        let base = ItemQuery {
            user_id,
            content_type: None,
            updated_after: Some(item.updated_at),
            strict: true,
            exclude_deleted: false,
            limit: 0,
        };

        let (strict, _) = store.list_items(&base).await.unwrap();
        assert!(strict.is_empty());

        let inclusive = ItemQuery {
            strict: false,
            ..base
        };
        let (inclusive, _) = store.list_items(&inclusive).await.unwrap();
        assert_eq!(inclusive.len(), 1);
    }

    #[tokio::test]
    async fn list_items_limit_sentinel() {
        let (_temp, store) = open_store().await;
        let user_id = Uuid::new_v4();
        for _ in 0..3 {
            store.save_item(&mut test_item(user_id, "Note")).await.unwrap();
        }

        let query = ItemQuery {
            user_id,
            content_type: None,
            updated_after: None,
            strict: false,
            exclude_deleted: false,
            limit: 2,
        };
        let (items, over_limit) = store.list_items(&query).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(over_limit);
        // Newest first.
        assert!(items[0].updated_at >= items[1].updated_at);

        let (all, over_limit) = store
            .list_items(&ItemQuery {
                limit: 0,
                ..query.clone()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(!over_limit);

        let (exact, over_limit) = store
            .list_items(&ItemQuery { limit: 3, ..query })
            .await
            .unwrap();
        assert_eq!(exact.len(), 3);
        assert!(!over_limit);
    }

    #[tokio::test]
    async fn list_items_filters() {
        let (_temp, store) = open_store().await;
        let user_id = Uuid::new_v4();
        store.save_item(&mut test_item(user_id, "Note")).await.unwrap();
        store
            .save_item(&mut test_item(user_id, "SN|ItemsKey"))
            .await
            .unwrap();
        let mut tombstone = test_item(user_id, "Note");
        tombstone.deleted = true;
        store.save_item(&mut tombstone).await.unwrap();

        let query = ItemQuery {
            user_id,
            content_type: Some("Note".to_string()),
            updated_after: None,
            strict: false,
            exclude_deleted: true,
            limit: 0,
        };
        let (items, _) = store.list_items(&query).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content_type.as_deref(), Some("Note"));

        let integrity = store.list_items_for_integrity(user_id).await.unwrap();
        assert_eq!(integrity.len(), 2);
        assert!(integrity.iter().all(|i| !i.deleted));
    }

    #[tokio::test]
    async fn session_token_rotation_is_cas() {
        let (_temp, store) = open_store().await;
        let mut session = test_session(Uuid::new_v4(), "old-access", "old-refresh");
        store.create_session(&mut session).await.unwrap();

        let expire = Timestamp::now().saturating_add(time::Duration::days(365));
        let won = store
            .rotate_session_tokens(
                session.id,
                "old-access",
                "old-refresh",
                "new-access",
                "new-refresh",
                expire,
            )
            .await
            .unwrap();
        assert!(won);

        // Second rotation with the stale pair loses.
        let won = store
            .rotate_session_tokens(
                session.id,
                "old-access",
                "old-refresh",
                "other-access",
                "other-refresh",
                expire,
            )
            .await
            .unwrap();
        assert!(!won);

        let row = store
            .get_session_by_tokens(session.id, "new-access", "new-refresh")
            .await
            .unwrap();
        assert!(row.is_some());
        assert!(
            store
                .get_session_by_access_token(session.id, "old-access")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn session_deletion_scopes() {
        let (_temp, store) = open_store().await;
        let user_id = Uuid::new_v4();
        let mut a = test_session(user_id, "a-access", "a-refresh");
        let mut b = test_session(user_id, "b-access", "b-refresh");
        let mut c = test_session(user_id, "c-access", "c-refresh");
        store.create_session(&mut a).await.unwrap();
        store.create_session(&mut b).await.unwrap();
        store.create_session(&mut c).await.unwrap();

        let removed = store.delete_other_sessions(user_id, a.id).await.unwrap();
        assert_eq!(removed, 2);
        let remaining = store
            .list_active_sessions(user_id, Timestamp::now())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, a.id);

        let removed = store.delete_sessions_for_user(user_id).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn pkce_consume_once() {
        let (_temp, store) = open_store().await;
        let mut challenge = Pkce {
            code_challenge: "challenge".to_string(),
            expire_at: Timestamp::now().saturating_add(time::Duration::hours(1)),
            created_at: Timestamp::EPOCH,
            updated_at: Timestamp::EPOCH,
        };
        store.store_challenge(&mut challenge).await.unwrap();

        assert!(store.take_challenge("challenge").await.unwrap());
        assert!(!store.take_challenge("challenge").await.unwrap());
    }

    #[tokio::test]
    async fn pkce_sweep_expired() {
        let (_temp, store) = open_store().await;
        let mut stale = Pkce {
            code_challenge: "stale".to_string(),
            expire_at: Timestamp::from_unix_nanos(1),
            created_at: Timestamp::EPOCH,
            updated_at: Timestamp::EPOCH,
        };
        let mut fresh = Pkce {
            code_challenge: "fresh".to_string(),
            expire_at: Timestamp::now().saturating_add(time::Duration::hours(1)),
            created_at: Timestamp::EPOCH,
            updated_at: Timestamp::EPOCH,
        };
        store.store_challenge(&mut stale).await.unwrap();
        store.store_challenge(&mut fresh).await.unwrap();

        let swept = store
            .sweep_expired_challenges(Timestamp::now())
            .await
            .unwrap();
        assert_eq!(swept, 1);
        assert!(store.take_challenge("fresh").await.unwrap());
        assert!(!store.take_challenge("stale").await.unwrap());
    }
}
