use crate::site::error::{SiteError, SiteResult};
use crate::site::types::{NewSite, Site};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;

/// Unit of work for one ingestion batch.
pub type BatchTransaction = Transaction<'static, Sqlite>;

const SITE_COLUMNS: &str = "site_id, org_id, pub_key, online, last_bandwidth_update, \
                            megabytes_in, megabytes_out, transport";

pub struct SiteStore {
    pool: SqlitePool,
}

impl SiteStore {
    /// Open (or create) a SQLite-backed site store
    pub async fn new(database_url: &str) -> SiteResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Self::with_pool(pool).await
    }

    /// Create site store with in-memory database (for testing)
    ///
    /// Pinned to a single connection that never expires, otherwise each pooled
    /// connection would see its own empty database.
    pub async fn new_in_memory() -> SiteResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> SiteResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sites (
                site_id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                pub_key TEXT NOT NULL UNIQUE,
                online BOOLEAN NOT NULL DEFAULT 0,
                last_bandwidth_update INTEGER,
                megabytes_in INTEGER NOT NULL DEFAULT 0,
                megabytes_out INTEGER NOT NULL DEFAULT 0,
                transport TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS node_org_access (
                node_id TEXT NOT NULL,
                org_id TEXT NOT NULL,
                PRIMARY KEY (node_id, org_id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sites_org ON sites(org_id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Start the transaction that wraps every write of one batch
    pub async fn begin(&self) -> SiteResult<BatchTransaction> {
        Ok(self.pool.begin().await?)
    }

    // ============== Transactional operations (used by ingestion) ==============

    /// Resolve a peer identity to its site
    pub async fn find_by_pub_key(
        conn: &mut SqliteConnection,
        pub_key: &str,
    ) -> SiteResult<Option<Site>> {
        let row = sqlx::query(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE pub_key = ?"))
            .bind(pub_key)
            .fetch_optional(&mut *conn)
            .await?;

        row.as_ref().map(site_from_row).transpose()
    }

    /// Apply an active report: mark online, add the deltas, stamp the time.
    ///
    /// The peer's inbound bytes land in `megabytes_out` and its outbound bytes
    /// in `megabytes_in`. Both counters saturate at `i64::MAX` so the columns
    /// stay INTEGER.
    pub async fn record_activity(
        conn: &mut SqliteConnection,
        site_id: &str,
        bytes_in: i64,
        bytes_out: i64,
        now: i64,
    ) -> SiteResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sites
            SET online = 1,
                megabytes_out = CASE
                    WHEN megabytes_out > 9223372036854775807 - ? THEN 9223372036854775807
                    ELSE megabytes_out + ?
                END,
                megabytes_in = CASE
                    WHEN megabytes_in > 9223372036854775807 - ? THEN 9223372036854775807
                    ELSE megabytes_in + ?
                END,
                last_bandwidth_update = ?
            WHERE site_id = ?
            "#,
        )
        .bind(bytes_in)
        .bind(bytes_in)
        .bind(bytes_out)
        .bind(bytes_out)
        .bind(now)
        .bind(site_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SiteError::NotFound(site_id.to_string()));
        }
        Ok(())
    }

    /// Flip a site offline. Returns false when it already was.
    pub async fn mark_offline(conn: &mut SqliteConnection, site_id: &str) -> SiteResult<bool> {
        let result = sqlx::query("UPDATE sites SET online = 0 WHERE site_id = ? AND online = 1")
            .bind(site_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether a reporting node may update sites of the given organization
    pub async fn is_node_authorized(
        conn: &mut SqliteConnection,
        node_id: &str,
        org_id: &str,
    ) -> SiteResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM node_org_access WHERE node_id = ? AND org_id = ?",
        )
        .bind(node_id)
        .bind(org_id)
        .fetch_one(&mut *conn)
        .await?;

        let count: i64 = row.try_get("count")?;
        Ok(count > 0)
    }

    // ============== Out-of-band registration and reads ==============

    /// Register a site
    pub async fn register_site(&self, site: &NewSite) -> SiteResult<Site> {
        let result = sqlx::query(
            r#"
            INSERT INTO sites (site_id, org_id, pub_key, online, last_bandwidth_update, transport)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&site.site_id)
        .bind(&site.org_id)
        .bind(&site.pub_key)
        .bind(site.online)
        .bind(site.last_bandwidth_update)
        .bind(&site.transport)
        .execute(&self.pool)
        .await;

        if let Err(sqlx::Error::Database(db_err)) = &result {
            if db_err.is_unique_violation() {
                return Err(SiteError::AlreadyExists(site.site_id.clone()));
            }
        }
        result?;

        self.get_site(&site.site_id)
            .await?
            .ok_or_else(|| SiteError::NotFound(site.site_id.clone()))
    }

    /// Allow a reporting node to update sites of an organization
    pub async fn grant_node_access(&self, node_id: &str, org_id: &str) -> SiteResult<()> {
        sqlx::query("INSERT OR IGNORE INTO node_org_access (node_id, org_id) VALUES (?, ?)")
            .bind(node_id)
            .bind(org_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Load a site by ID
    pub async fn get_site(&self, site_id: &str) -> SiteResult<Option<Site>> {
        let row = sqlx::query(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE site_id = ?"))
            .bind(site_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(site_from_row).transpose()
    }

    /// Load a site by peer identity outside of any batch
    pub async fn get_site_by_pub_key(&self, pub_key: &str) -> SiteResult<Option<Site>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_pub_key(&mut conn, pub_key).await
    }

    /// Get site count
    pub async fn count(&self) -> SiteResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM sites")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("count")?)
    }

    /// Close database connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn site_from_row(row: &SqliteRow) -> SiteResult<Site> {
    Ok(Site {
        site_id: row.try_get("site_id")?,
        org_id: row.try_get("org_id")?,
        pub_key: row.try_get("pub_key")?,
        online: row.try_get("online")?,
        last_bandwidth_update: row.try_get("last_bandwidth_update")?,
        megabytes_in: row.try_get("megabytes_in")?,
        megabytes_out: row.try_get("megabytes_out")?,
        transport: row.try_get("transport")?,
    })
}
