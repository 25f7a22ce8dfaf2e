//! SQLite storage implementation

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use super::{MediaStore, schema};
use crate::Result;
use crate::asset::{AssetId, AssetRecord, ContentId};

/// Content types whose bodies never reference assets
const UNSCANNED_POST_TYPES: &str = "'attachment', 'revision', 'nav_menu_item'";

/// Statuses whose bodies are scanned
const SCANNED_POST_STATUSES: &str = "'publish', 'draft', 'future', 'private'";

/// Most ids bound into one `IN (...)` query; SQLite caps host parameters at 32766
const MAX_BOUND_IDS: usize = 10_000;

/// SQLite-backed content/asset store
pub struct SqliteStore {
    conn: Connection,
    /// `upload_base_url`, read on first use and dropped whenever the option is written
    base_url: RefCell<Option<String>>,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn);
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self::from_connection(conn);
        store.initialize_schema()?;
        Ok(store)
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            base_url: RefCell::new(None),
        }
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Writers ==========

    /// Insert or replace a post row
    pub fn insert_post(
        &self,
        id: u64,
        post_type: &str,
        post_status: &str,
        mime_type: &str,
        content: &str,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO posts (id, post_type, post_status, post_mime_type, post_content)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![id as i64, post_type, post_status, mime_type, content],
        )?;
        Ok(())
    }

    /// Insert an attachment and record the file path it is served under
    pub fn insert_attachment(&self, id: u64, mime_type: &str, attached_file: &str) -> Result<()> {
        self.insert_post(id, "attachment", "inherit", mime_type, "")?;
        self.insert_meta(id, schema::ATTACHED_FILE_META_KEY, attached_file)
    }

    /// Insert a content record with a body
    pub fn insert_content(&self, id: u64, post_type: &str, post_status: &str, body: &str) -> Result<()> {
        self.insert_post(id, post_type, post_status, "", body)
    }

    /// Append a metadata row
    pub fn insert_meta(&self, post_id: u64, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO postmeta (post_id, meta_key, meta_value) VALUES (?1, ?2, ?3)",
            params![post_id as i64, key, value],
        )?;
        Ok(())
    }

    /// Insert or replace a site option
    pub fn set_option(&self, name: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO options (name, value) VALUES (?1, ?2)",
            params![name, value],
        )?;
        if name == schema::UPLOAD_BASE_URL_OPTION {
            self.base_url.replace(None);
        }
        Ok(())
    }

    /// Set the local asset base URL
    pub fn set_asset_base_url(&self, url: &str) -> Result<()> {
        self.set_option(schema::UPLOAD_BASE_URL_OPTION, url)
    }

    // ========== Readers ==========

    /// Read a site option
    pub fn get_option(&self, name: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM options WHERE name = ?1", [name], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    /// Inventory counts
    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(StoreStats {
            posts: count("SELECT COUNT(*) FROM posts")?,
            attachments: count("SELECT COUNT(*) FROM posts WHERE post_type = 'attachment'")?,
            image_assets: count(
                "SELECT COUNT(*) FROM posts WHERE post_type = 'attachment' AND post_mime_type LIKE 'image/%'",
            )?,
            scannable: count(&format!(
                "SELECT COUNT(*) FROM posts WHERE post_type NOT IN ({}) AND post_status IN ({})",
                UNSCANNED_POST_TYPES, SCANNED_POST_STATUSES
            ))?,
            meta_rows: count("SELECT COUNT(*) FROM postmeta")?,
        })
    }

    /// Every attachment with its MIME type, ascending by id
    pub fn list_attachment_records(&self) -> Result<Vec<AssetRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, post_mime_type FROM posts WHERE post_type = 'attachment' ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<(i64, String)>>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, mime_type)| {
                let id = u64::try_from(id).ok().and_then(AssetId::new)?;
                Some(AssetRecord { id, mime_type })
            })
            .collect())
    }

    /// One `IN (...)` query over at most `MAX_BOUND_IDS` ids
    fn fetch_body_chunk(&self, ids: &[ContentId], bodies: &mut BTreeMap<ContentId, String>) -> Result<()> {
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!(
            "SELECT id, post_content FROM posts WHERE id IN ({})",
            placeholders
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter().map(|id| id.0 as i64)), |row| {
            let id = ContentId(row.get::<_, i64>(0)? as u64);
            let body = match row.get_ref(1)? {
                ValueRef::Text(bytes) | ValueRef::Blob(bytes) => match std::str::from_utf8(bytes) {
                    Ok(text) => text.to_string(),
                    Err(_) => {
                        tracing::warn!("Content {} is not valid UTF-8; scanning a lossy copy", id.0);
                        String::from_utf8_lossy(bytes).into_owned()
                    }
                },
                ValueRef::Null => String::new(),
                ValueRef::Integer(n) => n.to_string(),
                ValueRef::Real(n) => n.to_string(),
            };
            Ok((id, body))
        })?;

        for row in rows {
            let (id, body) = row?;
            bodies.insert(id, body);
        }
        Ok(())
    }

    /// Run a single-column id query, dropping values that are not valid ids
    fn query_asset_ids(&self, sql: &str) -> Result<Vec<AssetId>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raw = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;

        Ok(raw
            .into_iter()
            .filter_map(|id| u64::try_from(id).ok().and_then(AssetId::new))
            .collect())
    }
}

impl MediaStore for SqliteStore {
    fn list_image_asset_ids(&self) -> Result<Vec<AssetId>> {
        Ok(self
            .list_attachment_records()?
            .into_iter()
            .filter(AssetRecord::is_image)
            .map(|record| record.id)
            .collect())
    }

    fn list_metadata_values(&self, key: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT meta_value FROM postmeta WHERE meta_key = ?1 AND meta_value <> ''",
        )?;
        let values = stmt
            .query_map([key], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(values)
    }

    fn find_direct_integer_references(&self) -> Result<Vec<AssetId>> {
        // GLOB '*[^0-9]*' matches any value holding a non-digit
        self.query_asset_ids(
            r#"
            SELECT DISTINCT att.id
            FROM postmeta pm
            INNER JOIN posts att ON att.id = CAST(pm.meta_value AS INTEGER)
            WHERE pm.meta_value <> ''
              AND pm.meta_value NOT GLOB '*[^0-9]*'
              AND att.post_type = 'attachment'
              AND att.post_mime_type LIKE 'image/%'
            ORDER BY att.id
            "#,
        )
    }

    fn list_scannable_content_ids(&self) -> Result<Vec<ContentId>> {
        let sql = format!(
            "SELECT id FROM posts WHERE post_type NOT IN ({}) AND post_status IN ({}) ORDER BY id",
            UNSCANNED_POST_TYPES, SCANNED_POST_STATUSES
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids.into_iter().map(|id| ContentId(id as u64)).collect())
    }

    fn fetch_content_bodies(&self, ids: &[ContentId]) -> Result<BTreeMap<ContentId, String>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut bodies = BTreeMap::new();
        for chunk in ids.chunks(MAX_BOUND_IDS) {
            self.fetch_body_chunk(chunk, &mut bodies)?;
        }
        Ok(bodies)
    }

    fn resolve_url_to_asset_id(&self, url: &str) -> Result<Option<AssetId>> {
        let base = self.asset_base_url()?;
        let Some(rest) = url.strip_prefix(base.trim_end_matches('/')) else {
            return Ok(None);
        };
        let path = rest.trim_start_matches('/');
        let path = path.split(['?', '#']).next().unwrap_or(path);
        if path.is_empty() {
            return Ok(None);
        }

        let id: Option<i64> = self
            .conn
            .query_row(
                r#"
                SELECT post_id FROM postmeta
                WHERE meta_key = ?1 AND meta_value = ?2
                ORDER BY post_id
                LIMIT 1
                "#,
                params![schema::ATTACHED_FILE_META_KEY, path],
                |row| row.get(0),
            )
            .optional()?;

        Ok(id.and_then(|id| u64::try_from(id).ok()).and_then(AssetId::new))
    }

    fn asset_base_url(&self) -> Result<String> {
        if let Some(cached) = self.base_url.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let base = self
            .get_option(schema::UPLOAD_BASE_URL_OPTION)?
            .unwrap_or_default();
        self.base_url.replace(Some(base.clone()));
        Ok(base)
    }
}

/// Store inventory statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub posts: usize,
    pub attachments: usize,
    pub image_assets: usize,
    pub scannable: usize,
    pub meta_rows: usize,
}
