//! Database schema definitions

/// SQL to create the posts table (content records and attachments alike)
pub const CREATE_POSTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY,
    post_type TEXT NOT NULL,
    post_status TEXT NOT NULL DEFAULT 'publish',
    post_mime_type TEXT NOT NULL DEFAULT '',
    post_content TEXT NOT NULL DEFAULT ''
)
"#;

/// SQL to create the postmeta table
pub const CREATE_POSTMETA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS postmeta (
    meta_id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL,
    meta_key TEXT NOT NULL,
    meta_value TEXT
)
"#;

/// SQL to create the options table
/// Holds site-wide settings such as the upload base URL
pub const CREATE_OPTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS options (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_posts_type ON posts(post_type)",
    "CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(post_status)",
    "CREATE INDEX IF NOT EXISTS idx_postmeta_key ON postmeta(meta_key)",
    "CREATE INDEX IF NOT EXISTS idx_postmeta_post ON postmeta(post_id)",
];

/// Option name holding the local asset base URL
pub const UPLOAD_BASE_URL_OPTION: &str = "upload_base_url";

/// Meta key mapping an attachment to its path below the upload base
pub const ATTACHED_FILE_META_KEY: &str = "_wp_attached_file";

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_POSTS_TABLE,
        CREATE_POSTMETA_TABLE,
        CREATE_OPTIONS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
