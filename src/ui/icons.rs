pub struct Icons;

impl Icons {
    pub const BROOM: &str = "🧹";
    pub const CHECK: &str = "✅";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const STATS: &str = "📊";
    pub const LINK: &str = "🔗";
    pub const IMAGE: &str = "🖼️";
    pub const DEL: &str = "🗑️";
}
