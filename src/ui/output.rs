use crate::asset::AssetId;
use crate::scan::Summary;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::BROOM, text.style(theme().header));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success));
}

/// Warnings go to stderr so JSON on stdout stays clean
pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info),
        label.style(theme().label),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header));
}

/// One-line used/unused split, e.g. `🖼️ 12 images  🔗 9 used  🗑️ 3 unused`
pub fn classification(summary: &Summary) -> String {
    format!(
        "{} {} images  {} {} used  {} {} unused",
        Icons::IMAGE,
        summary.total_images,
        Icons::LINK,
        summary.used.style(theme().used),
        Icons::DEL,
        summary.unused.style(theme().unused)
    )
}

/// Comma-separated ids, or a faint `(none)`
pub fn id_list(ids: &[AssetId]) -> String {
    if ids.is_empty() {
        return "(none)".style(theme().empty).to_string();
    }
    ids.iter().map(AssetId::to_string).collect::<Vec<_>>().join(", ")
}
