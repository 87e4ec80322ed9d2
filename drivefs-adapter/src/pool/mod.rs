//! Persistent cache pools and the key scheme shared by every component.
//!
//! Keys:
//! - `<id>`: cache record of one item
//! - `DIR-<root>-<parent>`: aggregate listing of a container
//! - `parent_of_<id>`: parent link used by containment walks
//! - `<id>_content[_<format>]`: base64 payload, per export format

pub mod memory;
pub mod sqlite;

pub use memory::MemoryPool;
pub use sqlite::SqlitePool;

pub fn item_key(id: &str) -> String {
    id.to_string()
}

pub fn listing_key(root: &str, parent: &str) -> String {
    format!("DIR-{}-{}", root, parent)
}

pub fn parent_key(id: &str) -> String {
    format!("parent_of_{}", id)
}

pub fn content_key(id: &str, export_format: Option<&str>) -> String {
    match export_format {
        Some(format) if !format.is_empty() => {
            format!("{}_content_{}", id, format.replace(['/', '+'], "-"))
        }
        _ => format!("{}_content", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_scheme() {
        assert_eq!(item_key("abc"), "abc");
        assert_eq!(listing_key("root", "abc"), "DIR-root-abc");
        assert_eq!(parent_key("abc"), "parent_of_abc");
        assert_eq!(content_key("abc", None), "abc_content");
        assert_eq!(content_key("abc", Some("")), "abc_content");
        assert_eq!(
            content_key("abc", Some("application/epub+zip")),
            "abc_content_application-epub-zip"
        );
    }
}
