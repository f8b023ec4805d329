// utils/file.rs
//! File-related utilities

/// # Reduce a client-supplied filename to something safe to store
///
/// Only the final path segment is kept, for both `/` and `\` separators, since some clients send
/// full paths. Names that end up empty or special become `upload`.
pub fn base_name(original: &str) -> String {
    let name: String = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect();

    match name.trim() {
        | "" | "." | ".." => "upload".to_owned(),
        | _ => name,
    }
}
