use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DISALLOWED_NAME_CHARACTERS: Regex = Regex::new(r"[^a-z0-9\-]+").unwrap();
}

/// Turns a display name into the key rooms are searched by.
/// Lowercases, turns spaces and underscores into hyphens, and drops everything else that isn't alphanumeric.
pub fn normalize_name(name: &str) -> String {
    let name = name.trim().to_lowercase().replace([' ', '_'], "-");

    DISALLOWED_NAME_CHARACTERS
        .replace_all(&name, "")
        .into_owned()
}
