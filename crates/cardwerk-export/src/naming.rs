// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folder and file naming for export bundles.

use std::collections::HashSet;

/// Fallback for names that sanitise to nothing.
pub const UNNAMED: &str = "Unnamed";

const FORBIDDEN: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Make one path segment safe: drop `\ / * ? : " < > |`, trim, and turn
/// spaces into underscores.
pub fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !FORBIDDEN.contains(c)).collect();
    let cleaned = cleaned.trim().replace(' ', "_");
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        UNNAMED.to_string()
    } else {
        cleaned
    }
}

/// Sanitise each `/`-separated segment; empty segments are dropped.
pub fn sanitize_folder_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split(['/', '\\'])
        .filter(|s| !s.trim().is_empty())
        .map(sanitize_segment)
        .collect();
    if segments.is_empty() {
        UNNAMED.to_string()
    } else {
        segments.join("/")
    }
}

/// `candidate` if unused, else the first free `candidate_1`, `candidate_2`, ...
pub fn unique_name(existing: &HashSet<String>, candidate: &str) -> String {
    if !existing.contains(candidate) {
        return candidate.to_string();
    }
    (1u64..)
        .map(|n| format!("{candidate}_{n}"))
        .find(|name| !existing.contains(name))
        .unwrap_or_else(|| candidate.to_string())
}

/// `set/card` folder for a pair, sanitised.
pub fn pair_folder(set_name: &str, card_name: &str) -> String {
    if set_name.trim().is_empty() {
        sanitize_segment(card_name)
    } else {
        format!("{}/{}", sanitize_segment(set_name), sanitize_segment(card_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_characters_are_stripped() {
        assert_eq!(sanitize_segment(r#"Pika:chu? "EX" <1/2>"#), "Pikachu_EX_12");
        assert_eq!(sanitize_segment("  Base Set  "), "Base_Set");
    }

    #[test]
    fn empty_names_become_unnamed() {
        assert_eq!(sanitize_segment("???"), UNNAMED);
        assert_eq!(sanitize_segment(".."), UNNAMED);
        assert_eq!(sanitize_folder_path("//"), UNNAMED);
    }

    #[test]
    fn folder_paths_sanitise_each_segment() {
        assert_eq!(sanitize_folder_path("Base Set/Char*mander"), "Base_Set/Charmander");
        assert_eq!(sanitize_folder_path("a//b/"), "a/b");
    }

    #[test]
    fn unique_name_suffixes_until_free() {
        let mut existing = HashSet::new();
        assert_eq!(unique_name(&existing, "Pikachu"), "Pikachu");
        existing.insert("Pikachu".to_string());
        existing.insert("Pikachu_1".to_string());
        assert_eq!(unique_name(&existing, "Pikachu"), "Pikachu_2");
    }

    #[test]
    fn pair_folder_nests_card_under_set() {
        assert_eq!(pair_folder("Jungle", "Scyther"), "Jungle/Scyther");
        assert_eq!(pair_folder("", "Scyther"), "Scyther");
    }
}
