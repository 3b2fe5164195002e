//! Paths and text helpers.

use std::path::PathBuf;

/// Name of the directory under the home directory holding config and data.
const APP_DIR: &str = ".needle";

/// The user's home directory, or the current directory if unknown.
#[must_use]
pub fn home_dir() -> PathBuf {
    dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `~/.needle`
#[must_use]
pub fn config_dir() -> PathBuf {
    home_dir().join(APP_DIR)
}

/// Default directory for the record files, `~/.needle/data`.
#[must_use]
pub fn data_dir() -> PathBuf {
    config_dir().join("data")
}

/// Split `text` into chunks of at most `max_len` bytes.
///
/// Lines are kept whole where possible; overlong lines are cut on character
/// boundaries.
#[must_use]
pub fn split_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len || max_len == 0 {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if !current.is_empty() && current.len() + line.len() + 1 > max_len {
            chunks.push(std::mem::take(&mut current));
        }
        if line.len() > max_len {
            let mut piece = String::new();
            for ch in line.chars() {
                if piece.len() + ch.len_utf8() > max_len {
                    chunks.push(std::mem::take(&mut piece));
                }
                piece.push(ch);
            }
            current = piece;
            continue;
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_nest_under_config_dir() {
        assert!(data_dir().starts_with(config_dir()));
        assert!(config_dir().ends_with(APP_DIR));
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(split_into_chunks("Hello", 100), vec!["Hello"]);
    }

    #[test]
    fn test_split_on_lines() {
        let chunks = split_into_chunks("Line 1\nLine 2\nLine 3\nLine 4", 15);
        assert_eq!(chunks, vec!["Line 1\nLine 2", "Line 3\nLine 4"]);
    }

    #[test]
    fn test_long_cyrillic_line_splits_on_char_boundaries() {
        let line = "крестик".repeat(10);
        let chunks = split_into_chunks(&line, 9);
        assert!(chunks.iter().all(|c| c.len() <= 9));
        assert_eq!(chunks.concat(), line);
    }
}
