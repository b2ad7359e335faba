pub(crate) mod check;
pub(crate) mod config;
pub(crate) mod parse;
pub(crate) mod run;

use std::io::Read as _;
use std::path::Path;

use anyhow::{Context, Result};

/// Read the whole input: a file, or stdin when no path is given.
pub(crate) fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        },
    }
}

/// Split `text` into chunks of `size` characters, as a model would stream
/// it. A size of zero yields the whole text as one chunk.
pub(crate) fn chunks(text: &str, size: usize) -> Vec<&str> {
    if size == 0 {
        return vec![text];
    }

    let mut out = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == size {
            out.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count = count.saturating_add(1);
    }
    out.push(&text[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_whole() {
        assert_eq!(chunks("abc", 0), vec!["abc"]);
        assert_eq!(chunks("", 3), vec![""]);
    }

    #[test]
    fn test_chunks_by_chars() {
        assert_eq!(chunks("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(chunks("héllo", 2), vec!["hé", "ll", "o"]);
        assert_eq!(chunks("ab", 5), vec!["ab"]);
    }

    #[test]
    fn test_chunks_rejoin() {
        let text = "see <bash>ls</bash> then <ask/>";
        for size in 1..8 {
            assert_eq!(chunks(text, size).concat(), text);
        }
    }

    #[test]
    fn test_read_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply.txt");
        std::fs::write(&path, "<thinking>hm</thinking>").unwrap();
        assert_eq!(
            read_input(Some(&path)).unwrap(),
            "<thinking>hm</thinking>"
        );
        assert!(read_input(Some(&dir.path().join("missing"))).is_err());
    }
}
