//! `fs/read_text_file` and `fs/write_text_file` request handlers
//! (spec §4.1).

use std::path::Path;

use crate::error::{TerminalError, TerminalResult};

/// `fs/read_text_file`: read a UTF-8 text file, optionally starting at a
/// 0-based line offset and capped to a maximum number of lines.
pub async fn read_text_file(path: &Path, line: Option<usize>, limit: Option<usize>) -> TerminalResult<String> {
    let bytes = tokio::fs::read(path).await?;
    let contents = String::from_utf8(bytes).map_err(|_| TerminalError::NotUtf8 { path: path.display().to_string() })?;

    let offset = line.unwrap_or(0);
    let mut lines = contents.split_inclusive('\n').skip(offset);
    let selected: String = match limit {
        Some(limit) => lines.by_ref().take(limit).collect(),
        None => lines.by_ref().collect(),
    };
    Ok(selected)
}

/// `fs/write_text_file`: write UTF-8 text, creating parent directories
/// only when `create_parent_dirs` is set (spec default: `false`).
pub async fn write_text_file(path: &Path, content: &str, create_parent_dirs: bool) -> TerminalResult<()> {
    if create_parent_dirs {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reading_without_offset_or_limit_returns_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, "one\ntwo\nthree\n").await.unwrap();
        let content = read_text_file(&path, None, None).await.unwrap();
        assert_eq!(content, "one\ntwo\nthree\n");
    }

    #[tokio::test]
    async fn offset_and_limit_select_a_line_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, "one\ntwo\nthree\nfour\n").await.unwrap();
        let content = read_text_file(&path, Some(1), Some(2)).await.unwrap();
        assert_eq!(content, "two\nthree\n");
    }

    #[tokio::test]
    async fn non_utf8_content_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.dat");
        tokio::fs::write(&path, [0xff, 0xfe, 0x00]).await.unwrap();
        let result = read_text_file(&path, None, None).await;
        assert!(matches!(result, Err(TerminalError::NotUtf8 { .. })));
    }

    #[tokio::test]
    async fn writing_without_create_parent_dirs_fails_for_a_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("a.txt");
        let result = write_text_file(&path, "hi", false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn writing_with_create_parent_dirs_creates_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("a.txt");
        write_text_file(&path, "hi", true).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "hi");
    }
}
