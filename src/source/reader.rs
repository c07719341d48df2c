use crate::config::types::SourceConfig;
use crate::source::encoding::{candidates_from_labels, decode_first, DecodeError, TextEncoding};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("io error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A decoded log file.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub file_name: String,
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub encoding: TextEncoding,
}

impl RawFile {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Aggregate view over the files read in one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadSummary {
    pub total_files: usize,
    pub total_lines: usize,
    pub encodings_used: Vec<TextEncoding>,
    /// (file name, line count), largest first
    pub files_by_size: Vec<(String, usize)>,
}

/// Discovers log files in a source directory and decodes them.
#[derive(Debug, Clone)]
pub struct FileReader {
    directory: PathBuf,
    extension: String,
    encodings: Vec<TextEncoding>,
    recursive: bool,
}

impl FileReader {
    /// A relative `directory` is resolved against the working directory.
    pub fn new(directory: PathBuf, extension: &str, encodings: Vec<TextEncoding>) -> Self {
        let directory = std::path::absolute(&directory).unwrap_or(directory);
        Self {
            directory,
            extension: extension.trim_start_matches('.').to_string(),
            encodings,
            recursive: false,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, DecodeError> {
        let encodings = candidates_from_labels(&config.encodings)?;
        let mut reader = Self::new(config.directory.clone(), &config.extension, encodings);
        reader.recursive = config.recursive;
        Ok(reader)
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// List matching files, sorted lexicographically by path.
    ///
    /// A missing source directory yields an empty list.
    pub fn list_files(&self) -> Vec<PathBuf> {
        if !self.directory.is_dir() {
            error!(directory = %self.directory.display(), "Source directory not found");
            return Vec::new();
        }

        let mut files = Vec::new();
        self.collect_files(&self.directory, &mut files);
        files.sort();

        info!(
            directory = %self.directory.display(),
            count = files.len(),
            extension = %self.extension,
            "Discovered log files"
        );
        for file in &files {
            debug!(path = %file.display(), "Found log file");
        }

        files
    }

    fn collect_files(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!(directory = %dir.display(), error = %e, "Failed to list directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if self.recursive {
                    self.collect_files(&path, files);
                }
            } else if path.is_file() && self.matches_extension(&path) {
                files.push(path);
            }
        }
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }

    /// Read one file, trying each candidate encoding in order.
    pub fn read_file(&self, path: &Path) -> Result<RawFile, ReaderError> {
        read_raw_file(path, &self.encodings)
    }

    /// Read every matching file.
    ///
    /// Files are decoded concurrently and returned in sorted-path order.
    /// Unreadable files are logged and skipped.
    pub async fn read_all(&self) -> Vec<RawFile> {
        let paths = self.list_files();
        if paths.is_empty() {
            warn!("No files to process");
            return Vec::new();
        }

        let tasks = paths.into_iter().map(|path| {
            let encodings = self.encodings.clone();
            tokio::task::spawn_blocking(move || read_raw_file(&path, &encodings))
        });

        let mut files = Vec::new();
        for result in futures::future::join_all(tasks).await {
            match result.map_err(ReaderError::from).and_then(|r| r) {
                Ok(file) => files.push(file),
                Err(e) => error!(error = %e, "Skipping unreadable file"),
            }
        }

        let total_lines: usize = files.iter().map(RawFile::line_count).sum();
        info!(files = files.len(), lines = total_lines, "Finished reading source files");

        files
    }
}

fn read_raw_file(path: &Path, encodings: &[TextEncoding]) -> Result<RawFile, ReaderError> {
    let bytes = std::fs::read(path).map_err(|source| ReaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let (encoding, text) = decode_first(&bytes, encodings).map_err(|source| ReaderError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let lines = split_lines(&text);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    info!(
        file = %file_name,
        lines = lines.len(),
        encoding = %encoding,
        "Read log file"
    );

    Ok(RawFile {
        file_name,
        path: path.to_path_buf(),
        lines,
        encoding,
    })
}

/// Split on `\r\n`, `\n` or a lone `\r`. A final terminator does not
/// produce a trailing empty line.
fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(['\r', '\n']) {
        lines.push(rest[..pos].to_string());
        let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[pos + skip..];
    }
    if !rest.is_empty() {
        lines.push(rest.to_string());
    }
    lines
}

pub fn summarize(files: &[RawFile]) -> ReadSummary {
    let encodings_used: BTreeSet<TextEncoding> = files.iter().map(|f| f.encoding).collect();

    let mut files_by_size: Vec<(String, usize)> = files
        .iter()
        .map(|f| (f.file_name.clone(), f.line_count()))
        .collect();
    files_by_size.sort_by(|a, b| b.1.cmp(&a.1));

    ReadSummary {
        total_files: files.len(),
        total_lines: files.iter().map(RawFile::line_count).sum(),
        encodings_used: encodings_used.into_iter().collect(),
        files_by_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn default_candidates() -> Vec<TextEncoding> {
        vec![
            TextEncoding::Utf8,
            TextEncoding::Latin1,
            TextEncoding::Windows1252,
            TextEncoding::Cp850,
        ]
    }

    #[test]
    fn test_list_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.log"), "x").unwrap();
        fs::write(dir.path().join("a.LOG"), "x").unwrap();
        fs::write(dir.path().join("c.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("d.log"), "x").unwrap();

        let reader = FileReader::new(dir.path().to_path_buf(), ".log", default_candidates());
        let names: Vec<String> = reader
            .list_files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.LOG", "b.log"]);
    }

    #[test]
    fn test_list_files_recursive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.log"), "x").unwrap();
        fs::create_dir(dir.path().join("a_nested")).unwrap();
        fs::write(dir.path().join("a_nested").join("d.log"), "x").unwrap();

        let reader = FileReader::new(dir.path().to_path_buf(), "log", default_candidates())
            .with_recursive(true);
        let files = reader.list_files();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a_nested/d.log"));
        assert!(files[1].ends_with("b.log"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let reader = FileReader::new(dir.path().join("absent"), ".log", default_candidates());
        assert!(reader.list_files().is_empty());
    }

    #[test]
    fn test_read_file_latin1_fallback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plant.log");
        fs::write(&path, b"linha 1\r\nPress\xe3o baixa\n").unwrap();

        let reader = FileReader::new(dir.path().to_path_buf(), ".log", default_candidates());
        let file = reader.read_file(&path).unwrap();
        assert_eq!(file.encoding, TextEncoding::Latin1);
        assert_eq!(file.lines, vec!["linha 1", "Pressão baixa"]);
        assert_eq!(file.line_count(), 2);
        assert_eq!(file.file_name, "plant.log");
    }

    #[test]
    fn test_read_file_exhausted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.log");
        fs::write(&path, b"\xff\x81").unwrap();

        let reader = FileReader::new(
            dir.path().to_path_buf(),
            ".log",
            vec![TextEncoding::Utf8, TextEncoding::Windows1252],
        );
        let result = reader.read_file(&path);
        assert!(matches!(result, Err(ReaderError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_read_all_skips_undecodable_and_keeps_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.log"), "first\n").unwrap();
        fs::write(dir.path().join("b.log"), b"\xff\x81").unwrap();
        fs::write(dir.path().join("c.log"), "third\nfourth\n").unwrap();

        let reader = FileReader::new(
            dir.path().to_path_buf(),
            ".log",
            vec![TextEncoding::Utf8, TextEncoding::Windows1252],
        );
        let files = reader.read_all().await;
        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.log", "c.log"]);

        let summary = summarize(&files);
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.total_lines, 3);
        assert_eq!(summary.encodings_used, vec![TextEncoding::Utf8]);
        assert_eq!(summary.files_by_size[0], ("c.log".to_string(), 2));
    }

    #[test]
    fn test_encoded_lines_round_trip() {
        let dir = TempDir::new().unwrap();
        let original = ["2025-10-05 07:12:33,4 [PC510A00] FMDOS01 CFN ALARM Pressão", "Nível baixo ç"];

        for encoding in [TextEncoding::Utf8, TextEncoding::Latin1] {
            let content = original.join("\n");
            let bytes: Vec<u8> = match encoding {
                TextEncoding::Utf8 => content.as_bytes().to_vec(),
                _ => content.chars().map(|c| c as u32 as u8).collect(),
            };
            let path = dir.path().join(format!("{}.log", encoding.label()));
            fs::write(&path, bytes).unwrap();

            let reader = FileReader::new(dir.path().to_path_buf(), ".log", vec![encoding]);
            let file = reader.read_file(&path).unwrap();
            assert_eq!(file.lines, original);
        }
    }

    #[test]
    fn test_split_lines_mixed_terminators() {
        assert_eq!(split_lines("a\r\nb\nc\rd"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_lines("a\r\r\nb\r"), vec!["a", "", "b"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn test_carriage_return_only_file_keeps_every_alarm() {
        use crate::alarm::event::Stage;
        use crate::alarm::parser::AlarmParser;
        use crate::config::types::ParserConfig;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panel.log");
        fs::write(
            &path,
            "2025-10-05 07:12:33,4 [PC510A00] FMDOS01 CFN ALARM Erro dosagem\r\
             2025-10-05 07:20:00,5 [PC510A00] FMDOS01 OK ALARM Erro dosagem\r",
        )
        .unwrap();

        let reader = FileReader::new(dir.path().to_path_buf(), ".log", default_candidates());
        let file = reader.read_file(&path).unwrap();
        assert_eq!(file.line_count(), 2);
        assert!(file.lines[0].ends_with("CFN ALARM Erro dosagem"));

        let parser = AlarmParser::from_config(&ParserConfig::default()).unwrap();
        let parsed = parser.parse_file(&file);
        let stages: Vec<Stage> = parsed.events.iter().map(|e| e.stage).collect();
        assert_eq!(stages, vec![Stage::Confirmed, Stage::Resolved]);
    }

    #[test]
    fn test_relative_directory_is_made_absolute() {
        let reader = FileReader::new(PathBuf::from("plant/logs"), ".log", default_candidates());
        assert!(reader.directory().is_absolute());
        assert!(reader.directory().ends_with("plant/logs"));
    }
}
