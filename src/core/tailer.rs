// rundex - core/tailer.rs
//
// Polling log tailer. One LogTailer owns one log file, a line parser, and
// both classifiers. A poll reads whatever bytes have appeared since the
// stored offset, folds complete lines through the parser, and feeds every
// new record to the classifiers. EOF suspends the poll; the producing
// process may still be appending, so end-of-file is never end-of-stream.
//
// The tailer owns no thread and no timer. Polling cadence is the caller's
// policy; one poll returns only what is on disk at that instant.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::core::levels::LevelClassifier;
use crate::core::markers::MarkerClassifier;
use crate::core::model::{BuiltLine, LineOutcome, LogRecord};
use crate::core::parser::LineParser;
use crate::util::constants::{MAX_TAIL_PARTIAL_BYTES, MAX_TAIL_READ_BYTES_PER_POLL};
use crate::util::error::TailError;

/// Incremental tail over one log file.
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,

    /// Byte position of the next unread byte. Advances by exactly the
    /// number of bytes consumed each poll, whether or not they closed a
    /// line.
    offset: u64,

    /// Decoded text after the last newline seen, carried to the next
    /// poll.
    partial: String,

    parser: LineParser,
    levels: LevelClassifier,
    markers: MarkerClassifier,
}

impl LogTailer {
    /// Binds `path` and starts from offset 0, so the first poll parses
    /// the whole existing file. The file must be openable now; appearing
    /// later is not supported.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, TailError> {
        let path = path.into();
        File::open(&path).map_err(|source| TailError::Open {
            path: path.clone(),
            source,
        })?;
        let markers = MarkerClassifier::with_defaults()?;
        Ok(Self {
            path,
            offset: 0,
            partial: String::new(),
            parser: LineParser::new(),
            levels: LevelClassifier::new(),
            markers,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current read offset in bytes.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads and parses everything appended since the last poll.
    ///
    /// Returns the records created by this poll; continuation lines fold
    /// into records silently. An empty slice means the file had nothing
    /// new. Reads are capped per poll, so a large backlog drains over
    /// several polls.
    pub fn poll(&mut self) -> Result<&[LogRecord], TailError> {
        let first_new = self.parser.len();

        let size = std::fs::metadata(&self.path)
            .map_err(|source| TailError::Metadata {
                path: self.path.clone(),
                source,
            })?
            .len();

        // Truncation or rotation: the writer started the file over, so
        // the stored offset points past the new content.
        if size < self.offset {
            tracing::info!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_size = size,
                "Log truncated or rotated; restarting from offset 0"
            );
            self.offset = 0;
            self.partial.clear();
        }

        if size == self.offset {
            return Ok(&self.parser.records()[first_new..]);
        }

        let available = (size - self.offset) as usize;
        let limit = available.min(MAX_TAIL_READ_BYTES_PER_POLL);
        let bytes = self.read_at_offset(limit)?;
        if bytes.is_empty() {
            return Ok(&self.parser.records()[first_new..]);
        }
        self.offset += bytes.len() as u64;

        let decoded = String::from_utf8_lossy(&bytes);
        self.partial.push_str(&decoded);

        // Everything up to and including the final newline is parseable;
        // the rest is an in-progress line carried to the next poll.
        let complete = match self.partial.rfind('\n') {
            Some(newline) => {
                let complete = self.partial[..=newline].to_string();
                self.partial = self.partial[newline + 1..].to_string();
                complete
            }
            None => {
                // A writer that never emits a newline must not grow the
                // carry buffer without bound; force-feed the oversized
                // fragment as a line.
                if self.partial.len() > MAX_TAIL_PARTIAL_BYTES {
                    let forced = std::mem::take(&mut self.partial);
                    self.feed_line(&forced)?;
                }
                return Ok(&self.parser.records()[first_new..]);
            }
        };

        for line in complete.split_inclusive('\n') {
            self.feed_line(line)?;
        }

        let new = &self.parser.records()[first_new..];
        if !new.is_empty() {
            tracing::debug!(
                path = %self.path.display(),
                count = new.len(),
                offset = self.offset,
                "Poll produced new records"
            );
        }
        Ok(new)
    }

    fn feed_line(&mut self, line: &str) -> Result<(), TailError> {
        match self.parser.parse_line(line)? {
            LineOutcome::Record(index) => {
                let record = &self.parser.records()[index];
                self.levels.ingest(index, record);
                self.markers.ingest(index, record);
            }
            LineOutcome::Continuation(_) => {}
        }
        Ok(())
    }

    fn read_at_offset(&self, limit: usize) -> Result<Vec<u8>, TailError> {
        let read = || -> std::io::Result<Vec<u8>> {
            let mut file = File::open(&self.path)?;
            file.seek(SeekFrom::Start(self.offset))?;
            let mut buf = vec![0u8; limit];
            let n = file.read(&mut buf)?;
            buf.truncate(n);
            Ok(buf)
        };
        read().map_err(|source| TailError::Read {
            path: self.path.clone(),
            offset: self.offset,
            source,
        })
    }

    /// Every record parsed since construction or the last reopen.
    pub fn records(&self) -> &[LogRecord] {
        self.parser.records()
    }

    pub fn levels(&self) -> &LevelClassifier {
        &self.levels
    }

    pub fn levels_mut(&mut self) -> &mut LevelClassifier {
        &mut self.levels
    }

    pub fn markers(&self) -> &MarkerClassifier {
        &self.markers
    }

    pub fn markers_mut(&mut self) -> &mut MarkerClassifier {
        &mut self.markers
    }

    /// Renders the level-filtered view of everything parsed so far.
    pub fn build(&self) -> Vec<BuiltLine> {
        self.levels.build(self.parser.records())
    }

    /// Clears both classifiers' accumulated buckets. The file position
    /// and the record list are untouched; a full re-parse requires
    /// `reopen`.
    pub fn reset(&mut self) {
        self.levels.reset();
        self.markers.reset();
    }

    /// Rewinds to offset 0 and drops all parsed state, so the next poll
    /// re-parses the file from the start.
    pub fn reopen(&mut self) {
        self.offset = 0;
        self.partial.clear();
        self.parser.clear();
        self.levels.reset();
        self.markers.reset();
        tracing::debug!(path = %self.path.display(), "Tailer reopened");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn make_log(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn append(path: &Path, content: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn first_poll_parses_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_log(
            &dir,
            "run.log",
            "INFO:12:00:00 ||| started\nDEBUG:12:00:01 ||| detail\n",
        );

        let mut tailer = LogTailer::new(&path).unwrap();
        let new = tailer.poll().unwrap();
        assert_eq!(new.len(), 2);
        assert_eq!(new[0].message, "started");
        assert_eq!(tailer.records().len(), 2);
    }

    #[test]
    fn eof_suspends_and_appends_resume() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_log(&dir, "run.log", "INFO:12:00:00 ||| first\n");
        let mut tailer = LogTailer::new(&path).unwrap();

        assert_eq!(tailer.poll().unwrap().len(), 1);
        assert!(tailer.poll().unwrap().is_empty());

        append(&path, "INFO:12:00:05 ||| second\n");
        let new = tailer.poll().unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].message, "second");
        assert_eq!(tailer.records().len(), 2);
    }

    #[test]
    fn partial_line_is_carried_until_its_newline_arrives() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_log(&dir, "run.log", "INFO:12:00:00 ||| comp");
        let mut tailer = LogTailer::new(&path).unwrap();

        // No newline yet: nothing parsed, bytes consumed.
        assert!(tailer.poll().unwrap().is_empty());

        append(&path, "lete\n");
        let new = tailer.poll().unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].message, "complete");
    }

    #[test]
    fn continuations_fold_across_polls() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_log(&dir, "run.log", "INFO:12:00 || mod | hello\n");
        let mut tailer = LogTailer::new(&path).unwrap();
        tailer.poll().unwrap();

        append(&path, "world\n");
        let new = tailer.poll().unwrap();
        assert!(new.is_empty(), "continuation creates no record");
        assert_eq!(tailer.records()[0].message, "hello\nworld");
    }

    #[test]
    fn records_feed_both_classifiers() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_log(
            &dir,
            "run.log",
            "INFO:12:00:00 ||| Running ISOFIT initial guess\n\
             ERROR:12:00:01 ||| something failed\n",
        );
        let mut tailer = LogTailer::new(&path).unwrap();
        tailer.poll().unwrap();

        let level_stats = tailer.levels().stats();
        assert_eq!(level_stats.len(), 2);

        assert_eq!(
            tailer.markers().records_for("Presolve start"),
            Some(&[0][..])
        );
        assert_eq!(tailer.build().len(), 2);
    }

    #[test]
    fn reset_clears_buckets_but_not_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_log(&dir, "run.log", "INFO:12:00:00 ||| first\n");
        let mut tailer = LogTailer::new(&path).unwrap();
        tailer.poll().unwrap();
        let offset_after_poll = tailer.offset();

        tailer.reset();
        assert_eq!(tailer.offset(), offset_after_poll);
        assert_eq!(tailer.records().len(), 1, "records survive reset");
        assert!(tailer.levels().stats().is_empty());

        // Only content appended after the reset lands in the buckets.
        append(&path, "DEBUG:12:00:01 ||| second\n");
        tailer.poll().unwrap();
        let stats = tailer.levels().stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].level, "DEBUG");
    }

    #[test]
    fn reopen_reparses_from_the_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_log(&dir, "run.log", "INFO:12:00:00 ||| first\n");
        let mut tailer = LogTailer::new(&path).unwrap();
        tailer.poll().unwrap();
        tailer.reset();

        tailer.reopen();
        assert_eq!(tailer.offset(), 0);
        assert!(tailer.records().is_empty());

        let new = tailer.poll().unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(tailer.levels().stats().len(), 1);
    }

    #[test]
    fn truncated_file_restarts_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_log(
            &dir,
            "run.log",
            "INFO:12:00:00 ||| old content with some length\n",
        );
        let mut tailer = LogTailer::new(&path).unwrap();
        tailer.poll().unwrap();

        // Rotation: the writer replaced the file with shorter content.
        std::fs::write(&path, "INFO:13:00:00 ||| fresh\n").unwrap();
        let new = tailer.poll().unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].message, "fresh");
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let err = LogTailer::new("/nonexistent/rundex-test.log").unwrap_err();
        assert!(matches!(err, TailError::Open { .. }));
    }

    #[test]
    fn malformed_head_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_log(&dir, "run.log", "no grammar here\n");
        let mut tailer = LogTailer::new(&path).unwrap();
        let err = tailer.poll().unwrap_err();
        assert!(matches!(err, TailError::Parse(_)));
    }
}
