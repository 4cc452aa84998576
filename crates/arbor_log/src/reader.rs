//! File reader: lazy event sequence for one node log.
//!
//! A file binds to a node name at its first Hello; every later line is
//! attributed to that node. Reading stops after the Goodbye line.

use crate::config::IngestConfig;
use crate::event::{Event, EventOrigin};
use crate::parse::{LineError, LineParser};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::Path;

/// Fatal failure while reading one source file
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Source could not be read
    #[error("{file}: {source}")]
    Io {
        /// File name
        file: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Known event kind with a malformed payload
    #[error("{file}:{line_number}: {source} in line {line:?}")]
    Malformed {
        /// File name
        file: String,
        /// 1-based line number
        line_number: usize,
        /// Raw line text
        line: String,
        /// Decoding failure
        #[source]
        source: LineError,
    },

    /// Event line before the file's first Hello
    #[error("{file}:{line_number}: event before any Hello in line {line:?}")]
    MissingHello {
        /// File name
        file: String,
        /// 1-based line number
        line_number: usize,
        /// Raw line text
        line: String,
    },
}

impl ParseError {
    /// Name of the file that failed
    #[must_use]
    pub fn file(&self) -> &str {
        match self {
            Self::Io { file, .. } | Self::Malformed { file, .. } | Self::MissingHello { file, .. } => {
                file
            }
        }
    }
}

/// Whether a path names a log source under `config`
#[must_use]
pub fn is_log_source(path: &Path, config: &IngestConfig) -> bool {
    path.extension().is_some_and(|ext| ext == config.suffix.as_str())
}

/// Per-file parsing state behind [`EventReader`]
#[derive(Debug, Clone)]
pub struct SourceState {
    file: String,
    parser: LineParser,
    node: Option<String>,
    line_number: usize,
    finished: bool,
}

impl SourceState {
    /// Create the state for one file
    #[must_use]
    pub fn new(file: impl Into<String>, config: &IngestConfig) -> Self {
        Self {
            file: file.into(),
            parser: LineParser::new(config.parse.clone()),
            node: None,
            line_number: 0,
            finished: false,
        }
    }

    /// Whether a Goodbye has been emitted
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Node bound by the last Hello
    #[must_use]
    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    /// Feed the next line of the file
    ///
    /// # Errors
    ///
    /// Returns error for malformed lines and for events before any Hello
    pub fn accept(&mut self, line: &str) -> Result<Option<Event>, ParseError> {
        if self.finished {
            return Ok(None);
        }
        self.line_number += 1;

        let parsed = self
            .parser
            .parse(line)
            .map_err(|source| ParseError::Malformed {
                file: self.file.clone(),
                line_number: self.line_number,
                line: line.to_string(),
                source,
            })?;
        let Some(parsed) = parsed else {
            return Ok(None);
        };

        if let Some(name) = parsed.node {
            self.node = Some(name);
        }
        let Some(node) = self.node.clone() else {
            return Err(ParseError::MissingHello {
                file: self.file.clone(),
                line_number: self.line_number,
                line: line.to_string(),
            });
        };

        let event = Event::new(
            parsed.timestamp,
            node,
            EventOrigin {
                file: self.file.clone(),
                line: self.line_number,
            },
            parsed.payload,
        );
        self.finished = event.is_terminal();
        Ok(Some(event))
    }
}

/// Lazy iterator over the events of one source
pub struct EventReader<R> {
    lines: Option<Lines<R>>,
    state: SourceState,
}

impl EventReader<BufReader<File>> {
    /// Open a source file.
    ///
    /// Directories and files without the configured suffix yield an
    /// empty reader.
    ///
    /// # Errors
    ///
    /// Returns error if a matching file cannot be opened
    pub fn open(path: &Path, config: &IngestConfig) -> Result<Self, ParseError> {
        let file = source_name(path);
        let state = SourceState::new(file.clone(), config);

        if path.is_dir() {
            tracing::info!(file = %file, "Skipping directory");
            return Ok(Self { lines: None, state });
        }
        if !is_log_source(path, config) {
            tracing::debug!(file = %file, "Skipping file without log suffix");
            return Ok(Self { lines: None, state });
        }

        let handle = File::open(path).map_err(|source| ParseError::Io {
            file: file.clone(),
            source,
        })?;
        Ok(Self::new(BufReader::new(handle), state))
    }
}

impl<R: BufRead> EventReader<R> {
    /// Read events from any buffered source
    pub fn new(reader: R, state: SourceState) -> Self {
        Self {
            lines: Some(reader.lines()),
            state,
        }
    }

    /// Parsing state of this source
    #[must_use]
    pub fn state(&self) -> &SourceState {
        &self.state
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<Event, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.state.is_finished() {
                self.lines = None;
            }
            let line = match self.lines.as_mut()?.next()? {
                Ok(line) => line,
                Err(source) => {
                    self.lines = None;
                    return Some(Err(ParseError::Io {
                        file: self.state.file.clone(),
                        source,
                    }));
                }
            };
            match self.state.accept(&line) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(err) => {
                    self.lines = None;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Display name of a source path
#[must_use]
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
