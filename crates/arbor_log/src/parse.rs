//! Line parser: one raw log line into one typed event.
//!
//! Lines are split on whitespace. The timestamp and the kind tag sit at
//! fixed offsets given by [`ParseConfig`]; payload tokens are addressed
//! relative to the kind tag. Unknown kind tags are skipped, while a known
//! tag with a malformed payload is an error.

use crate::config::ParseConfig;
use crate::event::{ChildState, EventKind, EventPayload, Location, ManagerState, TreeState};
use arbor_core::{CoreError, Timestamp, bracketed_list, host_address};
use std::net::Ipv4Addr;

/// Failure to decode a single line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    /// Line is too short for the field
    #[error("Missing {field} at token {position}")]
    MissingToken {
        /// Field being decoded
        field: &'static str,
        /// Token offset that was expected
        position: usize,
    },

    /// Token failed to decode
    #[error(transparent)]
    Token(#[from] CoreError),
}

/// A line decoded without node context.
///
/// Only Hello lines name their node; every other line inherits the node
/// bound by the last Hello of its file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    /// Timestamp of the line
    pub timestamp: Timestamp,
    /// Node name announced by a Hello line
    pub node: Option<String>,
    /// Decoded payload
    pub payload: EventPayload,
}

struct Tokens<'a> {
    tokens: Vec<&'a str>,
}

impl<'a> Tokens<'a> {
    fn get(&self, position: usize, field: &'static str) -> Result<&'a str, LineError> {
        self.tokens
            .get(position)
            .copied()
            .ok_or(LineError::MissingToken { field, position })
    }

    fn address(&self, position: usize, field: &'static str) -> Result<Ipv4Addr, LineError> {
        Ok(host_address(self.get(position, field)?)?)
    }
}

/// Parser for one log format generation
#[derive(Debug, Clone, Default)]
pub struct LineParser {
    config: ParseConfig,
}

impl LineParser {
    /// Create a parser for the given token layout
    #[must_use]
    pub fn new(config: ParseConfig) -> Self {
        Self { config }
    }

    /// Parse one line.
    ///
    /// Returns `Ok(None)` for blank lines and unknown kind tags.
    ///
    /// # Errors
    ///
    /// Returns error if a known kind has a missing or malformed field
    pub fn parse(&self, line: &str) -> Result<Option<ParsedLine>, LineError> {
        let tokens = Tokens {
            tokens: line.split_whitespace().collect(),
        };
        if tokens.tokens.is_empty() {
            return Ok(None);
        }

        let k = self.config.kind_offset;
        let Some(kind) = EventKind::from_tag(tokens.get(k, "event kind")?) else {
            return Ok(None);
        };
        let timestamp = Timestamp::parse(tokens.get(self.config.timestamp_offset, "timestamp")?)?;

        let mut node = None;
        let payload = match kind {
            EventKind::Hello => {
                node = Some(tokens.get(k + 3, "node name")?.to_string());
                EventPayload::Hello {
                    address: tokens.address(k + 4, "node address")?,
                    location: location(&tokens, k + 5)?,
                }
            }
            EventKind::Goodbye => EventPayload::Goodbye,
            EventKind::ActiveViewChange => EventPayload::ActiveViewChange {
                added: view_direction(tokens.get(k + 1, "view direction")?)?,
                peer: tokens.address(k + 2, "view peer")?,
            },
            EventKind::PassiveViewChange => EventPayload::PassiveViewChange {
                added: view_direction(tokens.get(k + 1, "view direction")?)?,
                peer: tokens.address(k + 2, "view peer")?,
            },
            EventKind::ManagerStateChange => EventPayload::ManagerStateChange {
                state: ManagerState::from_literal(tokens.get(k + 1, "manager state")?)?,
            },
            EventKind::TreeStateChange => {
                let state = TreeState::from_literal(tokens.get(k + 1, "tree state")?)?;
                let (parent, grandparents) = if state.has_parent() {
                    let parent = tokens.address(k + 2, "parent")?;
                    let grandparents = bracketed_list(tokens.get(k + 3, "grandparents")?, ',')?
                        .into_iter()
                        .filter(|item| !item.is_empty())
                        .map(host_address)
                        .collect::<Result<Vec<_>, _>>()?;
                    (Some(parent), grandparents)
                } else {
                    (None, Vec::new())
                };
                EventPayload::TreeStateChange {
                    state,
                    parent,
                    grandparents,
                }
            }
            EventKind::ParentMetadataUpdate => EventPayload::ParentMetadataUpdate {
                metadata: bracketed_list(tokens.get(k + 1, "parent metadata")?, ':')?
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            },
            EventKind::ChildStateChange => EventPayload::ChildStateChange {
                state: ChildState::from_literal(tokens.get(k + 1, "child state")?)?,
                child: tokens.address(k + 2, "child")?,
            },
            EventKind::ChildMetadataUpdate => EventPayload::ChildMetadataUpdate {
                child: tokens.address(k + 1, "child")?,
                metadata: tokens.get(k + 2, "child metadata")?.to_string(),
            },
        };

        Ok(Some(ParsedLine {
            timestamp,
            node,
            payload,
        }))
    }
}

fn view_direction(literal: &str) -> Result<bool, CoreError> {
    match literal {
        "Added" => Ok(true),
        "Removed" => Ok(false),
        _ => Err(CoreError::UnknownLiteral {
            field: "view direction",
            literal: literal.to_string(),
        }),
    }
}

fn coordinate(raw: &str) -> Result<f64, CoreError> {
    raw.parse()
        .map_err(|_| CoreError::InvalidNumber { raw: raw.to_string() })
}

// Older generations omit the location; both coordinates or neither.
fn location(tokens: &Tokens<'_>, position: usize) -> Result<Option<Location>, LineError> {
    if tokens.tokens.len() <= position {
        return Ok(None);
    }
    let x = coordinate(tokens.get(position, "location x")?)?;
    let y = coordinate(tokens.get(position + 1, "location y")?)?;
    Ok(Some(Location { x, y }))
}
