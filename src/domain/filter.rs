//! Event filter model: what to watch and where the cursor stands.
//!
//! The query (contract + topic0 + optional indexed constraint) is fixed
//! for the lifetime of a monitor. The cursor is the next block POLL mode
//! will query; it only ever moves forward.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use alloy::primitives::{Address, B256};
use serde::Deserialize;

/// Default widest block window queried per POLL tick.
pub const DEFAULT_MAX_POLL_SPAN: u64 = 50;

/// Contract + event signature + optional topic-2 address constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    /// Emitting contract.
    pub contract: Address,
    /// Event signature hash (topic0).
    pub signature: B256,
    /// Only match logs whose second indexed argument equals this address.
    pub constraint: Option<Address>,
}

impl LogQuery {
    /// Constraint as a left-zero-padded 32-byte topic.
    pub fn constraint_topic(&self) -> Option<B256> {
        self.constraint.as_ref().map(Address::into_word)
    }
}

/// Where the first filter/poll starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockStart {
    /// Chain head at session start.
    #[default]
    Latest,
    /// Explicit block number.
    Number(u64),
}

impl FromStr for BlockStart {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        s.parse::<u64>()
            .map(Self::Number)
            .map_err(|_| format!("from_block must be 'latest' or a block number, got '{s}'"))
    }
}

impl fmt::Display for BlockStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl<'de> Deserialize<'de> for BlockStart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::Number(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Server-side filter id handed out by the upstream.
pub type FilterId = alloy::primitives::U256;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Registering a filter and probing it.
    Probe,
    /// Server-side filter live; fetch incremental changes.
    Filter(FilterId),
    /// Manual range queries; terminal until reconnect.
    Poll,
}

impl FilterMode {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::Filter(_) => "filter",
            Self::Poll => "poll",
        }
    }
}

/// Monotonic next-block cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor(Option<u64>);

impl Cursor {
    /// Cursor positioned at `block`.
    pub fn at(block: u64) -> Self {
        Self(Some(block))
    }

    /// Current position, if seeded.
    pub fn get(&self) -> Option<u64> {
        self.0
    }

    /// Seed the cursor if it has no position yet.
    pub fn seed(&mut self, block: u64) {
        if self.0.is_none() {
            self.0 = Some(block);
        }
    }

    /// Move to `block` unless that would move backwards.
    pub fn advance_to(&mut self, block: u64) {
        match self.0 {
            Some(current) if current >= block => {}
            _ => self.0 = Some(block),
        }
    }
}

/// Block window for one POLL tick, or `None` when there is nothing new.
///
/// Windows wider than `max_span` keep the newest blocks: start becomes
/// `head - max_span`.
pub fn poll_window(cursor: u64, head: u64, max_span: u64) -> Option<RangeInclusive<u64>> {
    if cursor > head {
        return None;
    }
    let start = if head - cursor > max_span {
        head - max_span
    } else {
        cursor
    };
    Some(start..=head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_window_is_clamped_to_newest_blocks() {
        assert_eq!(poll_window(900, 1000, 50), Some(950..=1000));
    }

    #[test]
    fn test_window_within_span_is_untouched() {
        assert_eq!(poll_window(990, 1000, 50), Some(990..=1000));
        assert_eq!(poll_window(950, 1000, 50), Some(950..=1000));
        assert_eq!(poll_window(1000, 1000, 50), Some(1000..=1000));
    }

    #[test]
    fn test_cursor_ahead_of_head_is_noop() {
        assert_eq!(poll_window(1001, 1000, 50), None);
    }

    #[test]
    fn test_cursor_never_regresses() {
        let mut cursor = Cursor::at(100);
        cursor.advance_to(90);
        assert_eq!(cursor.get(), Some(100));
        cursor.advance_to(120);
        assert_eq!(cursor.get(), Some(120));
        cursor.seed(5);
        assert_eq!(cursor.get(), Some(120));
    }

    #[test]
    fn test_block_start_parsing() {
        assert_eq!("latest".parse::<BlockStart>(), Ok(BlockStart::Latest));
        assert_eq!(" LATEST ".parse::<BlockStart>(), Ok(BlockStart::Latest));
        assert_eq!("123".parse::<BlockStart>(), Ok(BlockStart::Number(123)));
        assert!("12a".parse::<BlockStart>().is_err());
        assert!("-1".parse::<BlockStart>().is_err());
    }

    #[test]
    fn test_constraint_topic_is_left_padded() {
        let query = LogQuery {
            contract: Address::ZERO,
            signature: B256::ZERO,
            constraint: Some(address!("00000000000000000000000000000000000000ff")),
        };
        let topic = query.constraint_topic().expect("constraint set");
        assert!(topic[..31].iter().all(|b| *b == 0));
        assert_eq!(topic[31], 0xff);
    }
}
