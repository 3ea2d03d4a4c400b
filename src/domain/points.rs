use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Points are whole, signed units. Debits are negative events, never edits.
pub type Points = i64;

/// A single ledger entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointEvent {
    pub num_points: Points,
    pub time: DateTime<Utc>,
}

impl PointEvent {
    pub fn new(num_points: Points, time: DateTime<Utc>) -> Self {
        Self { num_points, time }
    }

    pub fn now(num_points: Points) -> Self {
        Self::new(num_points, Utc::now())
    }
}

/// Sum the amounts of a sequence of events.
/// Returns `None` if the running sum leaves the `i64` range at any point.
pub fn compute_total(events: &[PointEvent]) -> Option<Points> {
    events
        .iter()
        .try_fold(0, |total: Points, event| total.checked_add(event.num_points))
}

/// Parse a points amount from text input such as a query parameter.
/// Accepts an optional sign and surrounding whitespace: "5", "-12", " +3 ".
pub fn parse_points(input: &str) -> Result<Points, ParsePointsError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParsePointsError::Missing);
    }
    input
        .parse()
        .map_err(|_| ParsePointsError::NotAWholeNumber(input.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsePointsError {
    Missing,
    NotAWholeNumber(String),
}

impl std::fmt::Display for ParsePointsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsePointsError::Missing => write!(f, "points value is required"),
            ParsePointsError::NotAWholeNumber(s) => write!(f, "'{}' is not a whole number", s),
        }
    }
}

impl std::error::Error for ParsePointsError {}

/// Append-only sequence of point events plus the total derived from it.
///
/// The total is never set directly: it is recomputed from the full sequence
/// whenever the ledger is built or appended to, so the two cannot drift.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointLedger {
    events: Vec<PointEvent>,
    total: Points,
}

impl PointLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted events.
    pub fn from_events(events: Vec<PointEvent>) -> Result<Self, LedgerError> {
        let total = compute_total(&events).ok_or(LedgerError::TotalOverflow)?;
        Ok(Self { events, total })
    }

    /// Append an event and recompute the total over the whole sequence.
    /// On overflow the ledger is left untouched.
    pub fn append(&mut self, event: PointEvent) -> Result<Points, LedgerError> {
        self.events.push(event);
        match compute_total(&self.events) {
            Some(total) => {
                self.total = total;
                Ok(total)
            }
            None => {
                self.events.pop();
                Err(LedgerError::TotalOverflow)
            }
        }
    }

    pub fn events(&self) -> &[PointEvent] {
        &self.events
    }

    pub fn total(&self) -> Points {
        self.total
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    TotalOverflow,
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::TotalOverflow => write!(f, "points total would overflow"),
        }
    }
}

impl std::error::Error for LedgerError {}
