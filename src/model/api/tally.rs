use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;

/// A percentage with two decimal places, held exactly in hundredths of a
/// percent and serialized as a number such as `33.33`.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "f64", try_from = "f64")]
pub struct Percentage(u32);

impl Percentage {
    pub const ZERO: Self = Self(0);

    /// `part / whole * 100`, rounded half-up to two decimal places.
    /// Zero when `whole` is zero.
    pub fn of(part: u64, whole: u64) -> Self {
        if whole == 0 {
            return Self::ZERO;
        }
        let (part, whole) = (u128::from(part), u128::from(whole));
        // Hundredths of a percent, plus a half before truncating.
        let hundredths = (part * 20_000 + whole) / (2 * whole);
        Self(u32::try_from(hundredths).unwrap_or(u32::MAX))
    }

    pub fn hundredths(self) -> u32 {
        self.0
    }
}

impl Display for Percentage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

impl From<Percentage> for f64 {
    fn from(percentage: Percentage) -> Self {
        f64::from(percentage.0) / 100.0
    }
}

impl TryFrom<f64> for Percentage {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !(0.0..=100.0).contains(&value) {
            return Err(format!("percentage out of range: {value}"));
        }
        // In range, so the cast cannot truncate.
        Ok(Self((value * 100.0).round() as u32))
    }
}

/// One candidate's line in a tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate_id: ApiId,
    pub name: String,
    pub party: String,
    pub vote_count: u64,
    pub percentage: Percentage,
}

/// Results of an election, ordered by descending vote count and then by
/// candidate name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyReport {
    pub election_id: ApiId,
    pub total_votes: u64,
    pub results: Vec<CandidateResult>,
}

impl TallyReport {
    /// The leading candidates. Several on a tie, none without votes.
    pub fn winners(&self) -> Vec<&CandidateResult> {
        let top = match self.results.first() {
            Some(first) if first.vote_count > 0 => first.vote_count,
            _ => return Vec::new(),
        };
        self.results
            .iter()
            .take_while(|result| result.vote_count == top)
            .collect()
    }
}
