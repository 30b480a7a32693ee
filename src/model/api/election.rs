use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::classify;
use crate::model::{
    api::{candidate::CandidateDescription, id::ApiId},
    common::WindowState,
    db::election::{Election, ElectionCore, NewElection},
    mongodb::Id,
};

/// An election as created or edited by an admin.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ElectionSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Elections stay hidden from voters until an admin activates them.
    #[serde(default)]
    pub is_active: bool,
}

impl ElectionSpec {
    /// A new election created by `created_by` at `now`.
    pub fn into_election(self, created_by: Id, now: DateTime<Utc>) -> NewElection {
        ElectionCore {
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            is_active: self.is_active,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply this spec over an existing election.
    pub fn apply_to(self, election: &mut ElectionCore, now: DateTime<Utc>) {
        election.title = self.title;
        election.description = self.description;
        election.start_time = self.start_time;
        election.end_time = self.end_time;
        election.is_active = self.is_active;
        election.updated_at = now;
    }
}

/// A summary of an election, including where it stands right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    pub id: ApiId,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub state: WindowState,
}

impl ElectionSummary {
    pub fn new(election: &Election, now: DateTime<Utc>) -> Self {
        Self {
            id: election.id.into(),
            title: election.title.clone(),
            start_time: election.start_time,
            end_time: election.end_time,
            is_active: election.is_active,
            state: classify(election, now),
        }
    }
}

/// An election with its full description and candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    #[serde(flatten)]
    pub summary: ElectionSummary,
    pub description: String,
    pub candidates: Vec<CandidateDescription>,
}

impl ElectionDescription {
    pub fn new(
        election: &Election,
        candidates: Vec<CandidateDescription>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            summary: ElectionSummary::new(election, now),
            description: election.description.clone(),
            candidates,
        }
    }
}

/// Elections grouped for the landing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionOverview {
    pub ongoing: Vec<ElectionSummary>,
    pub upcoming: Vec<ElectionSummary>,
    /// The most recently finished elections, latest first.
    pub recently_finished: Vec<ElectionSummary>,
}

/// Progress of an election, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionStatus {
    pub election_id: ApiId,
    pub state: WindowState,
    pub total_votes: u64,
    /// Whole seconds until voting closes, while the election is ongoing.
    pub seconds_remaining: Option<i64>,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::{Duration, Timelike};

    fn next_hour() -> DateTime<Utc> {
        let now = Utc::now() + Duration::hours(1);
        now.with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap()
    }

    impl ElectionSpec {
        /// Opens at the top of the next hour and runs for a day.
        pub fn upcoming_example() -> Self {
            let start_time = next_hour();
            Self {
                title: "Head Boy".to_string(),
                description: "Chosen by the whole school.".to_string(),
                start_time,
                end_time: start_time + Duration::days(1),
                is_active: true,
            }
        }

        pub fn upcoming_example2() -> Self {
            Self {
                title: "Head Girl".to_string(),
                ..Self::upcoming_example()
            }
        }
    }
}
