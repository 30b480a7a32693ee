use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core election data, as stored in the database.
///
/// `start_time < end_time` is checked whenever an election is created or
/// edited, and assumed everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    pub description: String,
    /// Election start time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Election end time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Inactive elections cannot be voted in until they finish.
    pub is_active: bool,
    /// The admin who created the election. Kept for auditing only.
    pub created_by: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::Duration;

    impl ElectionCore {
        /// An active election spanning `start_offset..end_offset` around `now`.
        pub fn example_around(
            now: DateTime<Utc>,
            start_offset: Duration,
            end_offset: Duration,
        ) -> Self {
            Self {
                title: "Quidditch Captain".to_string(),
                description: "Who should captain the house team?".to_string(),
                start_time: now + start_offset,
                end_time: now + end_offset,
                is_active: true,
                created_by: Id::new(),
                created_at: now,
                updated_at: now,
            }
        }

        /// Open from an hour ago until an hour from now.
        pub fn ongoing_example(now: DateTime<Utc>) -> Self {
            Self::example_around(now, Duration::hours(-1), Duration::hours(1))
        }

        /// Opens in an hour, closes in two.
        pub fn upcoming_example(now: DateTime<Utc>) -> Self {
            Self {
                title: "Moongolf President".to_string(),
                ..Self::example_around(now, Duration::hours(1), Duration::hours(2))
            }
        }

        /// Closed an hour ago.
        pub fn finished_example(now: DateTime<Utc>) -> Self {
            Self {
                title: "Prefect Selection".to_string(),
                ..Self::example_around(now, Duration::hours(-2), Duration::hours(-1))
            }
        }
    }
}
