use chrono::{DateTime, Utc};

use crate::model::{common::WindowState, db::election::ElectionCore};

/// Where `election` stands at instant `now`.
///
/// An election is finished once its end time has passed, whether or not it is
/// active. Until then an inactive election is [`WindowState::Inactive`], so
/// deactivating pauses voting but can never reopen a finished election.
pub fn classify(election: &ElectionCore, now: DateTime<Utc>) -> WindowState {
    if election.end_time < now {
        WindowState::Finished
    } else if !election.is_active {
        WindowState::Inactive
    } else if election.start_time > now {
        WindowState::Upcoming
    } else {
        WindowState::Ongoing
    }
}
