use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::{debug, error};
use thiserror::Error;

use crate::model::{
    api::{
        candidate::CandidateDescription,
        dump::{BallotRecord, ElectionDump},
        election::ElectionSummary,
        id::ApiId,
        tally::{CandidateResult, Percentage, TallyReport},
    },
    common::WindowState,
    db::election::Election,
    mongodb::Id,
};
use crate::store::{ElectionStore, StoreError, VoteStore};

use super::window::classify;

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("Results are not available while the election is {0:?}")]
    ResultsNotAvailable(WindowState),
    /// Some recorded votes are for candidates no longer in the election.
    #[error("Only {counted} of {recorded} recorded votes were counted")]
    Uncounted { recorded: u64, counted: u64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TallyError {
    /// A short name for this kind of failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ResultsNotAvailable(_) => "ResultsNotAvailable",
            Self::Uncounted { .. } | Self::Store(_) => "InternalError",
        }
    }
}

/// Ways a dumped election can fail to recount.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum RecountError {
    #[error("Candidate {candidate} does not stand in election {election}")]
    ForeignCandidate { candidate: ApiId, election: ApiId },
    #[error("Ballot {ballot} is for unknown candidate {candidate}")]
    UnknownCandidate { ballot: ApiId, candidate: ApiId },
    #[error("Ballot {0} appears more than once")]
    RepeatedBallot(ApiId),
    #[error("The published report is for election {found}, not {expected}")]
    WrongElection { expected: ApiId, found: ApiId },
    #[error("The published results differ from the recount")]
    Mismatch { recounted: TallyReport },
}

/// Build a report from each candidate's vote count. Candidates missing from
/// `counts` received no votes.
///
/// The output depends only on the inputs, not on their order.
pub fn compute_tally(
    election_id: Id,
    candidates: &[CandidateDescription],
    counts: &HashMap<Id, u64>,
) -> TallyReport {
    let count_of =
        |candidate: &CandidateDescription| counts.get(&*candidate.id).copied().unwrap_or(0);
    let total_votes = candidates.iter().map(count_of).sum();

    let mut ordered: Vec<_> = candidates.iter().collect();
    ordered.sort_by(|a, b| {
        (Reverse(count_of(a)), &a.name, a.id).cmp(&(Reverse(count_of(b)), &b.name, b.id))
    });

    let results = ordered
        .into_iter()
        .map(|candidate| {
            let vote_count = count_of(candidate);
            CandidateResult {
                candidate_id: candidate.id,
                name: candidate.name.clone(),
                party: candidate.party.clone(),
                vote_count,
                percentage: Percentage::of(vote_count, total_votes),
            }
        })
        .collect();

    TallyReport {
        election_id: election_id.into(),
        total_votes,
        results,
    }
}

/// Count the votes in `election` as of `now`.
///
/// Results are only released once the election has finished, unless the
/// caller is an administrator. Every call recomputes from the store.
pub async fn tally<S>(
    store: &S,
    election: &Election,
    now: DateTime<Utc>,
    is_admin: bool,
) -> Result<TallyReport, TallyError>
where
    S: ElectionStore + VoteStore + ?Sized,
{
    let state = check_release(election, now, is_admin)?;

    let candidates = candidate_descriptions(store, election.id).await?;
    let counts = store.vote_counts(election.id).await?;
    debug!(
        "Tallying {} candidates in election {} ({state:?})",
        candidates.len(),
        election.id
    );
    let report = compute_tally(election.id, &candidates, &counts);
    check_all_counted(&report, &counts)?;
    Ok(report)
}

/// Export every ballot of `election` along with the report they add up to.
/// Released under the same rules as [`tally`].
pub async fn dump<S>(
    store: &S,
    election: &Election,
    now: DateTime<Utc>,
    is_admin: bool,
) -> Result<ElectionDump, TallyError>
where
    S: ElectionStore + VoteStore + ?Sized,
{
    check_release(election, now, is_admin)?;

    let candidates = candidate_descriptions(store, election.id).await?;
    let ballots: Vec<BallotRecord> = store
        .election_votes(election.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    // Count the exported ballots rather than asking the store again, so the
    // report always matches them even while votes are still arriving.
    let mut counts: HashMap<Id, u64> = HashMap::new();
    for ballot in &ballots {
        *counts.entry(*ballot.candidate_id).or_default() += 1;
    }
    let report = compute_tally(election.id, &candidates, &counts);
    check_all_counted(&report, &counts)?;

    Ok(ElectionDump {
        election: ElectionSummary::new(election, now),
        candidates,
        ballots,
        report,
    })
}

/// Make sure no vote in `counts` was left out of `report`.
fn check_all_counted(report: &TallyReport, counts: &HashMap<Id, u64>) -> Result<(), TallyError> {
    let recorded = counts.values().sum();
    if report.total_votes != recorded {
        error!(
            "Election {} has {recorded} votes but only {} are for its candidates",
            report.election_id, report.total_votes
        );
        return Err(TallyError::Uncounted {
            recorded,
            counted: report.total_votes,
        });
    }
    Ok(())
}

fn check_release(
    election: &Election,
    now: DateTime<Utc>,
    is_admin: bool,
) -> Result<WindowState, TallyError> {
    let state = classify(election, now);
    if !is_admin && state != WindowState::Finished {
        return Err(TallyError::ResultsNotAvailable(state));
    }
    Ok(state)
}

async fn candidate_descriptions<S>(
    store: &S,
    election_id: Id,
) -> Result<Vec<CandidateDescription>, TallyError>
where
    S: ElectionStore + ?Sized,
{
    Ok(store
        .candidates_for(election_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Recount a dumped election from its ballots and check the result matches
/// the report published with it.
pub fn recount(dump: &ElectionDump) -> Result<TallyReport, RecountError> {
    let election = dump.election.id;
    if dump.report.election_id != election {
        return Err(RecountError::WrongElection {
            expected: election,
            found: dump.report.election_id,
        });
    }

    let mut counts: HashMap<Id, u64> = HashMap::new();
    for candidate in &dump.candidates {
        if candidate.election_id != election {
            return Err(RecountError::ForeignCandidate {
                candidate: candidate.id,
                election,
            });
        }
        counts.insert(*candidate.id, 0);
    }

    let mut seen = HashSet::new();
    for ballot in &dump.ballots {
        if !seen.insert(ballot.vote_id) {
            return Err(RecountError::RepeatedBallot(ballot.vote_id));
        }
        let count = counts
            .get_mut(&*ballot.candidate_id)
            .ok_or(RecountError::UnknownCandidate {
                ballot: ballot.vote_id,
                candidate: ballot.candidate_id,
            })?;
        *count += 1;
    }

    let recounted = compute_tally(*election, &dump.candidates, &counts);
    if recounted != dump.report {
        return Err(RecountError::Mismatch { recounted });
    }
    Ok(recounted)
}
