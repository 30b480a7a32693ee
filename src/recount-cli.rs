//! A simple CLI tool for recounting finished elections.
//! This uses the server's own tallying code, and is by definition
//! compatible with the output of our API endpoints.

use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use ballot_backend::{
    engine::{recount as recount_dump, RecountError},
    model::api::{dump::ElectionDump, tally::TallyReport},
};

const PROGRAM_NAME: &str = "recount-ballots";

const ABOUT_TEXT: &str = "Recount an election from its ballots and check the published results.

EXIT CODES:
     0: Recount matched the published results.
   255: Ran successfully, but the recount did not match.
 Other: Error.";

const RESULTS_PATH: &str = "RESULTS_PATH";

const RESULTS_PATH_HELP: &str = "The path to a JSON dump of an election,\n\
as returned by `GET /elections/<election_id>/dump`";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME).about(ABOUT_TEXT).arg(
        Arg::new(RESULTS_PATH)
            .help(RESULTS_PATH_HELP)
            .action(ArgAction::Set)
            .required(true),
    )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON dump.
    Format(String),
    /// The recount failed for the contained reason.
    Recount(RecountError),
}

/// Load a dump and recount it.
fn recount(path: &str) -> Result<(ElectionDump, TallyReport), Error> {
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let dump: ElectionDump =
        serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;

    let report = recount_dump(&dump).map_err(Error::Recount)?;
    Ok((dump, report))
}

fn plural(n: u64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn print_report(report: &TallyReport) {
    for result in &report.results {
        let party = if result.party.is_empty() {
            String::new()
        } else {
            format!(" ({})", result.party)
        };
        println!(
            "{}{party}: {} vote{} ({})",
            result.name,
            result.vote_count,
            plural(result.vote_count),
            result.percentage
        );
    }
}

/// Run the recount, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let Some(path) = args.get_one::<String>(RESULTS_PATH) else {
        // Required argument, so clap has already rejected the invocation.
        return 1;
    };
    match recount(path) {
        Ok((dump, report)) => {
            println!(
                "Recount of \"{}\" succeeded: {} ballot{}.",
                dump.election.title,
                report.total_votes,
                plural(report.total_votes)
            );
            print_report(&report);
            let winners: Vec<&str> = report.winners().iter().map(|w| w.name.as_str()).collect();
            match winners.len() {
                0 => println!("No votes were cast."),
                1 => println!("Winner: {}", winners[0]),
                _ => println!("Tied: {}", winners.join(", ")),
            }
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {msg}");
            1
        }
        Err(Error::Recount(RecountError::Mismatch { recounted })) => {
            println!("Recount failed: the published results differ from the ballots.");
            println!("The ballots add up to:");
            print_report(&recounted);
            255
        }
        Err(Error::Recount(err)) => {
            println!("Recount failed: {err}.");
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recounting() {
        // This test actually enters backend code, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(["ballot_backend"], None, None);

        let (dump, report) = recount("example_dumps/election.json").unwrap();
        assert_eq!(dump.report, report);
        let lines: Vec<_> = report
            .results
            .iter()
            .map(|r| (r.name.as_str(), r.vote_count, r.percentage.hundredths()))
            .collect();
        assert_eq!(
            lines,
            [
                ("Hermione Granger", 3, 6000),
                ("Cedric Diggory", 2, 4000),
                ("Luna Lovegood", 0, 0),
            ]
        );

        assert!(matches!(
            recount("example_dumps/election_tampered.json"),
            Err(Error::Recount(RecountError::Mismatch { .. }))
        ));
        assert!(matches!(
            recount("example_dumps/election_malformed.json"),
            Err(Error::Format(_))
        ));
        assert!(matches!(recount("not a real file"), Err(Error::IO(_))));
    }

    #[test]
    fn correct_cli_usage() {
        let command_line = [PROGRAM_NAME, "example_dumps/election.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let command_line = [PROGRAM_NAME, "example_dumps/election_tampered.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 255);

        let command_line = [PROGRAM_NAME, "example_dumps/election_malformed.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);

        let command_line = [PROGRAM_NAME, "not a real file"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);
    }

    #[test]
    fn bad_cli_usage() {
        // Something very wrong.
        let command_line = [PROGRAM_NAME, "this", "invocation", "is", "incorrect"];
        cli().try_get_matches_from(command_line).unwrap_err();

        // No options at all.
        let command_line = [PROGRAM_NAME];
        cli().try_get_matches_from(command_line).unwrap_err();
    }
}
