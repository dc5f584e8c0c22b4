//! A command-line client for a contest vote.
//! Talks to the shared voting endpoint when one is configured, and to a store
//! in the data directory otherwise.

use std::sync::Arc;

use chrono::Utc;
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
};
use rocket::serde::json::serde_json;

use votehub::backend::{LocalBackend, Storage};
use votehub::error::{Error, Result};
use votehub::model::{
    system_config::{format_deadline, parse_deadline},
    user::{DEFAULT_ADMIN_EMAIL, DEFAULT_EMAIL_DOMAIN},
    LoginPolicy, NewContestant,
};
use votehub::session::{BallotView, Session};

const PROGRAM_NAME: &str = "votehub-cli";

const ABOUT_TEXT: &str = "Vote in a contest, or run it as an administrator.

EXIT CODES:
     0: Success.
     1: Error.";

// Global arguments.
const DATA_DIR: &str = "DATA_DIR";
const API_URL: &str = "API_URL";
const ADMIN: &str = "ADMIN";
const EMAIL_DOMAIN: &str = "EMAIL_DOMAIN";
const VERBOSE: &str = "VERBOSE";

// Subcommand arguments.
const EMAIL: &str = "EMAIL";
const JSON: &str = "JSON";
const URL: &str = "URL";
const CONTESTANT_ID: &str = "CONTESTANT_ID";
const NUMBER: &str = "NUMBER";
const NAME: &str = "NAME";
const DEPARTMENT: &str = "DEPARTMENT";
const IMAGE_URL: &str = "IMAGE_URL";
const BANNER_URL: &str = "BANNER_URL";
const DEADLINE: &str = "DEADLINE";

fn email_arg() -> Arg {
    Arg::new(EMAIL)
        .help("The email address to log in with")
        .long("email")
        .short('e')
        .env("VOTEHUB_EMAIL")
        .action(ArgAction::Set)
        .required(true)
}

fn json_arg() -> Arg {
    Arg::new(JSON)
        .help("Print JSON instead of a table")
        .long("json")
        .action(ArgAction::SetTrue)
}

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .arg(
            Arg::new(DATA_DIR)
                .help("Directory holding the local store")
                .long("data-dir")
                .env("VOTEHUB_DATA_DIR")
                .default_value(".votehub")
                .action(ArgAction::Set)
                .global(true),
        )
        .arg(
            Arg::new(API_URL)
                .help("Voting endpoint to use instead of the saved one")
                .long("api-url")
                .env("VOTEHUB_API_URL")
                .action(ArgAction::Set)
                .global(true),
        )
        .arg(
            Arg::new(ADMIN)
                .help(format!(
                    "Administrator email; repeat for several [default: {DEFAULT_ADMIN_EMAIL}]"
                ))
                .long("admin")
                .action(ArgAction::Append)
                .global(true),
        )
        .arg(
            Arg::new(EMAIL_DOMAIN)
                .help("Domain every voter's email must belong to")
                .long("email-domain")
                .default_value(DEFAULT_EMAIL_DOMAIN)
                .action(ArgAction::Set)
                .global(true),
        )
        .arg(
            Arg::new(VERBOSE)
                .help("Log backend activity to stderr")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("set-api-url")
                .about("Save the voting endpoint for later runs; an empty URL clears it")
                .arg(Arg::new(URL).action(ArgAction::Set).required(true)),
        )
        .subcommand(
            Command::new("show")
                .about("Show the ballot")
                .arg(email_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("status")
                .about("Show whether you have voted")
                .arg(email_arg()),
        )
        .subcommand(
            Command::new("vote")
                .about("Cast your one vote")
                .arg(email_arg())
                .arg(
                    Arg::new(CONTESTANT_ID)
                        .action(ArgAction::Set)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("results")
                .about("Rank contestants by votes (admin only)")
                .arg(email_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("add")
                .about("Add a contestant (admin only)")
                .arg(email_arg())
                .arg(Arg::new(NUMBER).long("number").action(ArgAction::Set).required(true))
                .arg(Arg::new(NAME).long("name").action(ArgAction::Set).required(true))
                .arg(
                    Arg::new(DEPARTMENT)
                        .long("department")
                        .default_value("")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new(IMAGE_URL)
                        .long("image-url")
                        .default_value("")
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove a contestant (admin only)")
                .arg(email_arg())
                .arg(
                    Arg::new(CONTESTANT_ID)
                        .action(ArgAction::Set)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Change the banner or deadline (admin only); unset options keep their value")
                .arg(email_arg())
                .arg(Arg::new(BANNER_URL).long("banner-url").action(ArgAction::Set))
                .arg(
                    Arg::new(DEADLINE)
                        .help("RFC 3339 or YYYY-MM-DDTHH:MM (UTC); empty for none")
                        .long("deadline")
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("reset")
                .about("Delete all contestants and votes (admin only)")
                .arg(email_arg()),
        )
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{h({l:<5})} {t} - {m}{n}")))
        .build();
    let config = log4rs::Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level));
    match config.map(log4rs::init_config) {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => eprintln!("Failed to initialise logging: {e}"),
        Err(e) => eprintln!("Failed to initialise logging: {e}"),
    }
}

fn login_policy(args: &ArgMatches) -> LoginPolicy {
    let domain: &String = args.get_one(EMAIL_DOMAIN).unwrap(); // Has a default value.
    match args.get_many::<String>(ADMIN) {
        Some(admins) => LoginPolicy::new(admins, domain),
        None => LoginPolicy::new([DEFAULT_ADMIN_EMAIL], domain),
    }
}

fn print_ballot(view: &BallotView) {
    println!("Banner: {}", view.banner_url);
    match view.vote_deadline {
        Some(deadline) => println!(
            "Deadline: {}{}",
            format_deadline(deadline),
            if view.eligibility.is_voting_closed {
                " (closed)"
            } else {
                ""
            }
        ),
        None => println!("Deadline: none"),
    }
    if let Some(total) = view.total_votes {
        println!("Total votes: {total}");
    }
    for entry in &view.entries {
        let mark = if entry.is_voted_for { "*" } else { " " };
        let tally = match (entry.votes, entry.share) {
            (Some(votes), Some(share)) => format!("  {votes} votes ({share:.1}%)"),
            _ => String::new(),
        };
        println!(
            "{mark} [{}] {} {} / {}{tally}",
            entry.id, entry.number, entry.name, entry.department
        );
    }
    if view.eligibility.can_vote {
        println!("You have not voted yet.");
    }
}

/// Run the chosen subcommand.
async fn run(args: &ArgMatches) -> Result<()> {
    // A subcommand is required, so one is guaranteed to be present.
    let (command, args) = args.subcommand().unwrap();
    let data_dir: &String = args.get_one(DATA_DIR).unwrap(); // Has a default value.
    let local = LocalBackend::open(data_dir)?;

    if command == "set-api-url" {
        let url: &String = args.get_one(URL).unwrap(); // Required argument is guaranteed to be present.
        local.save_api_url(url).await?;
        match local.api_url().await {
            Some(url) => println!("Using voting endpoint {url}"),
            None => println!("Using the local store"),
        }
        return Ok(());
    }

    let api_url = args.get_one::<String>(API_URL).map(String::as_str);
    let storage = Storage::select(local, api_url).await?;
    let email: &String = args.get_one(EMAIL).unwrap(); // Required argument is guaranteed to be present.
    let session = Session::login(Arc::new(storage), &login_policy(args), email).await?;
    let now = Utc::now();

    match command {
        "show" => {
            let view = session.ballot(now).await?;
            if args.get_flag(JSON) {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_ballot(&view);
            }
        }
        "status" => {
            let user = session.user();
            match user.record.voted_for_id {
                Some(id) => println!("{} has voted for contestant {id}", user.email),
                None => println!("{} has not voted yet", user.email),
            }
        }
        "vote" => {
            let id: &String = args.get_one(CONTESTANT_ID).unwrap(); // Required argument is guaranteed to be present.
            session.vote(id, now).await?;
            println!("Vote recorded. Thank you!");
            print_ballot(&session.ballot(now).await?);
        }
        "results" => {
            let standings = session.standings().await?;
            if args.get_flag(JSON) {
                println!("{}", serde_json::to_string_pretty(&standings)?);
            } else {
                for standing in standings {
                    println!(
                        "{:>3}. {} {}: {} votes ({:.1}%)",
                        standing.rank,
                        standing.contestant.number,
                        standing.contestant.name,
                        standing.contestant.votes,
                        standing.share
                    );
                }
            }
        }
        "add" => {
            let arg = |id: &str| -> String {
                args.get_one::<String>(id).cloned().unwrap_or_default()
            };
            let new = NewContestant {
                number: arg(NUMBER),
                name: arg(NAME),
                department: arg(DEPARTMENT),
                image_url: arg(IMAGE_URL),
            };
            let contestant = session.add_contestant(new, now).await?;
            println!("Added {} with ID {}", contestant.name, contestant.id);
        }
        "remove" => {
            let id: &String = args.get_one(CONTESTANT_ID).unwrap(); // Required argument is guaranteed to be present.
            session.remove_contestant(id).await?;
            println!("Removed contestant {id}");
        }
        "config" => {
            let current = session.ballot(now).await?;
            let banner_url = args
                .get_one::<String>(BANNER_URL)
                .cloned()
                .unwrap_or(current.banner_url);
            let deadline = match args.get_one::<String>(DEADLINE) {
                Some(text) => parse_deadline(text).map_err(Error::BadRequest)?,
                None => current.vote_deadline,
            };
            let config = session.update_config(&banner_url, deadline).await?;
            println!("Banner: {}", config.banner_url);
            match config.vote_deadline {
                Some(deadline) => println!("Deadline: {}", format_deadline(deadline)),
                None => println!("Deadline: none"),
            }
        }
        "reset" => {
            session.reset().await?;
            println!("All contestants and votes deleted");
        }
        _ => unreachable!("every subcommand is handled"),
    }
    Ok(())
}

#[rocket::main]
async fn main() {
    let args = cli().get_matches();
    let verbose = args
        .subcommand()
        .map_or(false, |(_, sub)| sub.get_flag(VERBOSE));
    init_logging(verbose);

    if let Err(err) = run(&args).await {
        eprintln!("{err}");
        std::process::exit(1)
    }
}
