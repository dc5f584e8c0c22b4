pub mod contestant;
pub mod db;
pub mod eligibility;
pub mod ledger;
pub mod mongodb;
pub mod protocol;
pub mod results;
pub mod system_config;
pub mod user;

pub use contestant::{Contestant, NewContestant};
pub use eligibility::Eligibility;
pub use ledger::VoterRecord;
pub use system_config::SystemConfig;
pub use user::{LoginPolicy, User};
