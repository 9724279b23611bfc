pub mod date_matcher;

#[allow(unused_imports)]
pub use date_matcher::{
    check_birthdate, todays_birthdays, BirthdayCheck, InvalidBirthdate, MatchOutcome,
    ParsedBirthdate,
};
