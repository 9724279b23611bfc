pub mod roster_models;

#[allow(unused_imports)]
pub use roster_models::{
    PersonRecord, Roster, RosterError, RosterSource, BIRTHDATE_KEY, EMAIL_KEY, GENDER_KEY,
    NAME_KEY, RELATIONSHIP_KEY,
};
