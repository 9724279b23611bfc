pub mod gmail_client;

pub use gmail_client::GmailClient;
