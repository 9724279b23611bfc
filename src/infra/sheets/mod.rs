pub mod google_sheets_client;

pub use google_sheets_client::GoogleSheetsClient;
