pub mod notifier;

pub use notifier::{birthday_subject, DeliveryError, MailSender, Notifier, OutgoingEmail};
