// The daily birthday run.
//
// One pass, top to bottom: read the roster, find today's birthdays, then for
// each match generate a greeting and send it. A problem with one person never
// stops the others, and a missing roster just means there is nothing to do.

use chrono::NaiveDate;

use crate::core::birthdays::todays_birthdays;
use crate::core::greetings::{GreetingService, TextGenerator};
use crate::core::notify::{birthday_subject, MailSender, Notifier};
use crate::core::roster::RosterSource;

/// Why a matched record was not emailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingName,
    MissingEmail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub name: Option<String>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelivery {
    pub recipient: String,
    pub error: String,
}

/// What happened during one run. Used for the final log line and in tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rows_read: usize,
    pub invalid_dates: usize,
    pub matches: usize,
    /// Recipients that were emailed successfully, in roster order.
    pub sent: Vec<String>,
    pub skipped: Vec<SkippedRecord>,
    pub failed: Vec<FailedDelivery>,
}

pub struct BirthdayPipeline<R, G, M>
where
    R: RosterSource,
    G: TextGenerator,
    M: MailSender,
{
    roster: R,
    greetings: GreetingService<G>,
    notifier: Notifier<M>,
}

impl<R, G, M> BirthdayPipeline<R, G, M>
where
    R: RosterSource,
    G: TextGenerator,
    M: MailSender,
{
    pub fn new(roster: R, greetings: GreetingService<G>, notifier: Notifier<M>) -> Self {
        Self {
            roster,
            greetings,
            notifier,
        }
    }

    /// Runs the whole job for `today`. Never fails; everything that goes wrong
    /// is logged and reflected in the summary.
    pub async fn run(&self, today: NaiveDate) -> RunSummary {
        tracing::info!("Starting birthday run for {}", today);

        let summary = self.process(today).await;

        tracing::info!(
            rows_read = summary.rows_read,
            matches = summary.matches,
            sent = summary.sent.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "Birthday run finished"
        );

        summary
    }

    async fn process(&self, today: NaiveDate) -> RunSummary {
        let mut summary = RunSummary::default();

        let roster = match self.roster.fetch_roster().await {
            Ok(roster) => roster,
            Err(e) => {
                tracing::error!("Failed to read roster: {}", e);
                return summary;
            }
        };

        if roster.is_empty() {
            tracing::info!("Roster is empty, nothing to do");
            return summary;
        }

        summary.rows_read = roster.len();
        tracing::info!("Read {} roster row(s)", roster.len());

        let outcome = todays_birthdays(&roster, today);
        summary.invalid_dates = outcome.rejected.len();
        for rejected in &outcome.rejected {
            tracing::info!(
                row = rejected.index,
                "Skipping invalid birthdate '{}': {}",
                rejected.raw,
                rejected.reason
            );
        }
        summary.matches = outcome.matches.len();

        if outcome.matches.is_empty() {
            tracing::info!("No birthdays today");
            return summary;
        }

        tracing::info!("{} birthday(s) today", outcome.matches.len());

        for person in &outcome.matches {
            let (name, email) = match (person.name(), person.email()) {
                (Some(name), Some(email)) => (name, email),
                (name, _) => {
                    let reason = if name.is_none() {
                        SkipReason::MissingName
                    } else {
                        SkipReason::MissingEmail
                    };
                    tracing::warn!(?reason, "Skipping {}", name.unwrap_or("<unnamed>"));
                    summary.skipped.push(SkippedRecord {
                        name: name.map(str::to_string),
                        reason,
                    });
                    continue;
                }
            };

            let greeting = self.greetings.greeting_for(person).await;
            let subject = birthday_subject(name);

            match self.notifier.notify(email, &subject, &greeting).await {
                Ok(()) => summary.sent.push(email.to_string()),
                Err(e) => {
                    tracing::warn!("Continuing after failed delivery to {}", email);
                    summary.failed.push(FailedDelivery {
                        recipient: email.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::greetings::GenerationError;
    use crate::core::notify::{DeliveryError, OutgoingEmail};
    use crate::core::roster::{Roster, RosterError};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct StaticRoster(Result<Vec<Vec<String>>, String>);

    #[async_trait]
    impl RosterSource for StaticRoster {
        async fn fetch_roster(&self) -> Result<Roster, RosterError> {
            match &self.0 {
                Ok(grid) => Ok(Roster::from_grid(grid.clone())),
                Err(e) => Err(RosterError::Request(e.clone())),
            }
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("Have a great day!".to_string())
        }
    }

    type Outbox = Arc<Mutex<Vec<OutgoingEmail>>>;

    /// Records sent mail; fails for any recipient in `reject`.
    struct RecordingSender {
        outbox: Outbox,
        reject: Vec<String>,
    }

    #[async_trait]
    impl MailSender for RecordingSender {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
            if self.reject.contains(&email.to) {
                return Err(DeliveryError::Rejected("mailbox unavailable".to_string()));
            }
            self.outbox.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    type TestPipeline = BirthdayPipeline<StaticRoster, EchoGenerator, RecordingSender>;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 4).unwrap()
    }

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    const HEADER: &[&str] = &["nombre", "fecha de nacimiento", "correo electrónico"];

    fn pipeline(roster: StaticRoster, reject: &[&str]) -> (TestPipeline, Outbox) {
        let outbox = Outbox::default();
        let sender = RecordingSender {
            outbox: Arc::clone(&outbox),
            reject: reject.iter().map(|r| r.to_string()).collect(),
        };
        let pipeline = BirthdayPipeline::new(
            roster,
            GreetingService::new(EchoGenerator),
            Notifier::new(sender, "me@example.com"),
        );
        (pipeline, outbox)
    }

    fn recipients(outbox: &Outbox) -> Vec<String> {
        outbox.lock().unwrap().iter().map(|e| e.to.clone()).collect()
    }

    #[tokio::test]
    async fn test_empty_roster_sends_nothing() {
        let (p, outbox) = pipeline(StaticRoster(Ok(grid(&[HEADER]))), &[]);

        let summary = p.run(today()).await;

        assert_eq!(summary, RunSummary::default());
        assert!(recipients(&outbox).is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_roster_ends_quietly() {
        let (p, outbox) = pipeline(StaticRoster(Err("403 Forbidden".to_string())), &[]);

        let summary = p.run(today()).await;

        assert_eq!(summary.rows_read, 0);
        assert!(recipients(&outbox).is_empty());
    }

    #[tokio::test]
    async fn test_no_birthdays_today() {
        let (p, outbox) = pipeline(
            StaticRoster(Ok(grid(&[HEADER, &["Ana", "1990/01/01", "ana@example.com"]]))),
            &[],
        );

        let summary = p.run(today()).await;

        assert_eq!(summary.rows_read, 1);
        assert_eq!(summary.matches, 0);
        assert!(recipients(&outbox).is_empty());
    }

    #[tokio::test]
    async fn test_match_without_email_is_skipped() {
        let (p, outbox) = pipeline(
            StaticRoster(Ok(grid(&[
                HEADER,
                &["Ana", "1994/05/04", ""],
                &["Luis", "05/04", "luis@example.com"],
            ]))),
            &[],
        );

        let summary = p.run(today()).await;

        assert_eq!(summary.matches, 2);
        assert_eq!(recipients(&outbox), vec!["luis@example.com"]);
        assert_eq!(
            summary.skipped,
            vec![SkippedRecord {
                name: Some("Ana".to_string()),
                reason: SkipReason::MissingEmail,
            }]
        );
    }

    #[tokio::test]
    async fn test_match_without_name_is_skipped() {
        let (p, outbox) = pipeline(
            StaticRoster(Ok(grid(&[HEADER, &["", "05/04", "who@example.com"]]))),
            &[],
        );

        let summary = p.run(today()).await;

        assert!(recipients(&outbox).is_empty());
        assert_eq!(summary.skipped[0].reason, SkipReason::MissingName);
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_stop_the_batch() {
        let (p, outbox) = pipeline(
            StaticRoster(Ok(grid(&[
                HEADER,
                &["Ana", "05/04", "ana@example.com"],
                &["Bad", "garbage", "bad@example.com"],
                &["Eva", "2000/05/04", "eva@example.com"],
            ]))),
            &["ana@example.com"],
        );

        let summary = p.run(today()).await;

        assert_eq!(summary.invalid_dates, 1);
        assert_eq!(summary.sent, vec!["eva@example.com"]);
        assert_eq!(recipients(&outbox), vec!["eva@example.com"]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].recipient, "ana@example.com");
    }

    #[tokio::test]
    async fn test_email_carries_subject_and_greeting() {
        let (p, outbox) = pipeline(
            StaticRoster(Ok(grid(&[HEADER, &["Eva", "05/04", "eva@example.com"]]))),
            &[],
        );

        p.run(today()).await;

        let sent = outbox.lock().unwrap();
        assert_eq!(sent[0].subject, "Happy Birthday, Eva!");
        assert_eq!(sent[0].body, "Have a great day!");
        assert_eq!(sent[0].from, "me@example.com");
    }
}
