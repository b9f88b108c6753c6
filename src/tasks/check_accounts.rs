use std::sync::Arc;

use log::{debug, error, info, warn};
use time::OffsetDateTime;
use tokio::task::JoinSet;
use url::Url;

use crate::{
    config::WatermarkPolicy,
    queries::accounts::Registry,
    types::{ActivityFetcher, ActivityRecord, Notifier, TrackedAccount},
};

/// What a single fetched record means for an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    NoOp,
    /// First observation: remember it, stay quiet.
    Bootstrap(i64),
    /// Activity we have not announced yet.
    Notify(i64),
}

pub fn decide(last_ts: i64, latest_ts: i64) -> Decision {
    match (last_ts, latest_ts) {
        // the source never reports a real timestamp at or below zero
        (_, latest) if latest <= 0 => Decision::NoOp,
        (0, latest) => Decision::Bootstrap(latest),
        (last, latest) if last == latest => Decision::NoOp,
        (_, latest) => Decision::Notify(latest),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountOutcome {
    NoRecord,
    FetchFailed,
    Unchanged,
    Bootstrapped(i64),
    Notified(i64),
    SendFailed { timestamp: i64, advanced: bool },
    StoreFailed,
}

#[derive(Debug)]
pub struct PassReport {
    pub outcomes: Vec<(String, AccountOutcome)>,
    pub started: OffsetDateTime,
    pub finished: OffsetDateTime,
}

impl PassReport {
    pub fn outcome_for(&self, owner_id: &str) -> Option<AccountOutcome> {
        self.outcomes
            .iter()
            .find(|(owner, _)| owner == owner_id)
            .map(|(_, outcome)| *outcome)
    }

    pub fn notified(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, AccountOutcome::Notified(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| {
                matches!(
                    o,
                    AccountOutcome::FetchFailed
                        | AccountOutcome::SendFailed { .. }
                        | AccountOutcome::StoreFailed
                )
            })
            .count()
    }
}

pub fn format_submission(external_name: &str, record: &ActivityRecord, site: &Url) -> String {
    format!(
        "🚀 {} just submitted:\n{} ({}, {})\n{}/problems/{}/",
        external_name,
        record.title,
        record.status_label,
        record.language_label,
        site.as_str().trim_end_matches('/'),
        record.slug
    )
}

/// Runs polling passes over the registry.
#[derive(Clone)]
pub struct Poller {
    pub registry: Registry,
    pub fetcher: Arc<dyn ActivityFetcher>,
    pub notifier: Arc<dyn Notifier>,
    pub destination: String,
    pub site: Url,
    pub policy: WatermarkPolicy,
    pub max_in_flight: usize,
}

impl Poller {
    /// One pass over a snapshot of the registry.
    ///
    /// Only a failed snapshot read is an error; everything that goes wrong for a
    /// single account is logged and recorded in that account's outcome.
    pub async fn check_accounts(&self) -> anyhow::Result<PassReport> {
        let started = OffsetDateTime::now_utc();
        info!("[Poll] Pass started at {started}");

        let accounts = self.registry.list_all().await?;
        let total = accounts.len();

        let mut threads = JoinSet::new();
        let mut outcomes = Vec::with_capacity(total);
        let max_in_flight = self.max_in_flight.max(1);

        for account in accounts {
            while threads.len() >= max_in_flight {
                collect(threads.join_next().await, &mut outcomes);
            }

            let poller = self.clone();
            threads.spawn(async move {
                let owner_id = account.owner_id.clone();
                (owner_id, poller.check_account(account).await)
            });
        }

        while let Some(res) = threads.join_next().await {
            collect(Some(res), &mut outcomes);
        }

        let report = PassReport {
            outcomes,
            started,
            finished: OffsetDateTime::now_utc(),
        };
        info!(
            "[Poll] Pass over {} accounts finished, {} notified, {} failed, took {}",
            total,
            report.notified(),
            report.failed(),
            report.finished - report.started
        );

        Ok(report)
    }

    async fn check_account(&self, account: TrackedAccount) -> AccountOutcome {
        let name = &account.external_name;

        let record = match self.fetcher.fetch_latest(name).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("[Poll] No submissions for {name}");
                return AccountOutcome::NoRecord;
            }
            Err(err) => {
                warn!("[Poll] Fetching {name} failed with err {err}");
                return AccountOutcome::FetchFailed;
            }
        };

        match decide(account.last_seen_timestamp, record.timestamp) {
            Decision::NoOp => AccountOutcome::Unchanged,
            Decision::Bootstrap(ts) => {
                info!("[Poll] First observation for {name} at {ts}, not announcing");
                match self.store(&account, ts).await {
                    true => AccountOutcome::Bootstrapped(ts),
                    false => AccountOutcome::StoreFailed,
                }
            }
            Decision::Notify(ts) => {
                let text = format_submission(name, &record, &self.site);
                let delivered = match self.notifier.send(&self.destination, &text).await {
                    Ok(()) => {
                        info!("[Poll] Announced submission {ts} by {name}");
                        true
                    }
                    Err(err) => {
                        error!("[Poll] Sending notification for {name} failed with err {err}");
                        false
                    }
                };

                if !delivered && self.policy == WatermarkPolicy::HoldOnSendFailure {
                    return AccountOutcome::SendFailed {
                        timestamp: ts,
                        advanced: false,
                    };
                }

                if !self.store(&account, ts).await {
                    return AccountOutcome::StoreFailed;
                }

                match delivered {
                    true => AccountOutcome::Notified(ts),
                    false => AccountOutcome::SendFailed {
                        timestamp: ts,
                        advanced: true,
                    },
                }
            }
        }
    }

    async fn store(&self, account: &TrackedAccount, ts: i64) -> bool {
        match self.registry.advance_watermark(&account.owner_id, ts).await {
            Ok(true) => true,
            Ok(false) => {
                info!(
                    "[Poll] Owner {} unregistered during the pass, dropping watermark {ts}",
                    account.owner_id
                );
                true
            }
            Err(err) => {
                error!(
                    "[Poll] Saving watermark {ts} for {} failed with err {err}",
                    account.external_name
                );
                false
            }
        }
    }
}

fn collect(
    res: Option<Result<(String, AccountOutcome), tokio::task::JoinError>>,
    outcomes: &mut Vec<(String, AccountOutcome)>,
) {
    match res {
        Some(Ok(outcome)) => outcomes.push(outcome),
        Some(Err(err)) => error!("[Poll] Account check task died with err {err}"),
        None => {}
    }
}
