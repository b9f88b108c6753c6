#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use submission_watch::{
    config::{DatabaseTarget, WatermarkPolicy},
    db::{get_database, migrate_db},
    queries::accounts::Registry,
    tasks::check_accounts::Poller,
    types::{ActivityFetcher, ActivityRecord, FetchError, Notifier, SendError},
};
use tempfile::TempDir;
use url::Url;

pub const GROUP: &str = "-100200300";

/// A migrated database in a fresh temp dir. Keep the `TempDir` alive.
pub async fn temp_registry() -> (TempDir, Registry) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("watch.db");
    let db = get_database(&DatabaseTarget::Local(path.to_string_lossy().into_owned()))
        .await
        .unwrap();
    let registry = Registry::new(db);
    migrate_db(registry.connect().unwrap()).await.unwrap();

    (dir, registry)
}

pub fn submission(timestamp: i64) -> ActivityRecord {
    ActivityRecord {
        timestamp,
        ..Default::default()
    }
}

enum Script {
    Record(ActivityRecord),
    Fail,
}

/// Answers with whatever the test last scripted for a name; unknown names have no record.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    pub calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn set(&self, name: &str, record: ActivityRecord) {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.into(), Script::Record(record));
    }

    pub fn fail(&self, name: &str) {
        self.scripts.lock().unwrap().insert(name.into(), Script::Fail);
    }
}

#[async_trait]
impl ActivityFetcher for ScriptedFetcher {
    async fn fetch_latest(
        &self,
        external_name: &str,
    ) -> Result<Option<ActivityRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.scripts.lock().unwrap().get(external_name) {
            Some(Script::Record(record)) => Ok(Some(record.clone())),
            Some(Script::Fail) => Err(FetchError::Payload("simulated timeout".into())),
            None => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, destination: &str, text: &str) -> Result<(), SendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SendError::Rejected {
                status: reqwest::StatusCode::BAD_GATEWAY,
                body: "simulated outage".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.into(), text.into()));
        Ok(())
    }
}

pub fn poller(
    registry: &Registry,
    fetcher: &Arc<ScriptedFetcher>,
    notifier: &Arc<RecordingNotifier>,
    policy: WatermarkPolicy,
) -> Poller {
    Poller {
        registry: registry.clone(),
        fetcher: fetcher.clone(),
        notifier: notifier.clone(),
        destination: GROUP.into(),
        site: Url::parse("https://leetcode.com").unwrap(),
        policy,
        max_in_flight: 2,
    }
}
