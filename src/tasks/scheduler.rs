use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use log::{error, info, warn};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::tasks::check_accounts::{PassReport, Poller};

pub const FIRST_POLL_DELAY: Duration = Duration::from_secs(5);

/// Runs one pass unless another one is still in flight, in which case the tick
/// is dropped.
pub async fn run_exclusive(
    in_flight: &Mutex<()>,
    poller: &Poller,
    job_id: Uuid,
) -> Option<PassReport> {
    let Ok(_running) = in_flight.try_lock() else {
        warn!("[Scheduler] Tick {job_id} skipped, previous pass still running");
        return None;
    };

    match poller.check_accounts().await {
        Ok(report) => Some(report),
        Err(err) => {
            error!("[Scheduler] Pass aborted, couldn't read accounts. Err: {err}");
            None
        }
    }
}

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

fn poll_job(
    poller: Poller,
    in_flight: Arc<Mutex<()>>,
) -> impl FnMut(Uuid, JobScheduler) -> JobFuture + Send + Sync + 'static {
    move |job_id: Uuid, _l: JobScheduler| -> JobFuture {
        let poller = poller.clone();
        let in_flight = in_flight.clone();
        Box::pin(async move {
            run_exclusive(&in_flight, &poller, job_id).await;
        })
    }
}

/// Starts polling: once shortly after startup, then every `interval`.
pub async fn start_polling(
    poller: Poller,
    interval: Duration,
    first_delay: Duration,
) -> anyhow::Result<JobScheduler> {
    let in_flight = Arc::new(Mutex::new(()));
    let scheduler = JobScheduler::new().await?;

    scheduler
        .add(Job::new_one_shot_async(
            first_delay,
            poll_job(poller.clone(), in_flight.clone()),
        )?)
        .await?;
    scheduler
        .add(Job::new_repeated_async(
            interval,
            poll_job(poller, in_flight),
        )?)
        .await?;
    info!(
        "[Scheduler] Polling every {}s, first pass in {}s",
        interval.as_secs(),
        first_delay.as_secs()
    );

    scheduler.start().await?;
    info!("[Scheduler] Started");

    Ok(scheduler)
}
