use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior, interval};

const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Periodically POSTs this service's public `/health` URL so hosting
/// platforms that idle quiet instances keep it warm.
pub struct HealthMonitor {
    client: reqwest::Client,
    url: String,
    period: Duration,
    shutdown: watch::Receiver<bool>,
}

impl HealthMonitor {
    /// A zero `period` is raised to one second.
    pub fn new(url: String, period: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            period: period.max(MIN_PERIOD),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🩺 Health monitor started ({} every {:?})", self.url, self.period);

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the check runs on schedule.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Health monitor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.check().await;
                }
            }
        }
    }

    async fn check(&self) {
        let result = async {
            let response = self.client.post(&self.url).json(&Value::Null).send().await?;
            response.error_for_status()?.json::<Value>().await
        }
        .await;

        match result {
            Ok(body) => tracing::info!("Health check at {}: {}", Utc::now().to_rfc3339(), body),
            Err(e) => tracing::error!("Health check failed at {}: {}", Utc::now().to_rfc3339(), e),
        }
    }
}
