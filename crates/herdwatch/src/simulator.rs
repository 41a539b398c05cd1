//! Reading Simulator
//!
//! Stands in for a collar on the bench: publishes a plausible reading for one
//! animal to the telemetry topic on a fixed interval.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use rumqttc::{AsyncClient, QoS};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bridge::MqttConfig;

/// Errors raised while publishing simulated readings
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("Failed to encode reading: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to publish reading: {0}")]
    Publish(#[from] rumqttc::ClientError),
}

/// Simulator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub interval_secs: u64,
    pub animal_id: i64,
    pub client_id: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            animal_id: 4,
            client_id: "herdwatch-simulator".to_string(),
        }
    }
}

impl SimulatorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Payload in the collar's wire format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReading {
    pub animal_id: i64,
    pub temperature: f64,
    pub heart_rate: u32,
    pub step_count: u32,
    pub weight: f64,
}

impl DeviceReading {
    /// Draw a reading in the collar's normal operating ranges
    pub fn random<R: Rng + ?Sized>(animal_id: i64, rng: &mut R) -> Self {
        Self {
            animal_id,
            temperature: round2(rng.gen_range(96.0..102.0)),
            heart_rate: rng.gen_range(80..100),
            step_count: rng.gen_range(5_000..13_000),
            weight: round2(rng.gen_range(20.0..25.0)),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Publish readings until `shutdown` resolves
pub async fn run(
    upstream: &MqttConfig,
    config: &SimulatorConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<(), SimulatorError> {
    let (client, mut eventloop) =
        AsyncClient::new(upstream.options(&config.client_id), upstream.channel_capacity.max(1));

    info!(
        host = %upstream.host,
        port = upstream.port,
        topic = %upstream.topic,
        "Publishing simulated readings every {:?}",
        config.interval()
    );

    // The event loop drives the connection; rumqttc reconnects on the next poll
    let reconnect_delay = Duration::from_millis(upstream.reconnect_min_ms.max(1));
    let driver = tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                warn!(error = %e, "Simulator lost connection to MQTT broker");
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    });

    let result = publish_loop(&client, upstream, config, shutdown).await;

    let _ = client.try_disconnect();
    driver.abort();
    info!("Simulator stopped");
    result
}

async fn publish_loop(
    client: &AsyncClient,
    upstream: &MqttConfig,
    config: &SimulatorConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<(), SimulatorError> {
    let mut rng = rand::thread_rng();
    let mut ticker = tokio::time::interval(config.interval());
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => return Ok(()),
            _ = ticker.tick() => {
                let reading = DeviceReading::random(config.animal_id, &mut rng);
                let payload = serde_json::to_vec(&reading)?;
                client
                    .publish(upstream.topic.as_str(), QoS::AtMostOnce, false, payload)
                    .await?;
                debug!(?reading, "Sent simulated reading");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::telemetry::Reading;

    #[test]
    fn test_random_reading_ranges() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let reading = DeviceReading::random(4, &mut rng);
            assert_eq!(reading.animal_id, 4);
            assert!((96.0..=102.0).contains(&reading.temperature));
            assert!((80..100).contains(&reading.heart_rate));
            assert!((5_000..13_000).contains(&reading.step_count));
            assert!((20.0..=25.0).contains(&reading.weight));
            assert_eq!(reading.temperature, round2(reading.temperature));
            assert_eq!(reading.weight, round2(reading.weight));
        }
    }

    #[test]
    fn test_reading_decodes_on_bridge() {
        let mut rng = StdRng::seed_from_u64(7);
        let sent = DeviceReading::random(4, &mut rng);
        let payload = serde_json::to_vec(&sent).unwrap();

        let reading = Reading::from_slice(&payload).unwrap();
        assert_eq!(reading.entity_id(), Some(4));
        assert_eq!(reading.temperature(), Some(sent.temperature));
        assert_eq!(reading.heart_rate(), Some(sent.heart_rate));
        assert_eq!(reading.activity().and_then(|n| n.as_u64()), Some(sent.step_count as u64));
        assert_eq!(reading.weight(), Some(sent.weight));
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(98.456), 98.46);
        assert_eq!(round2(20.0), 20.0);
    }

    #[test]
    fn test_zero_interval_clamped() {
        let config = SimulatorConfig {
            interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.interval(), Duration::from_secs(1));
    }
}
