//! MQTT Upstream
//!
//! Subscribes to the collar telemetry topic on an MQTT broker. The client
//! re-subscribes after every ConnAck and backs off exponentially between
//! failed connection attempts; it never gives up on its own.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use wildmatch::WildMatch;

use super::upstream::{UpstreamEvent, UpstreamSource};
use super::{BridgeError, BridgeResult};

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Topic filter to subscribe to (MQTT `+` / `#` wildcards allowed)
    pub topic: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Connect over TLS using the platform root certificates
    pub tls: bool,
    pub keep_alive_secs: u64,
    /// How long startup waits for the first ConnAck
    pub connect_timeout_secs: u64,
    pub reconnect_min_ms: u64,
    pub reconnect_max_ms: u64,
    /// Request queue size between client and event loop
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: "livestock/data".to_string(),
            client_id: "herdwatch-bridge".to_string(),
            username: None,
            password: None,
            tls: false,
            keep_alive_secs: 30,
            connect_timeout_secs: 10,
            reconnect_min_ms: 500,
            reconnect_max_ms: 30_000,
            channel_capacity: 64,
        }
    }
}

impl MqttConfig {
    /// Build client options using `client_id` as the MQTT client identifier
    pub fn options(&self, client_id: &str) -> MqttOptions {
        let mut options = MqttOptions::new(client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs.max(5)));
        options.set_clean_session(true);

        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.as_deref().unwrap_or_default());
        }
        if self.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_backoff: Duration::from_millis(self.reconnect_min_ms),
            max_backoff: Duration::from_millis(self.reconnect_max_ms.max(self.reconnect_min_ms)),
            backoff_multiplier: 2.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reconnect Backoff
// ─────────────────────────────────────────────────────────────────────────────

/// Exponential backoff between reconnect attempts
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

/// Tracks the delay before the next reconnect attempt
#[derive(Debug)]
pub struct Backoff {
    policy: ReconnectPolicy,
    current: Duration,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        let current = policy.initial_backoff;
        Self { policy, current }
    }

    /// Delay to wait now; grows the delay for next time
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.policy.backoff_multiplier)
                .min(self.policy.max_backoff.as_secs_f64()),
        );
        delay
    }

    /// Called once a connection is established
    pub fn reset(&mut self) {
        self.current = self.policy.initial_backoff;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Topic Filter
// ─────────────────────────────────────────────────────────────────────────────

/// MQTT topic filter matched level by level
///
/// `+` matches exactly one level, a trailing `#` matches the rest.
#[derive(Debug, Clone)]
pub struct TopicFilter {
    filter: String,
    levels: Vec<WildMatch>,
    multi_level: bool,
}

impl TopicFilter {
    pub fn new(filter: &str) -> Self {
        let mut parts: Vec<&str> = filter.split('/').collect();
        let multi_level = parts.last() == Some(&"#");
        if multi_level {
            parts.pop();
        }

        // Within a single level `+` behaves like a glob star
        let levels = parts
            .iter()
            .map(|level| WildMatch::new(&level.replace('+', "*")))
            .collect();

        Self {
            filter: filter.to_string(),
            levels,
            multi_level,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.filter
    }

    pub fn matches(&self, topic: &str) -> bool {
        let topic_levels: Vec<&str> = topic.split('/').collect();

        if self.multi_level {
            if topic_levels.len() < self.levels.len() {
                return false;
            }
        } else if topic_levels.len() != self.levels.len() {
            return false;
        }

        self.levels
            .iter()
            .zip(&topic_levels)
            .all(|(pattern, level)| pattern.matches(level))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MQTT Upstream
// ─────────────────────────────────────────────────────────────────────────────

/// Upstream subscription on an MQTT broker
pub struct MqttUpstream {
    client: AsyncClient,
    eventloop: EventLoop,
    filter: TopicFilter,
    backoff: Backoff,
    /// Delay owed before polling again after a connection error
    retry_after: Option<Duration>,
    /// Report the startup connection on the first poll
    announce_connected: bool,
    closed: bool,
}

impl MqttUpstream {
    /// Connect and subscribe, waiting for the broker to accept the session
    ///
    /// Failing here is a startup configuration error.
    pub async fn connect(config: &MqttConfig) -> BridgeResult<Self> {
        let (client, eventloop) =
            AsyncClient::new(config.options(&config.client_id), config.channel_capacity.max(1));

        let mut upstream = Self {
            client,
            eventloop,
            filter: TopicFilter::new(&config.topic),
            backoff: Backoff::new(config.reconnect_policy()),
            retry_after: None,
            announce_connected: true,
            closed: false,
        };

        info!(host = %config.host, port = config.port, tls = config.tls, "Connecting to MQTT broker");

        tokio::time::timeout(config.connect_timeout(), upstream.await_connack())
            .await
            .map_err(|_| {
                BridgeError::UpstreamConnect(format!(
                    "no ConnAck from {}:{} within {:?}",
                    config.host,
                    config.port,
                    config.connect_timeout()
                ))
            })??;

        upstream.subscribe()?;
        info!(topic = %config.topic, "Subscribed to telemetry topic");

        Ok(upstream)
    }

    async fn await_connack(&mut self) -> BridgeResult<()> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                Ok(_) => continue,
                Err(e) => return Err(BridgeError::UpstreamConnect(e.to_string())),
            }
        }
    }

    fn subscribe(&self) -> BridgeResult<()> {
        self.client
            .try_subscribe(self.filter.as_str(), QoS::AtMostOnce)
            .map_err(|e| BridgeError::UpstreamConnect(format!("subscribe failed: {}", e)))
    }
}

#[async_trait]
impl UpstreamSource for MqttUpstream {
    async fn next_event(&mut self) -> Option<UpstreamEvent> {
        if self.closed {
            return None;
        }
        if std::mem::take(&mut self.announce_connected) {
            return Some(UpstreamEvent::Connected);
        }
        if let Some(delay) = self.retry_after.take() {
            debug!(?delay, "Waiting before reconnecting to MQTT broker");
            tokio::time::sleep(delay).await;
        }

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.backoff.reset();
                    if let Err(e) = self.subscribe() {
                        warn!(error = %e, "Failed to re-subscribe after reconnect");
                    }
                    return Some(UpstreamEvent::Connected);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if self.filter.matches(&publish.topic) {
                        return Some(UpstreamEvent::Message(publish.payload));
                    }
                    trace!(topic = %publish.topic, "Ignoring message outside topic filter");
                }
                Ok(_) => {}
                Err(e) => {
                    self.retry_after = Some(self.backoff.next_delay());
                    return Some(UpstreamEvent::Disconnected(e.to_string()));
                }
            }
        }
    }

    async fn close(&mut self) {
        if std::mem::replace(&mut self.closed, true) {
            return;
        }

        if self.client.try_disconnect().is_err() {
            return;
        }

        // Drive the event loop until the Disconnect packet is flushed
        let flush = async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(Duration::from_secs(1), flush).await.is_err() {
            debug!("Timed out flushing MQTT disconnect");
        }
        info!("MQTT subscription closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_exact_match() {
        let filter = TopicFilter::new("livestock/data");
        assert!(filter.matches("livestock/data"));
        assert!(!filter.matches("livestock/data/extra"));
        assert!(!filter.matches("livestock"));
        assert!(!filter.matches("poultry/data"));
    }

    #[test]
    fn test_topic_single_level_wildcard() {
        let filter = TopicFilter::new("farm/+/data");
        assert!(filter.matches("farm/barn-1/data"));
        assert!(filter.matches("farm/field/data"));
        assert!(!filter.matches("farm/barn-1/pen-2/data"));
        assert!(!filter.matches("farm/barn-1/status"));
    }

    #[test]
    fn test_topic_multi_level_wildcard() {
        let filter = TopicFilter::new("livestock/#");
        assert!(filter.matches("livestock/data"));
        assert!(filter.matches("livestock/goats/4/data"));
        assert!(filter.matches("livestock"));
        assert!(!filter.matches("poultry/data"));

        assert!(TopicFilter::new("#").matches("anything/at/all"));
    }

    #[test]
    fn test_backoff_grows_and_resets() {
        let mut backoff = Backoff::new(ReconnectPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
        });

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_reconnect_policy_from_config() {
        let config = MqttConfig {
            reconnect_min_ms: 2_000,
            reconnect_max_ms: 1_000,
            ..Default::default()
        };
        let policy = config.reconnect_policy();
        assert_eq!(policy.initial_backoff, Duration::from_secs(2));
        assert_eq!(policy.max_backoff, Duration::from_secs(2));
    }
}
