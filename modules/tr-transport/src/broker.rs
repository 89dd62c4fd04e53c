//! Broker transport. A disconnected broker is degraded health, never fatal
//! (spec.md §4.1) — `MqttBroker::run` auto-reconnects with a fixed backoff
//! and keeps publishing frames once the connection resumes.

use crate::types::InboundFrame;
use async_trait::async_trait;
use chrono::Utc;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Dyn-compatible so `tr-server`'s composition root can wire in either the
/// real MQTT broker or the in-memory fake without the rest of the pipeline
/// knowing which — the same "prod impl vs. test double behind a trait"
/// shape as the identity/storage layers.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Runs until `shutdown` fires, delivering frames on `tx`. Must never
    /// return early on a transient disconnect.
    async fn run(&self, tx: mpsc::Sender<InboundFrame>, shutdown: watch::Receiver<bool>);

    fn is_healthy(&self) -> bool;
}

pub struct MqttBroker {
    host: String,
    port: u16,
    client_id: String,
    topics: Vec<String>,
    healthy: Arc<AtomicBool>,
}

impl MqttBroker {
    pub fn new(broker_url: &str, client_id: impl Into<String>, topics: Vec<String>) -> anyhow::Result<Self> {
        let (host, port) = parse_broker_url(broker_url)?;
        Ok(Self {
            host,
            port,
            client_id: client_id.into(),
            topics,
            healthy: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait]
impl Broker for MqttBroker {
    async fn run(&self, tx: mpsc::Sender<InboundFrame>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            let mut opts = MqttOptions::new(&self.client_id, &self.host, self.port);
            opts.set_keep_alive(Duration::from_secs(30));
            let (client, mut eventloop) = AsyncClient::new(opts, 1024);

            for topic in &self.topics {
                if let Err(e) = client.subscribe(topic, QoS::AtMostOnce).await {
                    tracing::warn!(error = %e, topic, "subscribe failed, will retry on reconnect");
                }
            }

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                    result = eventloop.poll() => {
                        match result {
                            Ok(Event::Incoming(Packet::Publish(publish))) => {
                                self.healthy.store(true, Ordering::Relaxed);
                                let frame = InboundFrame {
                                    topic: publish.topic,
                                    payload: publish.payload.to_vec(),
                                    received_at: Utc::now(),
                                    source_instance: Some(self.client_id.clone()),
                                };
                                if tx.send(frame).await.is_err() {
                                    return;
                                }
                            }
                            Ok(_) => {
                                self.healthy.store(true, Ordering::Relaxed);
                            }
                            Err(e) => {
                                self.healthy.store(false, Ordering::Relaxed);
                                tracing::warn!(error = %e, "broker connection lost, reconnecting");
                                tokio::time::sleep(RECONNECT_BACKOFF).await;
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}

fn parse_broker_url(url: &str) -> anyhow::Result<(String, u16)> {
    let without_scheme = url.split("://").last().unwrap_or(url);
    let mut parts = without_scheme.splitn(2, ':');
    let host = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("broker URL missing host: {url}"))?
        .to_string();
    let port = parts
        .next()
        .map(|p| p.parse::<u16>())
        .transpose()?
        .unwrap_or(1883);
    Ok((host, port))
}

/// In-memory test double. Replays a fixed sequence of frames, one per call
/// to `run`, then idles until shutdown — mirrors the production vs.
/// in-memory-fake split used for storage and identity resolution elsewhere
/// in the workspace.
pub struct FakeBroker {
    frames: std::sync::Mutex<Vec<InboundFrame>>,
    healthy: Arc<AtomicBool>,
}

impl FakeBroker {
    pub fn new(frames: Vec<InboundFrame>) -> Self {
        Self {
            frames: std::sync::Mutex::new(frames),
            healthy: Arc::new(AtomicBool::new(true)),
        }
    }
}

#[async_trait]
impl Broker for FakeBroker {
    async fn run(&self, tx: mpsc::Sender<InboundFrame>, mut shutdown: watch::Receiver<bool>) {
        let frames = std::mem::take(&mut *self.frames.lock().expect("fake broker lock poisoned"));
        for frame in frames {
            if tx.send(frame).await.is_err() {
                return;
            }
        }
        let _ = shutdown.changed().await;
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        assert_eq!(parse_broker_url("mqtt://localhost:1883").unwrap(), ("localhost".into(), 1883));
        assert_eq!(parse_broker_url("localhost").unwrap(), ("localhost".into(), 1883));
    }

    #[tokio::test]
    async fn fake_broker_replays_frames_then_idles_until_shutdown() {
        let frame = InboundFrame {
            topic: "call_start".into(),
            payload: b"{}".to_vec(),
            received_at: Utc::now(),
            source_instance: None,
        };
        let broker = FakeBroker::new(vec![frame]);
        let (tx, mut rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { broker.run(tx, shutdown_rx).await });
        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic, "call_start");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
