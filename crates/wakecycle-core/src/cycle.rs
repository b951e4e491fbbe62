//! The boot sequencer
//!
//! One [`BootCycle`] drives a single wake: store init, ledger rotation, network
//! join, the messaging exchange, teardown, and arming the wake timer. The
//! caller enters deep sleep once [`BootCycle::run`] returns.
//!
//! Events from the network and messaging stacks are dispatched by
//! [`BootCycle::on_network_event`] and [`BootCycle::on_mqtt_event`], flat
//! matches with no state of their own. The two waits in a cycle poll events
//! until the matching [`CycleSignals`] entry is set.

use core::future::Future;
use core::net::Ipv4Addr;

use embassy_time::{Duration, with_timeout};
use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::config::{Config, ConfigError};
use crate::error::{ErrorText, error_text};
use crate::events::{MqttEvent, NetworkEvent, QoS};
use crate::ledger::{Ledger, RetainedImage, Slot};
use crate::payload::render_timers;
use crate::platform::{Clock, Network, RetainedRegion, Session, Sleeper};
use crate::signals::CycleSignals;
use crate::store::{PersistentStore, StoreError, StoreInit, init_store};

/// Fatal failures. The firmware aborts on any of these.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("invalid configuration: {0}")]
    Config(ConfigError),
    #[error("persistent store init failed: {0}")]
    Store(StoreError),
    #[error("network start failed: {0}")]
    NetworkStart(ErrorText),
    #[error("messaging session open failed: {0}")]
    SessionOpen(ErrorText),
    #[error("messaging session close failed: {0}")]
    SessionClose(ErrorText),
    #[error("network teardown failed: {0}")]
    NetworkTeardown(ErrorText),
    #[error("arming wake timer failed: {0}")]
    ArmWakeup(ErrorText),
}

/// State for one wake cycle
pub struct BootCycle<'a, C, R>
where
    C: Clock,
    R: RetainedRegion,
{
    config: &'a Config<'a>,
    signals: &'a CycleSignals,
    clock: C,
    retained: R,
    /// Timestamps of this cycle
    ledger: Ledger,
    /// Timestamps of the previous cycle, published by this one
    previous: Ledger,
    cycle: u32,
}

impl<'a, C, R> BootCycle<'a, C, R>
where
    C: Clock,
    R: RetainedRegion,
{
    pub fn new(config: &'a Config<'a>, signals: &'a CycleSignals, clock: C, retained: R) -> Self {
        Self {
            config,
            signals,
            clock,
            retained,
            ledger: Ledger::zeroed(),
            previous: Ledger::zeroed(),
            cycle: 0,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn previous(&self) -> &Ledger {
        &self.previous
    }

    /// Wake count since the retained region was last valid
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn into_retained(self) -> R {
        self.retained
    }

    /// Run a whole cycle up to (not including) deep sleep
    ///
    /// Returns the armed sleep duration.
    pub async fn run<S, N, M, P>(
        &mut self,
        store: &mut S,
        mut network: N,
        mut session: M,
        sleeper: &mut P,
    ) -> Result<Duration, CycleError>
    where
        S: PersistentStore,
        N: Network,
        M: Session,
        P: Sleeper,
    {
        self.init_store(store)?;
        self.rotate_ledger();

        let session = match self.join_network(&mut network).await? {
            Some(_) => {
                if self.run_session(&mut session).await?.is_none() {
                    warn!(
                        "No publish acknowledgment within {:?}, giving up for this cycle",
                        self.config.wait_timeout()
                    );
                }
                Some(session)
            }
            None => {
                warn!(
                    "No address within {:?}, skipping MQTT for this cycle",
                    self.config.wait_timeout()
                );
                None
            }
        };

        self.shutdown(session, network).await?;
        self.arm_sleep(sleeper)
    }

    pub fn init_store<S: PersistentStore>(&mut self, store: &mut S) -> Result<StoreInit, CycleError> {
        init_store(store).map_err(CycleError::Store)
    }

    /// Move the retained ledger into `previous` and start a zeroed one
    pub fn rotate_ledger(&mut self) {
        let image = self.retained.load();
        if !image.is_valid() {
            info!("No retained ledger, starting from zero");
        }

        self.previous = image.ledger();
        self.cycle = image.cycle().wrapping_add(1);
        self.ledger.clear();
        self.signals.reset();
        self.checkpoint();

        info!("Wake cycle {}, previous ledger {:?}", self.cycle, self.previous.slots());
    }

    /// Start the station and wait for an address
    ///
    /// `Ok(None)` means the configured wait timeout expired.
    pub async fn join_network<N: Network>(
        &mut self,
        network: &mut N,
    ) -> Result<Option<Ipv4Addr>, CycleError> {
        self.record(Slot::StoreReady);

        info!("Starting Wi-Fi station, SSID: {}", self.config.wifi.ssid);
        network
            .start(&self.config.wifi)
            .await
            .map_err(|e| CycleError::NetworkStart(error_text(&e)))?;

        let timeout = self.config.wait_timeout();
        let joined = bounded(timeout, self.wait_joined(network)).await;

        if let Some(addr) = joined {
            self.record(Slot::NetworkJoined);
            info!("Wi-Fi station joined, address {}", addr);
        }
        Ok(joined)
    }

    /// Open the MQTT session and wait for the publish acknowledgment
    ///
    /// `Ok(None)` means the configured wait timeout expired.
    pub async fn run_session<M: Session>(
        &mut self,
        session: &mut M,
    ) -> Result<Option<u16>, CycleError> {
        let broker = self.config.broker().map_err(CycleError::Config)?;

        info!("Connecting to MQTT broker at {}:{}", broker.host, broker.port);
        session
            .open(&broker, self.config.client_id)
            .await
            .map_err(|e| CycleError::SessionOpen(error_text(&e)))?;

        let timeout = self.config.wait_timeout();
        Ok(bounded(timeout, self.wait_published(session)).await)
    }

    /// Close the session (if one was opened) and bring the station down
    pub async fn shutdown<M: Session, N: Network>(
        &mut self,
        session: Option<M>,
        mut network: N,
    ) -> Result<(), CycleError> {
        self.record(Slot::PreSleep);

        if let Some(session) = session {
            session
                .close()
                .await
                .map_err(|e| CycleError::SessionClose(error_text(&e)))?;
            debug!("MQTT session closed");
        }

        network
            .stop()
            .await
            .map_err(|e| CycleError::NetworkTeardown(error_text(&e)))?;
        network
            .deinit()
            .await
            .map_err(|e| CycleError::NetworkTeardown(error_text(&e)))?;
        debug!("Wi-Fi stopped");

        Ok(())
    }

    /// Arm the wake timer and commit the finished ledger
    pub fn arm_sleep<P: Sleeper>(&mut self, sleeper: &mut P) -> Result<Duration, CycleError> {
        let after = self.config.sleep_duration();
        sleeper
            .arm_timer_wakeup(after)
            .map_err(|e| CycleError::ArmWakeup(error_text(&e)))?;

        self.record(Slot::SleepArmed);
        self.checkpoint();

        info!(
            "Entering deep sleep for {} s, ledger {:?}",
            after.as_secs(),
            self.ledger.slots()
        );
        Ok(after)
    }

    /// Handle one network event
    pub async fn on_network_event<N: Network>(&self, event: NetworkEvent, network: &mut N) {
        match event {
            NetworkEvent::StationStarted => {
                if let Err(e) = network.connect().await {
                    warn!("Wi-Fi connect request failed: {:?}", e);
                }
            }
            NetworkEvent::Connected => {
                info!("Associated with access point");
            }
            NetworkEvent::GotIp(addr) => {
                info!("got ip:{}", addr);
                self.signals.reset_retries();
                self.signals.set_joined(addr);
            }
            NetworkEvent::Disconnected => {
                info!("Disconnected from access point");
            }
        }
    }

    /// Handle one messaging event
    pub async fn on_mqtt_event<M: Session>(&mut self, event: MqttEvent, session: &mut M) {
        match event {
            MqttEvent::Connected => {
                info!("MQTT connected");
                self.record(Slot::BrokerConnected);

                match session
                    .subscribe(self.config.subscribe_topic, QoS::AtLeastOnce)
                    .await
                {
                    Ok(msg_id) => info!("sent subscribe successful, msg_id={}", msg_id),
                    Err(e) => error!("subscribe to {} failed: {:?}", self.config.subscribe_topic, e),
                }
            }
            MqttEvent::Disconnected => {
                info!("MQTT disconnected");
            }
            MqttEvent::Subscribed { msg_id } => {
                info!("MQTT subscribed, msg_id={}", msg_id);
                self.record(Slot::Subscribed);
                self.publish_previous(session).await;
            }
            MqttEvent::Unsubscribed { msg_id } => {
                info!("MQTT unsubscribed, msg_id={}", msg_id);
            }
            MqttEvent::Published { msg_id } => {
                info!("MQTT published, msg_id={}", msg_id);
                self.record(Slot::Published);
                self.signals.set_published(msg_id);
            }
            MqttEvent::Data(message) => {
                info!(
                    "MQTT data TOPIC={} DATA={}",
                    message.topic,
                    core::str::from_utf8(&message.data).unwrap_or("<binary>")
                );
                if message.is_truncated() {
                    debug!("payload truncated from {} bytes", message.len);
                }
            }
            MqttEvent::Error(kind) => {
                warn!("MQTT error: {}", kind);
            }
            MqttEvent::Other(id) => {
                info!("Other MQTT event id:{}", id);
            }
        }
    }

    async fn publish_previous<M: Session>(&self, session: &mut M) {
        let payload = match render_timers(&self.previous) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Could not render timers payload: {}", e);
                return;
            }
        };

        match session
            .publish(self.config.publish_topic, payload.as_bytes(), QoS::AtLeastOnce)
            .await
        {
            Ok(msg_id) => info!("publishing {} to {}, msg_id={}", payload, self.config.publish_topic, msg_id),
            Err(e) => error!("publish to {} failed: {:?}", self.config.publish_topic, e),
        }
    }

    async fn wait_joined<N: Network>(&self, network: &mut N) -> Ipv4Addr {
        while !self.signals.is_joined() {
            let event = network.next_event().await;
            self.on_network_event(event, network).await;
        }
        self.signals.wait_joined().await
    }

    async fn wait_published<M: Session>(&mut self, session: &mut M) -> u16 {
        while !self.signals.is_published() {
            let event = session.next_event().await;
            self.on_mqtt_event(event, session).await;
        }
        self.signals.wait_published().await
    }

    fn record(&mut self, slot: Slot) {
        let now = self.clock.now_micros();
        self.ledger.record(slot, now);
        debug!("ledger[{}] {} = {} us", slot.index(), slot.label(), now);
    }

    fn checkpoint(&mut self) {
        self.retained
            .store(&RetainedImage::seal(self.cycle, &self.ledger));
    }
}

/// Await `fut`, giving up after `timeout` when one is set
async fn bounded<F: Future>(timeout: Option<Duration>, fut: F) -> Option<F::Output> {
    match timeout {
        Some(limit) => with_timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}
