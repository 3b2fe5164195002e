//! Gateway: runs the channels and feeds their messages to the dialog engine.
//!
//! Each owner gets a worker task with its own queue, so one owner's messages
//! are handled strictly in arrival order while different owners proceed in
//! parallel. Idle workers exit, leave the pool and are respawned on the next
//! message. A worker whose queue is full drops new messages for its owner
//! instead of holding up everyone else.

use crate::bus::MessageBus;
use crate::channel::ChannelManager;
use crate::channels::CliChannel;
use crate::channels::cli::CliChannelConfig;
use crate::config::BotConfig;
use crate::error::{BotError, Result};
use crate::events::InboundMessage;
use crate::goals::PlanProgressHook;
use crate::menu::{MainMenu, MenuAction};
use crate::storage::JsonFileRecordStore;
use crate::transport::BusTransport;
use needle::OwnerId;
use needle::engine::{DialogEngine, Outcome};
use needle::error::EngineResult;
use needle::store::RecordStore;
use needle::transport::Transport;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[cfg(feature = "telegram")]
use crate::channels::{TelegramChannel, telegram::TelegramChannelConfig};

/// How long the gateway waits for inbound messages before rechecking state.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Queue length of one owner's worker.
const WORKER_QUEUE: usize = 32;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bot configuration.
    pub bot_config: BotConfig,
    /// Whether to enable the CLI channel.
    pub enable_cli: bool,
    /// Whether to enable the Telegram channel (if configured).
    pub enable_telegram: bool,
    /// Idle time after which an owner's worker exits.
    pub worker_idle: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bot_config: BotConfig::default(),
            enable_cli: true,
            enable_telegram: true,
            worker_idle: Duration::from_secs(300),
        }
    }
}

// ============================================================================
// Event Processing
// ============================================================================

/// Result of processing one inbound message.
#[derive(Debug)]
pub enum Handled {
    /// The dialog engine took it.
    Dialog(Outcome),
    /// The main menu took it.
    Menu(MenuAction, Option<Outcome>),
}

/// Engine first, then the menu for whatever the engine leaves unhandled.
#[derive(Debug)]
pub struct EventProcessor {
    engine: DialogEngine,
    menu: MainMenu,
    transport: Arc<BusTransport>,
}

impl EventProcessor {
    /// Create a processor.
    #[must_use]
    pub fn new(engine: DialogEngine, transport: Arc<BusTransport>) -> Self {
        let menu = MainMenu::new(engine.router(), Arc::clone(&transport) as Arc<dyn Transport>);
        Self {
            engine,
            menu,
            transport,
        }
    }

    /// The dialog engine.
    #[must_use]
    pub const fn engine(&self) -> &DialogEngine {
        &self.engine
    }

    /// Handle one message.
    ///
    /// # Errors
    ///
    /// Fails when the session store fails.
    pub async fn process(&self, msg: &InboundMessage) -> EngineResult<Handled> {
        self.transport.remember(msg).await;
        let event = msg.to_event();

        let outcome = self.engine.handle(event.clone()).await?;
        if outcome.is_handled() {
            return Ok(Handled::Dialog(outcome));
        }
        let (action, outcome) = self.menu.respond(&event).await?;
        Ok(Handled::Menu(action, outcome))
    }
}

// ============================================================================
// Per-Owner Workers
// ============================================================================

struct Worker {
    tx: mpsc::Sender<InboundMessage>,
    handle: JoinHandle<()>,
}

/// What [`WorkerPool::dispatch`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    /// Queued for the owner's running worker.
    Queued,
    /// Handed to a newly started worker.
    Spawned,
    /// Dropped because the owner's queue was full.
    Dropped,
}

/// Routes messages to per-owner worker tasks.
struct WorkerPool {
    processor: Arc<EventProcessor>,
    idle: Duration,
    workers: HashMap<OwnerId, Worker>,
}

impl WorkerPool {
    fn new(processor: Arc<EventProcessor>, idle: Duration) -> Self {
        Self {
            processor,
            idle,
            workers: HashMap::new(),
        }
    }

    /// Queue `msg` for its owner without waiting on any worker.
    fn dispatch(&mut self, msg: InboundMessage) -> Dispatch {
        self.workers.retain(|_, worker| !worker.handle.is_finished());

        let owner = msg.owner;
        let msg = match self.workers.get(&owner) {
            Some(worker) => match worker.tx.try_send(msg) {
                Ok(()) => return Dispatch::Queued,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(owner = %owner, capacity = WORKER_QUEUE, "owner queue full, dropping message");
                    return Dispatch::Dropped;
                }
                Err(mpsc::error::TrySendError::Closed(msg)) => msg,
            },
            None => msg,
        };

        // The previous worker went idle and may still be draining its queue;
        // its successor waits for it so the owner's messages stay in order.
        let predecessor = self.workers.remove(&owner).map(|old| old.handle);
        let worker = self.spawn(owner, predecessor);
        if worker.tx.try_send(msg).is_err() {
            error!(owner = %owner, "new owner worker rejected a message");
        }
        self.workers.insert(owner, worker);
        Dispatch::Spawned
    }

    fn spawn(&self, owner: OwnerId, predecessor: Option<JoinHandle<()>>) -> Worker {
        let (tx, mut rx) = mpsc::channel::<InboundMessage>(WORKER_QUEUE);
        let processor = Arc::clone(&self.processor);
        let idle = self.idle;
        debug!(owner = %owner, "owner worker started");

        let handle = tokio::spawn(async move {
            if let Some(previous) = predecessor
                && let Err(e) = previous.await
            {
                warn!(owner = %owner, error = %e, "owner worker ended abnormally");
            }
            loop {
                match tokio::time::timeout(idle, rx.recv()).await {
                    Ok(Some(msg)) => handle_message(&processor, &msg).await,
                    Ok(None) => break,
                    Err(_) => {
                        rx.close();
                        while let Some(msg) = rx.recv().await {
                            handle_message(&processor, &msg).await;
                        }
                        break;
                    }
                }
            }
            debug!(owner = %owner, "owner worker stopped");
        });
        Worker { tx, handle }
    }

    fn len(&self) -> usize {
        self.workers.len()
    }

    async fn shutdown(self) {
        for (owner, worker) in self.workers {
            drop(worker.tx);
            if let Err(e) = worker.handle.await {
                warn!(owner = %owner, error = %e, "owner worker ended abnormally");
            }
        }
    }
}

async fn handle_message(processor: &EventProcessor, msg: &InboundMessage) {
    match processor.process(msg).await {
        Ok(handled) => debug!(owner = %msg.owner, ?handled, "message processed"),
        Err(e) => error!(owner = %msg.owner, error = %e, "failed to process message"),
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Runs the complete bot.
pub struct Gateway {
    config: GatewayConfig,
    bus: MessageBus,
    channel_manager: ChannelManager,
    processor: Arc<EventProcessor>,
    running: Arc<RwLock<bool>>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Get a reference to the message bus.
    #[must_use]
    pub const fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Get a reference to the channel manager.
    #[must_use]
    pub const fn channel_manager(&self) -> &ChannelManager {
        &self.channel_manager
    }

    /// The dialog engine.
    #[must_use]
    pub fn engine(&self) -> &DialogEngine {
        self.processor.engine()
    }

    /// Register channels based on configuration.
    async fn setup_channels(&self) {
        if self.config.enable_cli {
            let cli = &self.config.bot_config.cli;
            let cli_config = CliChannelConfig::new()
                .prompt(cli.prompt.clone())
                .owner(cli.owner_id);
            self.channel_manager
                .register(Arc::new(CliChannel::with_config(cli_config)))
                .await;
            info!("CLI channel enabled");
        }

        #[cfg(feature = "telegram")]
        if self.config.enable_telegram && self.config.bot_config.telegram.enabled {
            let telegram = &self.config.bot_config.telegram;
            if telegram.token.trim().is_empty() {
                error!("Telegram enabled but no token configured");
            } else {
                let tg_config = TelegramChannelConfig::new(telegram.token.clone())
                    .allow_users(telegram.allow_from.iter().copied());
                self.channel_manager
                    .register(Arc::new(TelegramChannel::new(tg_config)))
                    .await;
                info!("Telegram channel enabled");
            }
        }
    }

    /// Start the channels and process inbound messages until
    /// [`shutdown`](Self::shutdown) is called or the bus closes.
    ///
    /// # Errors
    ///
    /// Fails if no channel could be started.
    pub async fn run(&self) -> Result<()> {
        *self.running.write().await = true;
        info!("Gateway starting...");

        self.setup_channels().await;
        let results = self.channel_manager.start_all().await;
        if !results.is_empty() && results.iter().all(std::result::Result::is_err) {
            *self.running.write().await = false;
            return Err(BotError::internal("no channel could be started"));
        }

        let mut pool = WorkerPool::new(Arc::clone(&self.processor), self.config.worker_idle);
        info!("Gateway started");

        while *self.running.read().await {
            if let Some(msg) = self.bus.consume_inbound_timeout(POLL_INTERVAL).await {
                debug!(owner = %msg.owner, channel = %msg.channel, kind = msg.kind(), "inbound message");
                let dispatched = pool.dispatch(msg);
                debug!(?dispatched, workers = pool.len(), "dispatched");
            }
        }

        info!("Gateway stopping...");
        pool.shutdown().await;
        self.channel_manager.stop_all().await;
        info!("Gateway stopped");
        Ok(())
    }

    /// Ask a running gateway to stop after the current poll.
    pub async fn shutdown(&self) {
        *self.running.write().await = false;
    }

    /// Check if the gateway is running.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Get channel statuses.
    pub async fn status(&self) -> GatewayStatus {
        let channel_statuses = self.channel_manager.status_all().await;
        let bus_stats = self.bus.stats().await;

        GatewayStatus {
            running: *self.running.read().await,
            channels: channel_statuses
                .into_iter()
                .map(|s| ChannelStatusInfo {
                    name: s.name,
                    state: format!("{:?}", s.state),
                    messages_received: s.messages_received,
                    messages_sent: s.messages_sent,
                    healthy: s.healthy,
                })
                .collect(),
            total_inbound: bus_stats.inbound_count,
            total_outbound: bus_stats.outbound_count,
            active_sessions: self.engine().sessions().len().await.unwrap_or_default(),
        }
    }
}

/// Gateway status information.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GatewayStatus {
    /// Whether the gateway is running.
    pub running: bool,
    /// Channel statuses.
    pub channels: Vec<ChannelStatusInfo>,
    /// Total inbound messages processed.
    pub total_inbound: u64,
    /// Total outbound messages processed.
    pub total_outbound: u64,
    /// Dialogs in progress.
    pub active_sessions: usize,
}

/// Channel status info for gateway status.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChannelStatusInfo {
    /// Channel name.
    pub name: String,
    /// Channel state.
    pub state: String,
    /// Messages received.
    pub messages_received: u64,
    /// Messages sent.
    pub messages_sent: u64,
    /// Whether the channel is healthy.
    pub healthy: bool,
}

/// Builder for creating a Gateway.
#[derive(Default)]
pub struct GatewayBuilder {
    config: GatewayConfig,
    records: Option<Arc<dyn RecordStore>>,
}

impl std::fmt::Debug for GatewayBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GatewayBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bot configuration.
    #[must_use]
    pub fn bot_config(mut self, config: BotConfig) -> Self {
        self.config.bot_config = config;
        self
    }

    /// Enable or disable the CLI channel.
    #[must_use]
    pub const fn enable_cli(mut self, enable: bool) -> Self {
        self.config.enable_cli = enable;
        self
    }

    /// Enable or disable the Telegram channel.
    #[must_use]
    pub const fn enable_telegram(mut self, enable: bool) -> Self {
        self.config.enable_telegram = enable;
        self
    }

    /// Set the idle time after which owner workers exit.
    #[must_use]
    pub const fn worker_idle(mut self, idle: Duration) -> Self {
        self.config.worker_idle = idle;
        self
    }

    /// Use `records` instead of the JSON files in the configured data
    /// directory.
    #[must_use]
    pub fn records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Fails if the configured flow priority is invalid.
    pub fn build(self) -> Result<Gateway> {
        let dialog = &self.config.bot_config.dialog;
        let registry = dialog.registry()?;
        let records: Arc<dyn RecordStore> = match self.records {
            Some(records) => records,
            None => Arc::new(JsonFileRecordStore::new(
                self.config.bot_config.storage.resolved_dir(),
            )),
        };

        let bus = MessageBus::new();
        let transport = Arc::new(BusTransport::new(bus.clone()));
        let outbound = Arc::clone(&transport) as Arc<dyn Transport>;
        let hook = Arc::new(PlanProgressHook::new(
            Arc::clone(&records),
            Arc::clone(&outbound),
        ));
        let engine = DialogEngine::builder()
            .registry(registry)
            .records(records)
            .transport(outbound)
            .hook(hook)
            .config(dialog.engine_config())
            .build()?;

        Ok(Gateway {
            channel_manager: ChannelManager::new(bus.clone()),
            bus,
            processor: Arc::new(EventProcessor::new(engine, transport)),
            config: self.config,
            running: Arc::new(RwLock::new(false)),
        })
    }
}
