//! # Service Container
//!
//! Builds the delivery services in dependency order:
//!
//! ```text
//! 1. directory + access policy       (no dependencies)
//! 2. polling channel                 (access)
//! 3. router                          (directory, access, polling)
//! 4. group fan-out                   (directory, access, router)
//! 5. router.attach_fanout            (closes the loop weakly)
//! ```

use cse_01_polling_channel::{cleanup_task, PollingChannelService};
use cse_02_group_fanout::GroupFanOutService;
use parking_lot::Mutex;
use shared_types::{AccessControlGate, M2mRequest, M2mResponse, Originator, Permission, ResourceId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::adapters::{CseRouter, InMemoryDirectory, StaticAccessPolicy};
use crate::container::config::CseConfig;

/// All delivery services of one CSE.
pub struct DeliveryContainer {
    pub config: CseConfig,
    pub directory: Arc<InMemoryDirectory>,
    pub access: Arc<StaticAccessPolicy>,
    pub polling: Arc<PollingChannelService>,
    pub fanout: Arc<GroupFanOutService>,
    pub router: Arc<CseRouter>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DeliveryContainer {
    #[instrument(name = "container_init", skip(config), fields(cse_id = %config.cse_id))]
    pub fn new(config: CseConfig) -> Self {
        info!("Initializing delivery container");

        let directory = Arc::new(InMemoryDirectory::new());
        let access = Arc::new(if config.allow_all_access {
            StaticAccessPolicy::allow_all()
        } else {
            StaticAccessPolicy::new()
        });
        let gate: Arc<dyn AccessControlGate> = access.clone();

        let polling = Arc::new(PollingChannelService::new(
            config.polling.clone(),
            gate.clone(),
        ));
        info!(
            max_poll_wait_ms = config.polling.max_poll_wait_ms,
            mailbox_capacity = config.polling.mailbox_capacity,
            "Polling channel initialized"
        );

        let router = Arc::new(CseRouter::new(
            Originator::new(config.cse_id.clone()),
            directory.clone(),
            gate.clone(),
            polling.clone(),
        ));

        let fanout = Arc::new(GroupFanOutService::new(
            config.fanout.clone(),
            directory.clone(),
            gate,
            router.clone(),
        ));
        router.attach_fanout(&fanout);
        info!(
            job_timeout_ms = config.fanout.job_timeout_ms,
            max_depth = config.fanout.max_depth,
            workers = config.fanout.max_concurrent_dispatches,
            "Group fan-out initialized"
        );

        Self {
            config,
            directory,
            access,
            polling,
            fanout,
            router,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn for_testing() -> Self {
        Self::new(CseConfig::for_testing())
    }

    /// Register an application entity. Its originator gets full rights on
    /// everything below it, including NOTIFY on its own polling channel.
    pub fn register_entity(
        &self,
        id: impl Into<ResourceId>,
        originator: Originator,
        reachable: bool,
    ) {
        let id = id.into();
        self.access
            .grant(originator.clone(), id.clone(), Permission::ALL);
        info!(entity = %id, originator = %originator, reachable = reachable, "Registered entity");
        self.directory.add_entity(id, originator, reachable);
    }

    /// Route one request and return its response, failures included.
    pub async fn handle(&self, request: M2mRequest) -> M2mResponse {
        self.router.handle(request).await
    }

    /// Spawn the polling channel sweeper.
    pub fn start_background_tasks(&self) {
        let interval = self.config.polling.sweep_interval();
        let handle = tokio::spawn(cleanup_task(self.polling.clone(), interval));
        self.tasks.lock().push(handle);
        info!(interval_ms = interval.as_millis() as u64, "Started polling sweeper");
    }

    /// Number of running background tasks.
    pub fn background_tasks(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.is_finished()).count()
    }

    /// Stop background tasks.
    pub async fn shutdown(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
        info!("Delivery container stopped");
    }
}
