//! Wiring shared by the queue-driving commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pushcheck_core::traits::RequestStore;
use pushcheck_core::{
    Config, Error as CoreError, GitQueue, Job, JobProcessor, JsonFileStore, ProcessorSettings,
    PushRequest, RequestId,
};
use pushcheck_git::Mirror;
use pushcheck_notify::{Links, MessageFormatter, MessageNotifier, Outbox, WebhookClient};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::DataFiles;

type Notifier = MessageNotifier<Arc<Outbox>, Arc<Outbox>, WebhookClient>;
type Processor = JobProcessor<Arc<JsonFileStore>, Mirror, Notifier>;

/// A running queue worker together with the store it updates.
pub struct Services {
    runtime: Runtime,
    queue: GitQueue,
    store: Arc<JsonFileStore>,
    outbox: Arc<Outbox>,
}

impl Services {
    /// Load the configuration, open the store and outbox, and start the
    /// queue worker.
    pub fn start(config_path: &Path, files: &DataFiles) -> Result<Self> {
        let config = Config::load(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?;
        let store = Arc::new(
            JsonFileStore::open(&files.store)
                .with_context(|| format!("Failed to open store {}", files.store.display()))?,
        );
        let outbox = Arc::new(Outbox::new(&files.outbox, &config.mail.default_domain));

        let runtime = Runtime::new().context("Failed to start async runtime")?;

        let webhooks = config
            .web_hooks
            .post_url
            .as_deref()
            .map(|url| WebhookClient::new(url, config.web_hooks.timeout(), runtime.handle().clone()))
            .transpose()
            .context("Failed to build web hook client")?;
        if webhooks.is_none() {
            debug!("web hooks disabled");
        }

        let formatter = MessageFormatter::new(Links::from_config(&config))
            .context("Failed to compile message templates")?;
        let notifier = MessageNotifier::new(
            formatter,
            Arc::clone(&outbox),
            Arc::clone(&outbox),
            webhooks,
        );

        let queue = GitQueue::new(config.queue.throttle());
        let processor: Arc<Processor> = Arc::new(JobProcessor::new(
            Arc::clone(&store),
            Mirror::new(config.mirror_config()),
            notifier,
            queue.sender(),
            ProcessorSettings {
                excluded_tags: config.excluded_tags(),
                sha_cache_limit: config.queue.sha_cache_limit,
            },
        ));

        {
            let _guard = runtime.enter();
            queue.start_worker(processor);
        }
        info!(store = %files.store.display(), outbox = %files.outbox.display(), "pushcheck ready");

        Ok(Self {
            runtime,
            queue,
            store,
            outbox,
        })
    }

    pub fn enqueue(&self, job: Job) {
        self.queue.enqueue(job);
    }

    /// Block until the queue has nothing left to do.
    pub fn wait_idle(&self) {
        self.runtime.block_on(self.queue.wait_idle());
    }

    pub fn store(&self) -> &JsonFileStore {
        &self.store
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Fetch a request that must exist.
    pub fn request(&self, id: RequestId) -> Result<PushRequest> {
        self.store
            .get_request(id)?
            .ok_or_else(|| CoreError::RequestNotFound(id).into())
    }
}
