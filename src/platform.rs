//! Consumer-facing surface of the bridge
//!
//! [`ShadesPlatform`] wraps the API client with the shade and group list
//! caches, the accessory registry that receives position updates, and the
//! activity clock that drives the adaptive poller.

pub mod accessory;
pub mod cache;
pub mod scheduler;

pub use accessory::{PositionListener, PositionState, PositionUpdate, group_key, shade_key};
pub use cache::ListCache;
pub use scheduler::{ActivityClock, PollIntervals, PollScheduler, PollTarget};

use crate::api::client::ApiClient;
use crate::api::types::{EntityId, Group, Shade};
use crate::config::Config;
use crate::error::Result;
use crate::logging::{LogContext, StructuredLogger, get_logger, get_logger_with_context};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Outcome of the startup listing
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub shades: Vec<Shade>,
    /// Exposed groups only
    pub groups: Vec<Group>,
    /// One message per phase that failed
    pub failures: Vec<String>,
}

pub struct ShadesPlatform {
    client: Arc<ApiClient>,
    shades: Mutex<ListCache<Shade>>,
    groups: Mutex<ListCache<Group>>,
    expose_groups: Vec<String>,
    intervals: PollIntervals,
    activity: Arc<ActivityClock>,
    accessories: RwLock<HashMap<String, Arc<dyn PositionListener>>>,
    logger: StructuredLogger,
}

impl std::fmt::Debug for ShadesPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadesPlatform")
            .field("expose_groups", &self.expose_groups)
            .field("intervals", &self.intervals)
            .finish_non_exhaustive()
    }
}

impl ShadesPlatform {
    pub fn new(client: Arc<ApiClient>, config: &Config) -> Self {
        Self {
            client,
            shades: Mutex::new(ListCache::new(config.polling.shade_list_ttl())),
            groups: Mutex::new(ListCache::new(config.polling.group_list_ttl())),
            expose_groups: config
                .expose_groups
                .iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            intervals: config.polling.intervals(),
            activity: Arc::new(ActivityClock::new()),
            accessories: RwLock::new(HashMap::new()),
            logger: get_logger("platform"),
        }
    }

    /// Build the client and platform from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Arc::new(ApiClient::new(config)?);
        Ok(Self::new(client, config))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn activity(&self) -> Arc<ActivityClock> {
        Arc::clone(&self.activity)
    }

    pub fn intervals(&self) -> PollIntervals {
        self.intervals
    }

    /// Spawn the poller for this platform
    pub fn start_polling(self: &Arc<Self>) -> PollScheduler {
        let target: Arc<dyn PollTarget> = Arc::clone(self) as Arc<dyn PollTarget>;
        PollScheduler::start(target, self.activity(), self.intervals)
    }

    /// Shade list, from cache unless stale or `force` is set
    pub async fn get_shades(&self, force: bool) -> Result<Vec<Shade>> {
        if !force {
            let cache = self.shades.lock().await;
            if cache.is_fresh() {
                return Ok(cache.entries().to_vec());
            }
        }
        let shades = self.client.get_shades().await?;
        self.logger.debug(&format!("Fetched {} shade(s)", shades.len()));
        self.shades.lock().await.store(shades.clone());
        Ok(shades)
    }

    /// Group list, from cache unless stale or `force` is set
    pub async fn get_groups(&self, force: bool) -> Result<Vec<Group>> {
        if !force {
            let cache = self.groups.lock().await;
            if cache.is_fresh() {
                return Ok(cache.entries().to_vec());
            }
        }
        let groups = self.client.get_groups().await?;
        self.logger.debug(&format!("Fetched {} group(s)", groups.len()));
        self.groups.lock().await.store(groups.clone());
        Ok(groups)
    }

    /// Last fetched shades without touching the network
    pub async fn cached_shades(&self) -> Vec<Shade> {
        self.shades.lock().await.entries().to_vec()
    }

    /// Move a shade and switch polling to the fast cadence.
    ///
    /// Success means the command was accepted, not that the shade arrived.
    pub async fn move_shade(&self, shade_name: &str, percentage: i64) -> Result<Option<Value>> {
        let logger = self.entity_logger(shade_name);
        match self.client.move_shade(shade_name, percentage).await {
            Ok(body) => {
                self.activity.record_activity();
                logger.debug("Move accepted, polling fast");
                Ok(body)
            }
            Err(e) => {
                logger.warn(&format!("Move rejected: {}", e));
                Err(e)
            }
        }
    }

    /// Move a group and switch polling to the fast cadence
    pub async fn move_group(&self, group_id: &EntityId, percentage: i64) -> Result<Option<Value>> {
        let logger = self.entity_logger(&group_key(group_id));
        match self.client.move_group(group_id, percentage).await {
            Ok(body) => {
                self.activity.record_activity();
                logger.debug("Move accepted, polling fast");
                Ok(body)
            }
            Err(e) => {
                logger.warn(&format!("Move rejected: {}", e));
                Err(e)
            }
        }
    }

    fn entity_logger(&self, entity: &str) -> StructuredLogger {
        get_logger_with_context(LogContext::new(self.logger.component()).with_entity(entity))
    }

    /// Cached position of one shade
    pub async fn shade_position(&self, id: &EntityId) -> Option<u8> {
        self.shades
            .lock()
            .await
            .entries()
            .iter()
            .find(|s| &s.id == id)
            .and_then(Shade::position)
    }

    /// Derived position of a group over the cached shades
    pub async fn group_position(&self, group: &Group) -> Option<u8> {
        group.average_position(self.shades.lock().await.entries())
    }

    /// Groups whose name is listed in `expose_groups`, in list order of `groups`
    pub fn exposed_groups(&self, groups: &[Group]) -> Vec<Group> {
        groups
            .iter()
            .filter(|g| self.expose_groups.iter().any(|name| name == g.name.trim()))
            .cloned()
            .collect()
    }

    pub async fn register_accessory(&self, key: String, listener: Arc<dyn PositionListener>) {
        self.logger.debug(&format!("Registered accessory {}", key));
        self.accessories.write().await.insert(key, listener);
    }

    pub async fn unregister_accessory(&self, key: &str) -> bool {
        self.accessories.write().await.remove(key).is_some()
    }

    pub async fn accessory_count(&self) -> usize {
        self.accessories.read().await.len()
    }

    /// Startup listing. Each phase logs its own failure and does not abort
    /// the other.
    pub async fn discover(&self) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        match self.get_shades(true).await {
            Ok(shades) => {
                self.logger.info(&format!("Discovered {} shade(s)", shades.len()));
                report.shades = shades;
            }
            Err(e) => {
                self.logger.error(&format!("Shade discovery failed: {}", e));
                report.failures.push(format!("shades: {e}"));
            }
        }

        if self.expose_groups.is_empty() {
            return report;
        }

        match self.get_groups(true).await {
            Ok(groups) => {
                let exposed = self.exposed_groups(&groups);
                for name in &self.expose_groups {
                    if !exposed.iter().any(|g| g.name.trim() == name) {
                        self.logger.warn(&format!("Configured group '{}' not found", name));
                    }
                }
                self.logger.info(&format!("Exposing {} group(s)", exposed.len()));
                report.groups = exposed;
            }
            Err(e) => {
                self.logger.error(&format!("Group discovery failed: {}", e));
                report.failures.push(format!("groups: {e}"));
            }
        }
        report
    }

    async fn push_shade_updates(&self, shades: &[Shade]) -> usize {
        let accessories = self.accessories.read().await;
        let mut pushed = 0;
        for shade in shades {
            let key = shade_key(&shade.id);
            let (Some(listener), Some(position)) = (accessories.get(&key), shade.position())
            else {
                continue;
            };
            let update = PositionUpdate::settled(key, shade.name.clone(), position);
            listener.position_changed(&update);
            pushed += 1;
        }
        pushed
    }

    async fn push_group_updates(&self, groups: &[Group], shades: &[Shade]) -> usize {
        let accessories = self.accessories.read().await;
        let mut pushed = 0;
        for group in groups {
            let key = group_key(&group.id);
            let (Some(listener), Some(position)) =
                (accessories.get(&key), group.average_position(shades))
            else {
                continue;
            };
            let update = PositionUpdate::settled(key, group.name.clone(), position);
            listener.position_changed(&update);
            pushed += 1;
        }
        pushed
    }
}

#[async_trait]
impl PollTarget for ShadesPlatform {
    /// Shade updates go out before the group list is fetched, so a failing
    /// group endpoint only leaves the group accessories stale.
    async fn poll_once(&self) -> Result<()> {
        let shades = self.get_shades(false).await?;
        let mut pushed = self.push_shade_updates(&shades).await;

        if !self.expose_groups.is_empty() {
            let all = self.get_groups(false).await?;
            let groups = self.exposed_groups(&all);
            pushed += self.push_group_updates(&groups, &shades).await;
        }

        self.logger.trace(&format!("Poll tick pushed {} update(s)", pushed));
        Ok(())
    }
}
