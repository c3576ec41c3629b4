use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::AppConfig;
use crate::server::services::relay_services::RelayService;
use crate::server::services::storyboard_services::StoryboardService;
use crate::server::services::twitch_gql_services::{TwitchGqlService, UPSTREAM_TIMEOUT_SECS};

use super::{
    relay_services::DynRelayService, storyboard_services::DynStoryboardService,
    twitch_gql_services::DynTwitchGqlService,
};

/// edge services, all stateless. One shared http client with a bounded timeout feeds every
/// upstream call
#[derive(Clone)]
pub struct EdgeServices {
    pub twitch: DynTwitchGqlService,
    pub storyboard: DynStoryboardService,
    pub relay: DynRelayService,
    pub http: reqwest::Client,
    pub config: Arc<AppConfig>,
}

impl EdgeServices {
    pub fn new(config: Arc<AppConfig>) -> Self {
        info!("starting edge services (stateless, no database)...");

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        // the relay streams whole segments so it only gets a connect timeout, a total request
        // timeout would cut long transfers off mid-body
        let relay_http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let twitch = Arc::new(TwitchGqlService::new(http.clone())) as DynTwitchGqlService;
        let storyboard = Arc::new(StoryboardService::new(http.clone())) as DynStoryboardService;
        let relay = Arc::new(RelayService::new(relay_http)) as DynRelayService;

        Self {
            twitch,
            storyboard,
            relay,
            http,
            config,
        }
    }
}
