use std::sync::Arc;

use crate::config::Config;
use crate::services::dune::DuneClient;

#[derive(Clone)]
pub struct AppState {
    pub dune: Arc<DuneClient>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let dune = DuneClient::new(&config.dune_api_url, config.dune_api_key.clone())?;
        Ok(Self {
            dune: Arc::new(dune),
            config: Arc::new(config),
        })
    }
}
