use std::time::Duration;

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::domain::web_domain::DEFAULT_ORIGIN_TEMPLATE;
use crate::services::{
    DiscoveryConfig, OrchestratorConfig, DEFAULT_SEARCH_URL, DEFAULT_USER_AGENT, PAGE_DELAY,
    PAGE_TIMEOUT,
};

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub scraper: ScraperSettings,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default)]
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = match self.require_ssl {
            true => PgSslMode::Require,
            false => PgSslMode::Prefer,
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(&self.password)
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

fn default_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    PAGE_TIMEOUT.as_secs()
}

fn default_page_delay_millis() -> u64 {
    PAGE_DELAY.as_millis() as u64
}

fn default_origin_template() -> String {
    DEFAULT_ORIGIN_TEMPLATE.to_string()
}

#[derive(Deserialize, Clone)]
pub struct ScraperSettings {
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(
        default = "default_timeout_secs",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub request_timeout_secs: u64,
    #[serde(
        default = "default_timeout_secs",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub search_timeout_secs: u64,
    #[serde(
        default = "default_page_delay_millis",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub page_delay_millis: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub concurrency: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_search_results: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub domain_budget: usize,
    pub enable_privacy_crawl: bool,
    pub privacy_paths: Vec<String>,
    #[serde(default = "default_origin_template")]
    pub origin_template: String,
}

impl ScraperSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            page_delay: Duration::from_millis(self.page_delay_millis),
            concurrency: self.concurrency,
            max_search_results: self.max_search_results,
            enable_privacy_crawl: self.enable_privacy_crawl,
            privacy_paths: self.privacy_paths.clone(),
            origin_template: self.origin_template.clone(),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path =
        std::env::current_dir().map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let configuration_directory = base_path.join("configuration");

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scraper_settings_fall_back_to_defaults() {
        let yaml = r#"
            concurrency: "2"
            max_search_results: 20
            domain_budget: 50
            enable_privacy_crawl: false
            privacy_paths: ["/datenschutz"]
        "#;

        let settings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<ScraperSettings>()
            .unwrap();

        assert_eq!(settings.search_url, DEFAULT_SEARCH_URL);
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(settings.request_timeout(), PAGE_TIMEOUT);
        assert_eq!(settings.search_timeout(), PAGE_TIMEOUT);
        assert_eq!(settings.concurrency, 2);

        let config = settings.orchestrator_config();
        assert_eq!(config.page_delay, PAGE_DELAY);
        assert_eq!(config.origin_template, DEFAULT_ORIGIN_TEMPLATE);
    }
}
