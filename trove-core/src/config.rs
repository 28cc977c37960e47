use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_SITEMAP_URL: &str = "https://laam.pk/products-sitemap.xml";
const DEFAULT_API_GATEWAY: &str = "https://gateway.laam.pk/v1/products";
const DEFAULT_STORE_IDENTIFIER: &str = "laam.pk";
const DEFAULT_ORIGIN: &str = "https://laam.pk";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:142.0) Gecko/20100101 Firefox/142.0";
const DEFAULT_PRODUCTS_DIR: &str = "products";
const DEFAULT_MAX_PRODUCTS: usize = 1200;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_STORE_DIR: &str = "vector_store";
const DEFAULT_COLLECTION: &str = "products";
const DEFAULT_TOP_K: usize = 3;

/// File name of the collector's output inside the products directory.
pub const METADATA_FILE: &str = "products_metadata.json";
/// File name of the embedder's output inside the products directory.
pub const EMBEDDINGS_FILE: &str = "products_metadata_with_embeddings.json";

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_sitemap_url")]
    pub sitemap_url: String,
    #[serde(default = "default_api_gateway")]
    pub api_gateway: String,
    /// Sent as the `store-identifier` header; empty disables the header.
    #[serde(default = "default_store_identifier")]
    pub store_identifier: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_products_dir")]
    pub products_dir: String,
    #[serde(default = "default_max_products")]
    pub max_products: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            sitemap_url: default_sitemap_url(),
            api_gateway: default_api_gateway(),
            store_identifier: default_store_identifier(),
            origin: default_origin(),
            user_agent: default_user_agent(),
            products_dir: DEFAULT_PRODUCTS_DIR.to_string(),
            max_products: default_max_products(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl CrawlConfig {
    pub fn images_dir(&self) -> PathBuf {
        Path::new(&self.products_dir).join("images")
    }

    pub fn metadata_path(&self) -> PathBuf {
        Path::new(&self.products_dir).join(METADATA_FILE)
    }

    pub fn embeddings_path(&self) -> PathBuf {
        Path::new(&self.products_dir).join(EMBEDDINGS_FILE)
    }
}

fn default_sitemap_url() -> String {
    DEFAULT_SITEMAP_URL.to_string()
}

fn default_api_gateway() -> String {
    DEFAULT_API_GATEWAY.to_string()
}

fn default_store_identifier() -> String {
    DEFAULT_STORE_IDENTIFIER.to_string()
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_products_dir() -> String {
    DEFAULT_PRODUCTS_DIR.to_string()
}

fn default_max_products() -> usize {
    DEFAULT_MAX_PRODUCTS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Policy for products whose image is missing or unreadable at embed time.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingImagePolicy {
    /// Drop the record (the default).
    #[default]
    Skip,
    /// Substitute an all-zero image vector so the text half still indexes.
    Zero,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub missing_image: MissingImagePolicy,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_store_dir")]
    pub store_dir: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            collection: default_collection(),
        }
    }
}

fn default_store_dir() -> String {
    DEFAULT_STORE_DIR.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl Config {
    /// Load the config at `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file '{}': {e}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        let config: Config =
            toml::from_str(contents).map_err(|e| format!("invalid config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.crawl.max_products == 0 {
            return Err("invalid config: crawl.max_products must be at least 1".to_string());
        }
        if self.crawl.request_timeout_secs == 0 {
            return Err("invalid config: crawl.request_timeout_secs must be at least 1".to_string());
        }
        if self.query.top_k == 0 {
            return Err("invalid config: query.top_k must be at least 1".to_string());
        }
        for (key, value) in [
            ("crawl.sitemap_url", &self.crawl.sitemap_url),
            ("crawl.api_gateway", &self.crawl.api_gateway),
        ] {
            url::Url::parse(value)
                .map_err(|e| format!("invalid config: {key} is not a valid URL: {e}"))?;
        }
        if self.storage.collection.is_empty() {
            return Err("invalid config: storage.collection must not be empty".to_string());
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("Config should always be serializable to TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.crawl.sitemap_url, DEFAULT_SITEMAP_URL);
        assert_eq!(config.crawl.max_products, 1200);
        assert_eq!(config.storage.collection, "products");
        assert_eq!(config.query.top_k, 3);
        assert_eq!(config.embedding.missing_image, MissingImagePolicy::Skip);
    }

    #[test]
    fn custom_values_override_defaults() {
        let toml = r#"
[crawl]
sitemap_url = "https://shop.example/sitemap.xml"
api_gateway = "https://api.shop.example/products"
products_dir = "data"
max_products = 50

[storage]
store_dir = "db"
collection = "catalog"

[query]
top_k = 5
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.crawl.sitemap_url, "https://shop.example/sitemap.xml");
        assert_eq!(config.crawl.max_products, 50);
        assert_eq!(config.crawl.products_dir, "data");
        assert_eq!(config.storage.store_dir, "db");
        assert_eq!(config.storage.collection, "catalog");
        assert_eq!(config.query.top_k, 5);
    }

    #[test]
    fn zero_max_products_is_rejected() {
        let err = Config::parse("[crawl]\nmax_products = 0\n").unwrap_err();
        assert!(
            err.contains("max_products"),
            "error should mention max_products: {err}"
        );
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let err = Config::parse("[query]\ntop_k = 0\n").unwrap_err();
        assert!(err.contains("top_k"), "error should mention top_k: {err}");
    }

    #[test]
    fn bad_sitemap_url_is_rejected() {
        let err = Config::parse("[crawl]\nsitemap_url = \"not a url\"\n").unwrap_err();
        assert!(
            err.contains("sitemap_url"),
            "error should mention sitemap_url: {err}"
        );
    }

    #[test]
    fn missing_image_policy_parses_lowercase() {
        let config = Config::parse("[embedding]\nmissing_image = \"zero\"\n").unwrap();
        assert_eq!(config.embedding.missing_image, MissingImagePolicy::Zero);
    }

    #[test]
    fn derived_paths_live_under_products_dir() {
        let config = Config::default();
        assert_eq!(config.crawl.images_dir(), Path::new("products/images"));
        assert_eq!(
            config.crawl.metadata_path(),
            Path::new("products/products_metadata.json")
        );
        assert_eq!(
            config.crawl.embeddings_path(),
            Path::new("products/products_metadata_with_embeddings.json")
        );
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let config = Config::load(Path::new("/nonexistent/trove.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let parsed = Config::parse(&config.to_toml_string()).unwrap();
        assert_eq!(config, parsed);
    }
}
