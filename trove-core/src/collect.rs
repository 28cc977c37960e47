use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, ORIGIN, USER_AGENT};
use scraper::Html;

use crate::config::CrawlConfig;
use crate::types::{ProductRecord, save_products};

/// Errors that abort the crawl outright. Per-product failures are logged
/// and skipped instead.
#[derive(Debug)]
pub enum CollectError {
    /// HTTP failure on a request the crawl cannot proceed without.
    Http(String),
    /// The sitemap could not be parsed.
    Sitemap(String),
    /// Local filesystem failure.
    Io(String),
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(msg) => write!(f, "http error: {msg}"),
            Self::Sitemap(msg) => write!(f, "sitemap error: {msg}"),
            Self::Io(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl std::error::Error for CollectError {}

/// One `<url>` element from the product sitemap.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub url: String,
    /// Image caption carried by the entry, empty when absent.
    pub caption: String,
}

/// Counters reported after a crawl.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CrawlSummary {
    pub collected: usize,
    pub skipped: usize,
    pub images_downloaded: usize,
    pub images_reused: usize,
}

/// Sequential sitemap crawler: fetches product detail JSON per sitemap
/// entry and downloads product images next to the metadata file.
pub struct Collector {
    client: reqwest::Client,
    config: CrawlConfig,
}

impl Collector {
    pub fn new(config: &CrawlConfig) -> Result<Self, CollectError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(&config.user_agent)?);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        if !config.store_identifier.is_empty() {
            headers.insert("store-identifier", header_value(&config.store_identifier)?);
        }
        if !config.origin.is_empty() {
            headers.insert(ORIGIN, header_value(&config.origin)?);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| CollectError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Crawl the sitemap and write `products_metadata.json`.
    ///
    /// A sitemap failure is fatal; everything downstream is per-product
    /// and logged-and-skipped. Images already on disk are reused, not
    /// re-downloaded.
    pub async fn run(&self, max_products: usize) -> Result<CrawlSummary, CollectError> {
        let sitemap = self.fetch_sitemap().await?;
        let entries = parse_sitemap(&sitemap)?;
        let total = entries.len().min(max_products);

        let images_dir = self.config.images_dir();
        std::fs::create_dir_all(&images_dir).map_err(|e| {
            CollectError::Io(format!("failed to create '{}': {e}", images_dir.display()))
        })?;

        let mut summary = CrawlSummary::default();
        let mut seen = HashSet::new();
        let mut products: Vec<ProductRecord> = Vec::new();

        for entry in entries {
            if products.len() >= max_products {
                break;
            }
            let Some(handle) = handle_from_url(&entry.url) else {
                continue;
            };
            if !seen.insert(handle.clone()) {
                continue;
            }

            println!("[{}/{total}] {handle}", products.len() + 1);

            let api_data = match self.fetch_product(&handle).await {
                Ok(data) => data,
                Err(e) => {
                    eprintln!("  skipping {handle}: {e}");
                    summary.skipped += 1;
                    continue;
                }
            };
            let Some(mut product) = product_from_api(&handle, &entry, &api_data) else {
                eprintln!("  skipping {handle}: empty or invalid API data");
                summary.skipped += 1;
                continue;
            };

            if let Some(image_url) = product.image_url.clone() {
                let dest = image_destination(&images_dir, &handle);
                if dest.exists() {
                    summary.images_reused += 1;
                    product.image_path = Some(dest.to_string_lossy().into_owned());
                } else {
                    match self.download_image(&image_url, &dest).await {
                        Ok(()) => {
                            summary.images_downloaded += 1;
                            product.image_path = Some(dest.to_string_lossy().into_owned());
                        }
                        Err(e) => {
                            eprintln!("  image download failed for {handle}: {e}");
                        }
                    }
                }
            }

            products.push(product);
        }

        let metadata_path = self.config.metadata_path();
        save_products(&metadata_path, &products).map_err(CollectError::Io)?;
        summary.collected = products.len();
        println!(
            "saved {} products to {}",
            products.len(),
            metadata_path.display()
        );
        Ok(summary)
    }

    async fn fetch_sitemap(&self) -> Result<String, CollectError> {
        let response = self
            .client
            .get(&self.config.sitemap_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollectError::Http(format!("sitemap request failed: {e}")))?;
        response
            .text()
            .await
            .map_err(|e| CollectError::Http(format!("failed to read sitemap body: {e}")))
    }

    async fn fetch_product(&self, handle: &str) -> Result<serde_json::Value, CollectError> {
        let url = format!("{}?handle={handle}", self.config.api_gateway);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollectError::Http(format!("product request failed: {e}")))?;
        response
            .json()
            .await
            .map_err(|e| CollectError::Http(format!("invalid product JSON: {e}")))
    }

    async fn download_image(&self, url: &str, dest: &Path) -> Result<(), CollectError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollectError::Http(format!("image request failed: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CollectError::Http(format!("failed to read image body: {e}")))?;
        std::fs::write(dest, &bytes)
            .map_err(|e| CollectError::Io(format!("failed to write '{}': {e}", dest.display())))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, CollectError> {
    HeaderValue::from_str(value)
        .map_err(|e| CollectError::Http(format!("invalid header value '{value}': {e}")))
}

/// Local path a product's image is downloaded to.
pub fn image_destination(images_dir: &Path, handle: &str) -> PathBuf {
    images_dir.join(format!("{handle}.jpg"))
}

/// Parse the product sitemap, extracting each URL and its image caption.
pub fn parse_sitemap(xml: &str) -> Result<Vec<SitemapEntry>, CollectError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| CollectError::Sitemap(format!("invalid sitemap XML: {e}")))?;

    let mut entries = Vec::new();
    for url_node in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "url")
    {
        let Some(loc) = url_node
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == "loc")
            .and_then(|n| n.text())
        else {
            continue;
        };
        let caption = url_node
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "caption")
            .and_then(|n| n.text())
            .unwrap_or("")
            .trim()
            .to_string();
        entries.push(SitemapEntry {
            url: loc.trim().to_string(),
            caption,
        });
    }
    Ok(entries)
}

/// Derive the product id slug from a `/products/` URL, stripping any
/// query string or fragment. Non-product URLs yield `None`.
pub fn handle_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/products/")?;
    let handle = rest.split(['?', '#', '/']).next().unwrap_or("");
    if handle.is_empty() {
        None
    } else {
        Some(handle.to_string())
    }
}

/// Strip HTML tags, zero-width characters, and excess whitespace from an
/// API description.
pub fn clean_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    let text = text.replace('\u{200b}', "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compose the full-text description the text encoder sees.
pub fn compose_description(
    title: &str,
    caption: &str,
    attributes: &BTreeMap<String, String>,
    details: &str,
) -> String {
    let attribute_summary = attributes
        .iter()
        .map(|(name, label)| format!("{name}: {label}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!("TITLE: {title}. CAPTION: {caption}. ATTRIBUTES: {attribute_summary}. DETAILS: {details}")
}

/// Build a product record from the API payload, or `None` when the
/// payload has no usable title.
pub fn product_from_api(
    handle: &str,
    entry: &SitemapEntry,
    api: &serde_json::Value,
) -> Option<ProductRecord> {
    let title = api
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    if title.is_empty() {
        return None;
    }

    let price = api.get("price").and_then(|v| v.as_f64());

    let tags = api
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|t| t.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    // The option block named "Size" carries the size variants.
    let sizes = api
        .get("options")
        .and_then(|v| v.as_array())
        .and_then(|options| {
            options
                .iter()
                .find(|o| o.get("name").and_then(|n| n.as_str()) == Some("Size"))
        })
        .and_then(|o| o.get("values"))
        .and_then(|v| v.as_array())
        .map(|values| {
            values
                .iter()
                .filter_map(|s| s.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut attributes = BTreeMap::new();
    if let Some(attrs) = api
        .get("attributed_description")
        .and_then(|v| v.as_object())
    {
        for (name, value) in attrs {
            if let Some(label) = value.get("label").and_then(|l| l.as_str()) {
                attributes.insert(name.clone(), label.to_string());
            }
        }
    }

    let details = clean_html(api.get("description").and_then(|v| v.as_str()).unwrap_or(""));
    let description = compose_description(&title, &entry.caption, &attributes, &details);

    let image_url = api
        .get("media")
        .and_then(|v| v.as_array())
        .and_then(|m| m.first())
        .and_then(|m| m.get("src"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Some(ProductRecord {
        id: handle.to_string(),
        title,
        price,
        caption: entry.caption.clone(),
        tags,
        sizes,
        attributes,
        description,
        image_url,
        image_path: None,
        source_url: entry.url.clone(),
    })
}
