//! HTTP client for the HomeyPro local Web API
//!
//! Authenticates with a bearer token. Collection endpoints answer with an
//! object keyed by id; results are returned sorted by `(name, id)` so
//! paginated views stay stable between calls.

use crate::client::{Device, Flow, FlowFolder, HomeyClient, InsightsQuery, SystemConfig, Zone};
use crate::config::HubConfig;
use crate::error::{HomeyError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, ClientBuilder, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

const DEVICES: &str = "api/manager/devices/device/";
const ZONES: &str = "api/manager/zones/zone/";
const FLOWS: &str = "api/manager/flow/flow/";
const ADVANCED_FLOWS: &str = "api/manager/flow/advancedflow/";
const FLOW_FOLDERS: &str = "api/manager/flow/flowfolder/";
const SYSTEM: &str = "api/manager/system/";
const INSIGHTS: &str = "api/manager/insights/log/";

/// HTTP client for a HomeyPro hub
pub struct HomeyHttpClient {
    client: Client,
    base_url: Url,
}

impl HomeyHttpClient {
    /// Create a new HTTP client
    pub fn new(config: &HubConfig) -> Result<Self> {
        let base_url = config
            .api_url
            .clone()
            .ok_or_else(|| HomeyError::config("HOMEY_API_URL environment variable is required"))?;

        let mut client_builder = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(format!("homey-mcp-rust/{}", env!("CARGO_PKG_VERSION")));

        if !config.verify_ssl {
            warn!("SSL verification disabled - this is insecure for production use");
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let mut default_headers = HeaderMap::new();
        let header_value = HeaderValue::from_str(&format!("Bearer {}", config.api_token.trim()))
            .map_err(|e| HomeyError::invalid_input(format!("Invalid authorization header: {e}")))?;
        default_headers.insert(AUTHORIZATION, header_value);
        client_builder = client_builder.default_headers(default_headers);

        let client = client_builder
            .build()
            .map_err(|e| HomeyError::connection(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Build URL for API endpoint
    fn build_url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| HomeyError::invalid_input(format!("Invalid URL path {path}: {e}")))
    }

    fn item_path(collection: &str, id: &str) -> String {
        format!("{collection}{}", urlencoding::encode(id))
    }

    fn insights_path(device_id: &str, query: &InsightsQuery) -> String {
        let mut path = format!(
            "{INSIGHTS}homey:device:{}/{}/entry?resolution={}",
            urlencoding::encode(device_id),
            urlencoding::encode(&query.capability),
            query.resolution.as_str()
        );
        if let Some(from) = query.from_timestamp {
            path.push_str(&format!("&from={from}"));
        }
        if let Some(to) = query.to_timestamp {
            path.push_str(&format!("&to={to}"));
        }
        path
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response> {
        let url = self.build_url(path)?;
        debug!("HTTP {} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let response_text = response.text().await.unwrap_or_default();
        let error_msg = format!("HTTP error {status}: {response_text}");
        Err(match status.as_u16() {
            401 => HomeyError::authentication(error_msg),
            403 => HomeyError::authentication("Access denied"),
            404 => HomeyError::not_found(format!("{path}: {response_text}")),
            408 | 504 => HomeyError::timeout(error_msg),
            502 | 503 => HomeyError::connection(error_msg),
            500..=599 => HomeyError::external_service(error_msg),
            _ => HomeyError::external_service(error_msg),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(Method::GET, path, None).await?;
        let text = response.text().await.map_err(map_transport_error)?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_collection<T, K>(&self, path: &str, sort_key: K) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        K: Fn(&T) -> (String, String),
    {
        let by_id: HashMap<String, T> = self.get_json(path).await?;
        let mut items: Vec<T> = by_id.into_values().collect();
        items.sort_by_cached_key(|item| sort_key(item));
        Ok(items)
    }

    async fn mutate(&self, method: Method, path: &str, body: Option<Value>) -> Result<bool> {
        self.send(method, path, body).await?;
        Ok(true)
    }
}

/// Map a reqwest transport failure to the connectivity taxonomy
fn map_transport_error(e: reqwest::Error) -> HomeyError {
    let error_msg = format!("HTTP request failed: {e}");
    if e.is_timeout() {
        HomeyError::timeout(error_msg)
    } else if e.is_connect() {
        HomeyError::connection(error_msg)
    } else {
        HomeyError::Http(e)
    }
}

#[async_trait]
impl HomeyClient for HomeyHttpClient {
    async fn get_devices(&self) -> Result<Vec<Device>> {
        self.get_collection(DEVICES, |d: &Device| (d.name.clone(), d.id.clone()))
            .await
    }

    async fn get_device(&self, device_id: &str) -> Result<Device> {
        self.get_json(&Self::item_path(DEVICES, device_id)).await
    }

    async fn set_capability_value(
        &self,
        device_id: &str,
        capability: &str,
        value: Value,
    ) -> Result<bool> {
        let path = format!(
            "{}/capability/{}",
            Self::item_path(DEVICES, device_id),
            urlencoding::encode(capability)
        );
        self.mutate(Method::PUT, &path, Some(json!({ "value": value })))
            .await
    }

    async fn get_device_insights(&self, device_id: &str, query: &InsightsQuery) -> Result<Value> {
        self.get_json(&Self::insights_path(device_id, query)).await
    }

    async fn get_zones(&self) -> Result<Vec<Zone>> {
        self.get_collection(ZONES, |z: &Zone| (z.name.clone(), z.id.clone()))
            .await
    }

    async fn get_flows(&self) -> Result<Vec<Flow>> {
        self.get_collection(FLOWS, |f: &Flow| (f.name.clone(), f.id.clone()))
            .await
    }

    async fn get_flow(&self, flow_id: &str) -> Result<Flow> {
        self.get_json(&Self::item_path(FLOWS, flow_id)).await
    }

    async fn trigger_flow(&self, flow_id: &str) -> Result<bool> {
        let path = format!("{}/trigger", Self::item_path(FLOWS, flow_id));
        self.mutate(Method::POST, &path, None).await
    }

    async fn set_flow_enabled(&self, flow_id: &str, enabled: bool) -> Result<bool> {
        let path = Self::item_path(FLOWS, flow_id);
        self.mutate(Method::PUT, &path, Some(json!({ "flow": { "enabled": enabled } })))
            .await
    }

    async fn get_advanced_flows(&self) -> Result<Vec<Flow>> {
        self.get_collection(ADVANCED_FLOWS, |f: &Flow| (f.name.clone(), f.id.clone()))
            .await
    }

    async fn get_advanced_flow(&self, flow_id: &str) -> Result<Flow> {
        self.get_json(&Self::item_path(ADVANCED_FLOWS, flow_id))
            .await
    }

    async fn trigger_advanced_flow(&self, flow_id: &str) -> Result<bool> {
        let path = format!("{}/trigger", Self::item_path(ADVANCED_FLOWS, flow_id));
        self.mutate(Method::POST, &path, None).await
    }

    async fn set_advanced_flow_enabled(&self, flow_id: &str, enabled: bool) -> Result<bool> {
        let path = Self::item_path(ADVANCED_FLOWS, flow_id);
        self.mutate(
            Method::PUT,
            &path,
            Some(json!({ "advancedflow": { "enabled": enabled } })),
        )
        .await
    }

    async fn get_flow_folders(&self) -> Result<Vec<FlowFolder>> {
        self.get_collection(FLOW_FOLDERS, |f: &FlowFolder| (f.name.clone(), f.id.clone()))
            .await
    }

    async fn get_system_config(&self) -> Result<SystemConfig> {
        self.get_json(SYSTEM).await
    }

    async fn disconnect(&self) -> Result<()> {
        // Plain HTTP; nothing is held open beyond the connection pool
        debug!("Disconnecting from {}", self.base_url);
        Ok(())
    }
}
