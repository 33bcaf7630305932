//! WebDriver session transport
//!
//! Starts and ends W3C/JSON-wire sessions on a hub over plain HTTP. Each
//! target gets its own session; capabilities are the merged target minus
//! the runner's own bookkeeping keys.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{Session, SessionHandle, SessionProvider};
use crate::common::{Error, Result};
use crate::integrator::target::{ENV_NAME_KEY, HUB_KEY, TARGET_NAME_KEY};
use crate::integrator::Target;

const USER_AGENT: &str = "integrator";

/// Provider creating one WebDriver session per target
pub struct WebDriverProvider {
    client: reqwest::Client,
}

impl WebDriverProvider {
    /// Build a provider whose HTTP requests give up after `request_timeout`
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

/// Capabilities sent for a target
pub fn capabilities(target: &Target) -> Map<String, Value> {
    target
        .config()
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), HUB_KEY | ENV_NAME_KEY | TARGET_NAME_KEY))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Pull the session id out of a new-session response (W3C or legacy shape)
fn session_id(body: &Value) -> Option<String> {
    body.pointer("/value/sessionId")
        .or_else(|| body.get("sessionId"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl SessionProvider for WebDriverProvider {
    async fn acquire(&self, target: &Target) -> Result<SessionHandle> {
        let hub = target
            .hub()
            .ok_or_else(|| Error::Config(format!("Target '{}' has no hub", target.target_name())))?
            .trim_end_matches('/')
            .to_string();
        let caps = Value::Object(capabilities(target));

        let response = self
            .client
            .post(format!("{}/session", hub))
            .json(&json!({
                "capabilities": { "alwaysMatch": caps },
                "desiredCapabilities": caps,
            }))
            .send()
            .await
            .map_err(|e| Error::session_start(&hub, &e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::session_start(
                &hub,
                &format!("hub returned status {}", response.status()),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::session_start(&hub, &format!("unreadable response: {}", e)))?;
        let id = session_id(&body)
            .ok_or_else(|| Error::session_start(&hub, "response carried no sessionId"))?;

        tracing::debug!(hub = %hub, session = %id, target = target.target_name(), "Session started");

        Ok(Arc::new(WebDriverSession {
            client: self.client.clone(),
            hub,
            id,
        }))
    }
}

/// A session living on a WebDriver hub
pub struct WebDriverSession {
    client: reqwest::Client,
    hub: String,
    id: String,
}

#[async_trait]
impl Session for WebDriverSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn quit(&self) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/session/{}", self.hub, self.id))
            .send()
            .await
            .map_err(|e| Error::SessionQuit {
                id: self.id.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::SessionQuit {
                id: self.id.clone(),
                message: format!("hub returned status {}", response.status()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::Environment;

    #[test]
    fn test_session_id_w3c_and_legacy() {
        assert_eq!(
            session_id(&json!({"value": {"sessionId": "abc"}})),
            Some("abc".to_string())
        );
        assert_eq!(session_id(&json!({"sessionId": "old"})), Some("old".to_string()));
        assert_eq!(session_id(&json!({"value": {}})), None);
    }

    #[test]
    fn test_capabilities_drop_bookkeeping_keys() {
        let env = Environment::builder("dev")
            .common(json!({"hub": "http://x"}))
            .target(json!({"browserName": "chrome"}))
            .build();
        let targets = crate::integrator::expand_targets(&Map::new(), &env);
        let caps = capabilities(&targets[0]);
        assert_eq!(caps.len(), 1);
        assert_eq!(caps.get("browserName"), Some(&json!("chrome")));
    }
}
