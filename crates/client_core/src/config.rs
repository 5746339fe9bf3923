use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use url::Url;

use crate::alert::{AlertClearPolicy, DEFAULT_ALERT_DELAY};

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_url: String,
    pub realtime_url: Option<String>,
    pub token: Option<String>,
    pub alert_delay: Duration,
    pub alert_clear_policy: AlertClearPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:4000/api".into(),
            realtime_url: None,
            token: None,
            alert_delay: DEFAULT_ALERT_DELAY,
            alert_clear_policy: AlertClearPolicy::Unconditional,
        }
    }
}

impl ClientSettings {
    /// Websocket endpoint: the configured one, or the API origin with its
    /// scheme switched to ws/wss.
    pub fn realtime_url(&self) -> anyhow::Result<String> {
        match &self.realtime_url {
            Some(url) => Ok(url.clone()),
            None => derive_realtime_url(&self.api_url),
        }
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new("client.toml"), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(file) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("api_url") {
                settings.api_url = v.clone();
            }
            if let Some(v) = file_cfg.get("realtime_url") {
                settings.realtime_url = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("token") {
                settings.token = Some(v.clone());
            }
        }
    }

    if let Some(v) = env("UPTASK_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = env("UPTASK_REALTIME_URL") {
        settings.realtime_url = Some(v);
    }
    if let Some(v) = env("APP__REALTIME_URL") {
        settings.realtime_url = Some(v);
    }

    if let Some(v) = env("UPTASK_TOKEN") {
        settings.token = Some(v);
    }
    if let Some(v) = env("APP__TOKEN") {
        settings.token = Some(v);
    }

    if let Some(v) = env("APP__ALERT_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.alert_delay = Duration::from_millis(parsed);
        }
    }

    if let Some(v) = env("APP__ALERT_CLEAR_POLICY") {
        match v.trim().to_ascii_lowercase().as_str() {
            "unconditional" => settings.alert_clear_policy = AlertClearPolicy::Unconditional,
            "latest_only" => settings.alert_clear_policy = AlertClearPolicy::LatestOnly,
            _ => {}
        }
    }

    settings
}

fn derive_realtime_url(api_url: &str) -> anyhow::Result<String> {
    let mut url = Url::parse(api_url).with_context(|| format!("invalid api url: {api_url}"))?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(anyhow!("api url must be http:// or https://, got {other}://")),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot switch {api_url} to {scheme}"))?;
    url.set_path("/");
    url.set_query(None);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn derives_websocket_origin_from_api_url() {
        assert_eq!(
            derive_realtime_url("https://api.example.com/api").expect("derive"),
            "wss://api.example.com/"
        );
        assert_eq!(
            derive_realtime_url("http://127.0.0.1:4000/api").expect("derive"),
            "ws://127.0.0.1:4000/"
        );
        assert!(derive_realtime_url("ftp://example.com").is_err());
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let settings = load_settings_from(Path::new("/nonexistent/client.toml"), no_env);
        assert_eq!(settings, ClientSettings::default());
    }

    #[test]
    fn env_overrides_file_values() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("uptask_client_test_{suffix}.toml"));
        fs::write(
            &path,
            "api_url = \"http://file.example/api\"\ntoken = \"file-token\"\n",
        )
        .expect("write config");

        let settings = load_settings_from(&path, |key| match key {
            "APP__TOKEN" => Some("env-token".to_string()),
            "APP__ALERT_DELAY_MS" => Some("500".to_string()),
            "APP__ALERT_CLEAR_POLICY" => Some("latest_only".to_string()),
            _ => None,
        });

        assert_eq!(settings.api_url, "http://file.example/api");
        assert_eq!(settings.token.as_deref(), Some("env-token"));
        assert_eq!(settings.alert_delay, Duration::from_millis(500));
        assert_eq!(settings.alert_clear_policy, AlertClearPolicy::LatestOnly);
        assert_eq!(
            settings.realtime_url().expect("realtime"),
            "ws://file.example/"
        );

        fs::remove_file(path).expect("cleanup");
    }
}
