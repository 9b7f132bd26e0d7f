//! Connection parameters for the external platform

use serde::{Deserialize, Serialize};

/// Where and as whom to reach the external platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Platform base URL
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Administrative account used for the session handle
    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Backing database URL, when the platform is reached through it
    #[serde(default)]
    pub database_url: String,

    #[serde(default)]
    pub database_username: String,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            username: default_username(),
            password: String::new(),
            database_url: String::new(),
            database_username: String::new(),
        }
    }
}

impl ConnectionParams {
    /// Host part of the database URL, or "unknown"
    pub fn database_host(&self) -> &str {
        self.database_url
            .split("//")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .and_then(|authority| authority.rsplit('@').next())
            .and_then(|host_port| host_port.split(':').next())
            .filter(|host| !host.is_empty())
            .unwrap_or("unknown")
    }

    /// `user@host` summary for logs
    pub fn database_summary(&self) -> String {
        format!("{}@{}", self.database_username, self.database_host())
    }
}

fn default_server_url() -> String {
    "http://localhost:8080/identityiq".to_string()
}

fn default_username() -> String {
    "spadmin".to_string()
}

/// Hide credentials embedded in a URL
pub fn mask_url(url: &str) -> String {
    if url.is_empty() {
        return "Not configured".to_string();
    }
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://****{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// Keep scheme and host of a connection string, hide the database part
pub fn mask_connection_string(connection: &str) -> String {
    if connection.is_empty() {
        return "Not configured".to_string();
    }
    let without_query = connection.split('?').next().unwrap_or(connection);
    if let Some((scheme, rest)) = without_query.split_once("//") {
        if let Some(host) = rest.split('/').next().filter(|h| !h.is_empty()) {
            return format!("{}//{}/****", scheme, host);
        }
    }
    let keep: String = connection.chars().take(30).collect();
    format!("{}****", keep)
}
