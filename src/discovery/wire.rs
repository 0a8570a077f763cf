//! JSON shapes exchanged with the discovery endpoints.

use std::collections::HashMap;

use serde::Deserialize;

/// Directory reply: `{"data": {"instance": [...]}, "ok": bool}`.
#[derive(Debug, Default, Deserialize)]
pub(super) struct DirectoryReply {
    #[serde(default)]
    pub data: DirectoryData,
    #[serde(default)]
    pub ok: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct DirectoryData {
    #[serde(default)]
    pub instance: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Instance {
    #[serde(rename = "HostIP", default)]
    pub host_ip: String,
    #[serde(rename = "WebPort", default)]
    pub web_port: i64,
}

impl Instance {
    /// Base status URL of this instance, if it advertises a usable endpoint.
    pub fn status_base(&self) -> Option<String> {
        let port = u16::try_from(self.web_port).ok().filter(|port| *port != 0)?;
        if self.host_ip.is_empty() {
            return None;
        }
        Some(format!("http://{}:{port}/docker-instance", self.host_ip))
    }
}

/// Status reply: a flat map holding at least `status` and, on success,
/// `host`.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub(super) struct StatusReply(HashMap<String, serde_json::Value>);

impl StatusReply {
    fn field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(serde_json::Value::as_str)
    }

    /// Advertised host when the instance reports success.
    pub fn successful_host(&self) -> Option<&str> {
        (self.field("status") == Some("success"))
            .then(|| self.field("host"))
            .flatten()
            .filter(|host| !host.is_empty())
    }

    pub fn status(&self) -> Option<&str> {
        self.field("status")
    }
}
