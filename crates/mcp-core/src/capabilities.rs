//! Capability records exchanged during the initialize handshake (§3, §4.5).

use serde::{Deserialize, Serialize};

/// Server-advertised resource capability flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcesCapability {
    /// The server supports `resources/subscribe` / `resources/unsubscribe`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub subscribe: bool,
    /// The server emits `notifications/resources/list_changed`.
    #[serde(default, rename = "listChanged", skip_serializing_if = "std::ops::Not::not")]
    pub list_changed: bool,
}

/// Generic "this feature exists and may emit list-changed notifications" flag,
/// used for `tools`, `prompts`, and `logging`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListChangedCapability {
    /// The peer emits a `notifications/*/list_changed` notification for this
    /// feature when its catalog changes.
    #[serde(default, rename = "listChanged", skip_serializing_if = "std::ops::Not::not")]
    pub list_changed: bool,
}

/// Experimental / forward-compatible capability flags not yet standardized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentalCapabilities {
    /// The peer sends/accepts periodic `ping` keepalives (§4.5).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub keepalive: bool,
    /// The peer honors `offset`/`length` on `resources/read` and returns
    /// chunked results (§4.5).
    #[serde(default, rename = "chunkedRead", skip_serializing_if = "std::ops::Not::not")]
    pub chunked_read: bool,
}

/// The set of optional features a peer advertises in `initialize` (§3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Tool listing/invocation support.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListChangedCapability>,
    /// Prompt listing/retrieval support.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListChangedCapability>,
    /// Resource listing/reading/subscription support.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    /// Structured log message emission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<ListChangedCapability>,
    /// Server-initiated `sampling/createMessage` support (client capability).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<serde_json::Value>,
    /// Experimental, not-yet-standardized features.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<ExperimentalCapabilities>,
}

impl Capabilities {
    /// Computes the feature intersection of two advertised capability sets,
    /// per §4.5: "both peers compute the intersection and record negotiated
    /// features."
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            tools: both_list_changed(&self.tools, &other.tools),
            prompts: both_list_changed(&self.prompts, &other.prompts),
            resources: match (&self.resources, &other.resources) {
                (Some(a), Some(b)) => Some(ResourcesCapability {
                    subscribe: a.subscribe && b.subscribe,
                    list_changed: a.list_changed && b.list_changed,
                }),
                _ => None,
            },
            logging: both_list_changed(&self.logging, &other.logging),
            sampling: match (&self.sampling, &other.sampling) {
                (Some(_), Some(_)) => Some(serde_json::Value::Object(Default::default())),
                _ => None,
            },
            experimental: match (&self.experimental, &other.experimental) {
                (Some(a), Some(b)) => Some(ExperimentalCapabilities {
                    keepalive: a.keepalive && b.keepalive,
                    chunked_read: a.chunked_read && b.chunked_read,
                }),
                _ => None,
            },
        }
    }

    /// `true` if both peers negotiated `experimental.chunked_read` (§4.5).
    pub fn supports_chunked_read(&self) -> bool {
        self.experimental.as_ref().is_some_and(|e| e.chunked_read)
    }

    /// `true` if both peers negotiated the keepalive extension (§4.5).
    pub fn supports_keepalive(&self) -> bool {
        self.experimental.as_ref().is_some_and(|e| e.keepalive)
    }

    /// `true` if both peers negotiated `resources.subscribe`.
    pub fn supports_resource_subscribe(&self) -> bool {
        self.resources.as_ref().is_some_and(|r| r.subscribe)
    }
}

fn both_list_changed(
    a: &Option<ListChangedCapability>,
    b: &Option<ListChangedCapability>,
) -> Option<ListChangedCapability> {
    match (a, b) {
        (Some(a), Some(b)) => Some(ListChangedCapability {
            list_changed: a.list_changed && b.list_changed,
        }),
        _ => None,
    }
}

/// `{name, version}` identification of a client or server, sent in `initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    /// Display name of the implementation.
    pub name: String,
    /// Implementation version string.
    pub version: String,
}

impl Implementation {
    /// Builds an `Implementation` record.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_requires_both_sides() {
        let mine = Capabilities {
            resources: Some(ResourcesCapability {
                subscribe: true,
                list_changed: true,
            }),
            ..Default::default()
        };
        let theirs = Capabilities::default();
        let negotiated = mine.intersect(&theirs);
        assert!(negotiated.resources.is_none());
        assert!(!negotiated.supports_resource_subscribe());
    }

    #[test]
    fn intersect_keeps_overlap() {
        let mine = Capabilities {
            experimental: Some(ExperimentalCapabilities {
                keepalive: true,
                chunked_read: true,
            }),
            ..Default::default()
        };
        let theirs = Capabilities {
            experimental: Some(ExperimentalCapabilities {
                keepalive: true,
                chunked_read: false,
            }),
            ..Default::default()
        };
        let negotiated = mine.intersect(&theirs);
        assert!(negotiated.supports_keepalive());
        assert!(!negotiated.supports_chunked_read());
    }
}
