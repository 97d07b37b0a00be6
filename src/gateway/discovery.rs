//! Group/version discovery document.
//!
//! Built once from configuration; answering it never touches the backend.

use serde::Serialize;

use crate::config::ApiConfig;

/// One subresource the API group/version exposes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubresourceDescriptor {
    pub name: String,
    pub namespaced: bool,
    pub verbs: Vec<String>,
}

/// `APIResourceList`-shaped listing of the exposed subresources.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryDocument {
    pub kind: &'static str,
    pub api_version: &'static str,
    pub group_version: String,
    pub resources: Vec<SubresourceDescriptor>,
}

impl DiscoveryDocument {
    pub fn from_config(api: &ApiConfig) -> Self {
        let resources = api
            .subresources
            .iter()
            .map(|sub| SubresourceDescriptor {
                name: format!("{}/{}", api.resource, sub),
                namespaced: true,
                verbs: vec!["get".to_string()],
            })
            .collect();

        Self {
            kind: "APIResourceList",
            api_version: "v1",
            group_version: api.group_version(),
            resources,
        }
    }
}
