use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub id: String,
    pub image: String,
}

/// Static plugin id to image table, loaded from the `[plugins]` section.
#[derive(Debug, Clone, Default)]
pub struct ImageResolver {
    pub images: BTreeMap<String, String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown plugin: {0}")]
pub struct UnknownPlugin(pub String);
