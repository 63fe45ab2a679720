use std::collections::BTreeMap;

use super::types::{ImageResolver, PluginDescriptor, UnknownPlugin};

impl ImageResolver {
    pub fn new(images: BTreeMap<String, String>) -> Self {
        ImageResolver { images }
    }

    pub fn resolve(&self, plugin_id: &str) -> Result<PluginDescriptor, UnknownPlugin> {
        self.images
            .get(plugin_id)
            .map(|image| PluginDescriptor {
                id: plugin_id.to_string(),
                image: image.clone(),
            })
            .ok_or_else(|| UnknownPlugin(plugin_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }
}
