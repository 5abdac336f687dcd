use serde::Serialize;

use crate::core::config::SiteInfo;

/// Site-wide values available to every template as `site`.
#[derive(Debug, Clone, Serialize)]
pub struct SiteContext {
    pub title: String,
    pub url: String,
    pub author: String,
    pub description: String,
}

impl From<&SiteInfo> for SiteContext {
    fn from(info: &SiteInfo) -> Self {
        Self {
            title: info.title.clone(),
            url: info.url.clone(),
            author: info.author.clone(),
            description: info.description.clone(),
        }
    }
}
