use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_template() -> String {
    String::from("post")
}

/// Post metadata parsed from the YAML front-matter block.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,

    /// Template stem; the post renders through `<template>.html`.
    #[serde(default = "default_template")]
    pub template: String,

    pub category: Option<String>,
    pub tags: Vec<String>,
    pub microdata_type: Option<String>,

    /// Hidden posts are parsed but never published.
    pub hidden: bool,

    pub creation_date: Option<String>,
    pub update_date: Option<String>,

    /// Explicit permalink; derived from the source path when absent.
    pub permanent_url: Option<String>,

    /// Free-form metadata available to templates and plugins.
    pub meta: HashMap<String, serde_json::Value>,
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            title: None,
            author: None,
            description: None,
            template: default_template(),
            category: None,
            tags: vec![],
            microdata_type: None,
            hidden: false,
            creation_date: None,
            update_date: None,
            permanent_url: None,
            meta: HashMap::new(),
        }
    }
}

impl FrontMatter {
    pub fn creation_ts(&self) -> Option<i64> {
        self.creation_date.as_deref().and_then(parse_date)
    }

    pub fn update_ts(&self) -> Option<i64> {
        self.update_date.as_deref().and_then(parse_date)
    }
}

/// Parses a date as RFC 3339, `YYYY-MM-DD HH:MM:SS`, or `YYYY-MM-DD`
/// into a unix timestamp. Naive formats are taken as UTC.
pub fn parse_date(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }
    None
}
