use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::config::CollectionConfig;
use crate::core::library::Library;
use crate::core::post::{Post, PostKey};
use crate::util::slugify;

/// Grouping axes for post collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Tag,
    Category,
    Template,
    Microdata,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Category => "category",
            Self::Template => "template",
            Self::Microdata => "microdata",
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How posts are ordered within each collection group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    CreationAsc,
    CreationDesc,
    UpdateAsc,
    UpdateDesc,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::CreationDesc
    }
}

/// One group of posts sharing a tag, category, template, or microdata type.
#[derive(Debug, Clone, Serialize)]
pub struct PostCollection {
    pub kind: CollectionKind,
    pub name: String,
    pub slug: String,
    pub post_keys: Vec<PostKey>,
}

impl PostCollection {
    fn new(kind: CollectionKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            slug: slugify(name),
            post_keys: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.post_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.post_keys.is_empty()
    }
}

/// All collections for a site, grouped by kind and keyed by group name.
///
/// Posts within each group are ordered per the configured [`SortOrder`],
/// with undated posts last and permalink as the tiebreaker.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteCollections {
    pub tags: BTreeMap<String, PostCollection>,
    pub categories: BTreeMap<String, PostCollection>,
    pub templates: BTreeMap<String, PostCollection>,
    pub microdata: BTreeMap<String, PostCollection>,
}

impl SiteCollections {
    /// Builds collections from every published post in the library.
    ///
    /// Groups are kept regardless of size so templates and plugins can
    /// see all of them; `min_posts` only affects index page rendering.
    pub fn from_library(library: &Library, config: &CollectionConfig) -> Self {
        let mut collections = Self::default();

        for (key, post) in library {
            for tag in &post.frontmatter.tags {
                collections.push(CollectionKind::Tag, tag, key);
            }
            if let Some(category) = &post.frontmatter.category {
                collections.push(CollectionKind::Category, category, key);
            }
            collections.push(CollectionKind::Template, &post.frontmatter.template, key);
            if let Some(microdata) = &post.frontmatter.microdata_type {
                collections.push(CollectionKind::Microdata, microdata, key);
            }
        }

        for group in collections.iter_groups_mut() {
            sort_posts(&mut group.post_keys, library, config.sort_order);
        }

        collections
    }

    fn push(&mut self, kind: CollectionKind, name: &str, key: PostKey) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let groups = match kind {
            CollectionKind::Tag => &mut self.tags,
            CollectionKind::Category => &mut self.categories,
            CollectionKind::Template => &mut self.templates,
            CollectionKind::Microdata => &mut self.microdata,
        };
        groups
            .entry(name.to_string())
            .or_insert_with(|| PostCollection::new(kind, name))
            .post_keys
            .push(key);
    }

    pub fn get(&self, kind: CollectionKind, name: &str) -> Option<&PostCollection> {
        match kind {
            CollectionKind::Tag => self.tags.get(name),
            CollectionKind::Category => self.categories.get(name),
            CollectionKind::Template => self.templates.get(name),
            CollectionKind::Microdata => self.microdata.get(name),
        }
    }

    pub fn iter_groups(&self) -> impl Iterator<Item = &PostCollection> + Clone {
        self.tags
            .values()
            .chain(self.categories.values())
            .chain(self.templates.values())
            .chain(self.microdata.values())
    }

    fn iter_groups_mut(&mut self) -> impl Iterator<Item = &mut PostCollection> {
        self.tags
            .values_mut()
            .chain(self.categories.values_mut())
            .chain(self.templates.values_mut())
            .chain(self.microdata.values_mut())
    }

    /// Template-facing view of the collections: group names, index page
    /// URLs, and post summaries instead of raw slot keys.
    pub fn context(&self, library: &Library, config: &CollectionConfig) -> serde_json::Value {
        serde_json::json!({
            "tags": kind_context(&self.tags, library, Some(&config.tag_output_dir)),
            "categories": kind_context(&self.categories, library, Some(&config.category_output_dir)),
            "templates": kind_context(&self.templates, library, None),
            "microdata": kind_context(&self.microdata, library, None),
        })
    }
}

fn sort_posts(keys: &mut [PostKey], library: &Library, order: SortOrder) {
    keys.sort_by(|a, b| {
        let a = library.get_with_key(*a);
        let b = library.get_with_key(*b);
        let ts = |post: Option<&Post>| {
            post.and_then(|p| match order {
                SortOrder::CreationAsc | SortOrder::CreationDesc => p.frontmatter.creation_ts(),
                // posts never updated fall back to their creation date
                SortOrder::UpdateAsc | SortOrder::UpdateDesc => p
                    .frontmatter
                    .update_ts()
                    .or_else(|| p.frontmatter.creation_ts()),
            })
        };
        let link = |post: Option<&Post>| post.map(Post::permalink).unwrap_or_default();
        match (ts(a), ts(b)) {
            (Some(a_ts), Some(b_ts)) => {
                let by_date = match order {
                    SortOrder::CreationAsc | SortOrder::UpdateAsc => a_ts.cmp(&b_ts),
                    SortOrder::CreationDesc | SortOrder::UpdateDesc => b_ts.cmp(&a_ts),
                };
                by_date.then_with(|| link(a).cmp(&link(b)))
            }
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => link(a).cmp(&link(b)),
        }
    });
}

fn kind_context(
    groups: &BTreeMap<String, PostCollection>,
    library: &Library,
    output_dir: Option<&std::path::Path>,
) -> serde_json::Value {
    let groups: Vec<_> = groups
        .values()
        .map(|group| {
            let posts: Vec<_> = group
                .post_keys
                .iter()
                .filter_map(|key| library.get_with_key(*key))
                .map(post_summary)
                .collect();
            serde_json::json!({
                "name": group.name,
                "slug": group.slug,
                "url": output_dir.map(|dir| group_url(dir, &group.slug)),
                "posts": posts,
            })
        })
        .collect();
    serde_json::Value::Array(groups)
}

fn post_summary(post: &Post) -> serde_json::Value {
    serde_json::json!({
        "title": post.frontmatter.title,
        "description": post.frontmatter.description,
        "permalink": post.permalink(),
        "creation_date": post.frontmatter.creation_date,
        "tags": post.frontmatter.tags,
        "category": post.frontmatter.category,
    })
}

pub fn group_url(output_dir: &std::path::Path, slug: &str) -> String {
    let dir = output_dir.to_string_lossy();
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        format!("/{slug}/")
    } else {
        format!("/{dir}/{slug}/")
    }
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]

    use super::*;
    use crate::core::config::CollectionConfig;
    use crate::core::library::Library;
    use crate::core::post::post::test::minimal_post;
    use std::path::PathBuf;

    fn sample_library() -> Library {
        let mut library = Library::new();

        let mut post = minimal_post();
        post.rel_path = PathBuf::from("first.md");
        post.frontmatter.tags = vec!["Rust".into(), "ssg".into()];
        post.frontmatter.category = Some("engineering".into());
        post.frontmatter.creation_date = Some("2023-01-01".into());
        library.insert(post);

        let mut post = minimal_post();
        post.rel_path = PathBuf::from("second.md");
        post.frontmatter.tags = vec!["Rust".into()];
        post.frontmatter.creation_date = Some("2023-06-01".into());
        post.frontmatter.microdata_type = Some("BlogPosting".into());
        library.insert(post);

        library
    }

    #[test]
    fn groups_posts_by_tag_and_category() {
        let library = sample_library();
        let collections = SiteCollections::from_library(&library, &CollectionConfig::default());

        assert_eq!(collections.tags["Rust"].len(), 2);
        assert_eq!(collections.tags["ssg"].len(), 1);
        assert_eq!(collections.categories["engineering"].len(), 1);
        assert_eq!(collections.microdata["BlogPosting"].len(), 1);
        assert_eq!(collections.templates["post"].len(), 2);
    }

    #[test]
    fn small_groups_stay_visible_to_templates() {
        let library = sample_library();
        let config = CollectionConfig {
            min_posts: 2,
            ..CollectionConfig::default()
        };
        let collections = SiteCollections::from_library(&library, &config);

        // min_posts only limits index rendering, not the groups themselves
        assert!(collections.tags.contains_key("ssg"));
        assert!(collections.categories.contains_key("engineering"));
        assert!(collections.microdata.contains_key("BlogPosting"));
    }

    #[test]
    fn posts_are_ordered_newest_first_by_default() {
        let library = sample_library();
        let collections = SiteCollections::from_library(&library, &CollectionConfig::default());

        let rust = &collections.tags["Rust"];
        let first = library.get_with_key(rust.post_keys[0]).unwrap();
        assert_eq!(first.permalink(), "/second/");
    }

    #[test]
    fn sort_order_flips_to_oldest_first() {
        let library = sample_library();
        let config = CollectionConfig {
            sort_order: SortOrder::CreationAsc,
            ..CollectionConfig::default()
        };
        let collections = SiteCollections::from_library(&library, &config);

        let rust = &collections.tags["Rust"];
        let first = library.get_with_key(rust.post_keys[0]).unwrap();
        assert_eq!(first.permalink(), "/first/");
    }

    #[test]
    fn update_date_sort_falls_back_to_creation_date() {
        let mut library = sample_library();
        library
            .get_mut(&"/first/".into())
            .unwrap()
            .frontmatter
            .update_date = Some("2023-12-01".into());

        let config = CollectionConfig {
            sort_order: SortOrder::UpdateDesc,
            ..CollectionConfig::default()
        };
        let collections = SiteCollections::from_library(&library, &config);

        // first.md was updated after second.md was created
        let rust = &collections.tags["Rust"];
        let first = library.get_with_key(rust.post_keys[0]).unwrap();
        assert_eq!(first.permalink(), "/first/");
    }

    #[test]
    fn group_names_are_slugified() {
        let library = sample_library();
        let collections = SiteCollections::from_library(&library, &CollectionConfig::default());
        assert_eq!(collections.tags["Rust"].slug, "rust");
    }

    #[test]
    fn context_includes_index_urls() {
        let library = sample_library();
        let config = CollectionConfig::default();
        let collections = SiteCollections::from_library(&library, &config);
        let ctx = collections.context(&library, &config);

        let tags = ctx["tags"].as_array().unwrap();
        let rust = tags.iter().find(|t| t["name"] == "Rust").unwrap();
        assert_eq!(rust["url"], "/tags/rust/");
        assert_eq!(rust["posts"].as_array().unwrap().len(), 2);

        // template groups have no index pages
        let templates = ctx["templates"].as_array().unwrap();
        assert!(templates[0]["url"].is_null());
    }

    #[test]
    fn group_url_handles_empty_dir() {
        assert_eq!(group_url(std::path::Path::new(""), "rust"), "/rust/");
        assert_eq!(group_url(std::path::Path::new("tags/"), "rust"), "/tags/rust/");
    }
}
