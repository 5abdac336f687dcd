pub mod frontmatter;
pub mod post;
pub mod render;

use std::ops::Deref;

pub use frontmatter::FrontMatter;
pub use post::Post;
pub use render::{render, RenderedPage, RenderedPageCollection};

use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    pub struct PostKey;
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct RawMarkdown(String);

impl RawMarkdown {
    pub fn from_raw<S: Into<String>>(raw: S) -> Self {
        Self(raw.into())
    }
}

impl AsRef<str> for RawMarkdown {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for RawMarkdown {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

pub mod script {
    #[allow(clippy::wildcard_imports)]
    use rhai::plugin::*;

    #[rhai::export_module]
    pub mod rhai_module {
        use crate::core::post::Post;
        use rhai::serde::{from_dynamic, to_dynamic};

        #[rhai_fn(get = "title")]
        pub fn title(post: &mut Post) -> String {
            post.frontmatter.title.clone().unwrap_or_default()
        }

        #[rhai_fn(get = "author")]
        pub fn author(post: &mut Post) -> String {
            post.frontmatter.author.clone().unwrap_or_default()
        }

        #[rhai_fn(get = "category")]
        pub fn category(post: &mut Post) -> String {
            post.frontmatter.category.clone().unwrap_or_default()
        }

        #[rhai_fn(get = "template")]
        pub fn template(post: &mut Post) -> String {
            post.frontmatter.template.clone()
        }

        #[rhai_fn(get = "permalink")]
        pub fn permalink(post: &mut Post) -> String {
            post.permalink()
        }

        #[rhai_fn(get = "hidden")]
        pub fn hidden(post: &mut Post) -> bool {
            post.frontmatter.hidden
        }

        #[rhai_fn(get = "word_count")]
        pub fn word_count(post: &mut Post) -> i64 {
            post.stats.num_words as i64
        }

        #[rhai_fn(get = "read_time")]
        pub fn read_time(post: &mut Post) -> i64 {
            post.stats.read_time_minutes as i64
        }

        #[rhai_fn(get = "tags", return_raw)]
        pub fn tags(post: &mut Post) -> Result<rhai::Dynamic, Box<EvalAltResult>> {
            to_dynamic(post.frontmatter.tags.clone())
        }

        /// Returns the value found at the provided key. Returns `()` if the key wasn't found.
        #[rhai_fn(name = "meta")]
        pub fn get_meta(post: &mut Post, key: &str) -> rhai::Dynamic {
            post.frontmatter
                .meta
                .get(key)
                .and_then(|v| to_dynamic(v).ok())
                .unwrap_or_default()
        }

        /// Attaches a metadata value to the post, overwriting any existing value.
        #[rhai_fn(name = "set_meta", return_raw)]
        pub fn set_meta(
            post: &mut Post,
            key: &str,
            value: rhai::Dynamic,
        ) -> Result<(), Box<EvalAltResult>> {
            let value: serde_json::Value = from_dynamic(&value)?;
            post.frontmatter.meta.insert(key.to_string(), value);
            Ok(())
        }
    }

}
