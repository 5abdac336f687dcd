use crate::core::post::{Post, PostKey};
use slotmap::SlotMap;
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Permalink-based lookup key for posts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey(String);

impl SearchKey {
    pub fn new<S: Into<String>>(key: S) -> Self {
        let key: String = key.into();
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for SearchKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for SearchKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<&String> for SearchKey {
    fn from(key: &String) -> Self {
        Self(key.clone())
    }
}

impl From<String> for SearchKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// All parsed posts, addressable by slot key or by permalink.
#[derive(Debug, Clone)]
pub struct Library {
    posts: SlotMap<PostKey, Post>,
    key_map: HashMap<SearchKey, PostKey>,
}

impl Library {
    pub fn new() -> Self {
        Self {
            posts: SlotMap::with_key(),
            key_map: HashMap::new(),
        }
    }

    pub fn get_with_key(&self, key: PostKey) -> Option<&Post> {
        self.posts.get(key)
    }

    pub fn get(&self, search_key: &SearchKey) -> Option<&Post> {
        let post_key = self.key_map.get(search_key)?;
        self.posts.get(*post_key)
    }

    pub fn get_mut(&mut self, search_key: &SearchKey) -> Option<&mut Post> {
        let post_key = self.key_map.get(search_key)?;
        self.posts.get_mut(*post_key)
    }

    pub fn update(&mut self, post: Post) -> PostKey {
        trace!("updating existing post");

        match self.get_mut(&post.search_key()) {
            Some(old) => {
                let mut post = post;
                post.post_key = old.post_key;

                *old = post;
                old.post_key
            }
            None => self.insert(post),
        }
    }

    pub fn insert(&mut self, post: Post) -> PostKey {
        trace!("inserting post into library");

        let search_key = post.search_key();

        let post_key = self.posts.insert_with_key(|key| {
            let mut post = post;
            post.set_post_key(key);
            post
        });

        self.key_map.insert(search_key, post_key);

        post_key
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> slotmap::basic::Iter<'_, PostKey, Post> {
        self.posts.iter()
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoIterator for Library {
    type Item = Post;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.posts
            .iter()
            .map(|(_, post)| post)
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl<'a> IntoIterator for &'a Library {
    type Item = (PostKey, &'a Post);
    type IntoIter = slotmap::basic::Iter<'a, PostKey, Post>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub mod script {

    use super::{Library, SearchKey};

    #[allow(clippy::wildcard_imports)]
    use rhai::plugin::*;

    impl Library {
        /// Returns the post at the given permalink. Returns `()` if no post was found.
        fn _script_get(&mut self, search_key: &str) -> rhai::Dynamic {
            self.get(&SearchKey::from(search_key))
                .cloned()
                .map_or_else(|| ().into(), Dynamic::from)
        }
    }

    pub fn register_type(engine: &mut rhai::Engine) {
        engine
            .register_type::<Library>()
            .register_fn("get", Library::_script_get)
            .register_iterator::<Library>();
    }
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]

    use super::Library;
    use crate::core::post::post::test::minimal_post;
    use std::path::PathBuf;

    #[test]
    fn inserts_and_queries_posts() {
        let mut post1 = minimal_post();
        post1.rel_path = PathBuf::from("one.md");
        let mut post2 = minimal_post();
        post2.rel_path = PathBuf::from("two.md");

        let mut library = Library::new();
        let key1 = library.insert(post1);
        let key2 = library.insert(post2);

        assert!(library.get_with_key(key1).is_some());

        let post1 = library.get(&"/one/".into()).unwrap();
        assert_eq!(post1.post_key, key1);

        let post2 = library.get(&"/two/".into()).unwrap();
        assert_eq!(post2.post_key, key2);
    }

    #[test]
    fn update_replaces_existing_post() {
        let mut post = minimal_post();
        post.rel_path = PathBuf::from("one.md");

        let mut library = Library::new();
        let key = library.insert(post.clone());

        post.frontmatter.title = Some("updated".into());
        let updated_key = library.update(post);

        assert_eq!(key, updated_key);
        assert_eq!(library.len(), 1);
        assert_eq!(
            library
                .get_with_key(key)
                .unwrap()
                .frontmatter
                .title
                .as_deref(),
            Some("updated")
        );
    }

    #[test]
    fn update_inserts_unknown_post() {
        let mut library = Library::new();
        let key = library.update(minimal_post());
        assert!(library.get_with_key(key).is_some());
    }
}
