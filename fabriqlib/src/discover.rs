use crate::Result;
use eyre::WrapErr;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Recursively collects every file under `root` that satisfies `condition`.
pub fn get_all_paths<P: AsRef<Path> + std::fmt::Debug>(
    root: P,
    condition: &dyn Fn(&Path) -> bool,
) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let mut paths = vec![];
    if root.is_dir() {
        for entry in fs::read_dir(root)
            .wrap_err_with(|| format!("Failed to read directory '{}'", root.display()))?
        {
            let path = entry
                .wrap_err_with(|| {
                    format!("Failed to read directory entry in '{}'", root.display())
                })?
                .path();
            if path.is_dir() {
                paths.append(&mut get_all_paths(&path, condition).wrap_err_with(|| {
                    format!("Failed to get all paths from '{}'", path.display())
                })?);
            } else if condition(path.as_ref()) {
                paths.push(path);
            }
        }
    }
    paths.sort();
    Ok(paths)
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
pub enum UrlType {
    Offsite,
    Absolute,
    Relative(String),
}

pub fn get_url_type<S: AsRef<str>>(link: S) -> UrlType {
    use std::str::from_utf8;
    match link.as_ref().as_bytes() {
        [b'h', b't', b't', b'p', b':', b'/', b'/', ..] => UrlType::Offsite,
        [b'h', b't', b't', b'p', b's', b':', b'/', b'/', ..] => UrlType::Offsite,
        [b'/', ..] => UrlType::Absolute,
        [target @ ..] => UrlType::Relative(from_utf8(target).unwrap_or_default().to_owned()),
    }
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]
    use super::*;

    #[test]
    fn identifies_absolute_target() {
        let link = super::get_url_type("/some/path/page.md");
        match link {
            UrlType::Absolute => (),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn identifies_relative_target() {
        let link = super::get_url_type("some/path/page.md");
        match link {
            UrlType::Relative(target) => assert_eq!(target, "some/path/page.md"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn identifies_offsite_target() {
        let link = super::get_url_type("http://example.com");
        match link {
            UrlType::Offsite => (),
            _ => panic!("wrong variant"),
        }

        let link = super::get_url_type("https://example.com");
        match link {
            UrlType::Offsite => (),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn gets_all_paths_with_subdirs() {
        use temptree::temptree;

        let tree = temptree! {
          file: "",
          a: {
              b: {
                  c: {
                      file: ""
                  }
              },
              b2: {
                  file: ""
              }
          }
        };
        let root = tree.path().join("a");
        let paths = get_all_paths(&root, &|_| true).unwrap();

        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn filters_on_condition() {
        use std::ffi::OsStr;
        use temptree::temptree;

        let tree = temptree! {
          "post.md": "",
          "image.png": "",
        };
        let paths = get_all_paths(tree.path(), &|path: &Path| {
            path.extension() == Some(OsStr::new("md"))
        })
        .unwrap();

        assert_eq!(paths.len(), 1);
    }
}
