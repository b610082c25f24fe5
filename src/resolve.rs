use std::path::{Path, PathBuf};

use crate::error::ApiError;

/// A request path mapped onto the managed tree. `id` is the canonical
/// resource identifier (leading slash, trailing slash iff the request
/// carried one) and `fs_path` is always contained in the base directory.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub fs_path: PathBuf,
    pub id: String,
    pub dir_hint: bool,
}

impl Resolved {
    pub fn name(&self) -> Option<&str> {
        self.id
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
    }

    /// Identifier of the containing directory, trailing slash included.
    pub fn parent_id(&self) -> String {
        let trimmed = self.id.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) => trimmed[..=idx].to_string(),
            None => "/".to_string(),
        }
    }

    /// The identifier read as a directory prefix.
    pub fn dir_id(&self) -> String {
        if self.id.ends_with('/') {
            self.id.clone()
        } else {
            format!("{}/", self.id)
        }
    }
}

pub fn resolve(base_dir: &Path, raw: &str) -> Result<Resolved, ApiError> {
    let decoded = urlencoding::decode(raw)
        .map_err(|_| ApiError::InvalidPath(raw.to_string()))?;
    let dir_hint = decoded.is_empty() || decoded.ends_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                // popping past the root escapes the base directory
                if segments.pop().is_none() {
                    return Err(ApiError::InvalidPath(decoded.to_string()));
                }
            }
            other => segments.push(other),
        }
    }

    let mut id = String::from("/");
    id.push_str(&segments.join("/"));
    if dir_hint && !segments.is_empty() {
        id.push('/');
    }

    let mut fs_path = base_dir.to_path_buf();
    for segment in &segments {
        fs_path.push(segment);
    }

    Ok(Resolved {
        fs_path,
        id,
        dir_hint,
    })
}

/// True when the final extension is 3-4 word characters; this is the
/// rule directory child counts are scoped to.
pub fn has_short_ext(name: &str) -> bool {
    split_ext(name).1.is_some()
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Makes client-supplied names URL safe, keeping the extension:
/// `My SuperFile.JpG` becomes `my-superfile.jpg`.
pub fn slugify(name: &str) -> String {
    let (stem, ext) = split_ext(name);
    let mut slug = String::with_capacity(name.len());
    for ch in stem.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if matches!(ch, ' ' | '_' | '-' | '.') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let mut slug = slug.trim_matches('-').to_string();
    if let Some(ext) = ext {
        slug.push_str(&ext.to_ascii_lowercase());
    }
    slug
}

fn split_ext(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) => {
            let ext = &name[idx + 1..];
            if (3..=4).contains(&ext.len())
                && ext.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            {
                (&name[..idx], Some(&name[idx..]))
            } else {
                (name, None)
            }
        }
        None => (name, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn resolves_plain_file_path() {
        let resolved = resolve(Path::new("/base"), "foo/bar.txt").unwrap();
        assert_eq!(resolved.fs_path, Path::new("/base/foo/bar.txt"));
        assert_eq!(resolved.id, "/foo/bar.txt");
        assert!(!resolved.dir_hint);
        assert_eq!(resolved.name(), Some("bar.txt"));
        assert_eq!(resolved.parent_id(), "/foo/");
    }

    #[test]
    fn preserves_trailing_slash() {
        let resolved = resolve(Path::new("/base"), "kitties/").unwrap();
        assert_eq!(resolved.id, "/kitties/");
        assert!(resolved.dir_hint);
        assert_eq!(resolved.name(), Some("kitties"));
    }

    #[test]
    fn empty_tail_is_the_root_directory() {
        let resolved = resolve(Path::new("/base"), "").unwrap();
        assert_eq!(resolved.id, "/");
        assert!(resolved.dir_hint);
        assert_eq!(resolved.fs_path, Path::new("/base"));
        assert_eq!(resolved.name(), None);
        assert_eq!(resolved.parent_id(), "/");
    }

    #[test]
    fn decodes_percent_encoding_once() {
        let resolved = resolve(Path::new("/base"), "my%20cat.jpg").unwrap();
        assert_eq!(resolved.id, "/my cat.jpg");
        assert_eq!(resolved.fs_path, Path::new("/base/my cat.jpg"));
    }

    #[test]
    fn dotdot_inside_the_tree_normalizes() {
        let resolved = resolve(Path::new("/base"), "foo/../bar").unwrap();
        assert_eq!(resolved.id, "/bar");
        assert_eq!(resolved.fs_path, Path::new("/base/bar"));
    }

    #[test]
    fn escaping_the_base_dir_is_rejected() {
        assert!(matches!(
            resolve(Path::new("/base"), "../etc/passwd"),
            Err(ApiError::InvalidPath(_))
        ));
        assert!(matches!(
            resolve(Path::new("/base"), "foo/../../etc"),
            Err(ApiError::InvalidPath(_))
        ));
        // encoded traversal decodes before normalization
        assert!(matches!(
            resolve(Path::new("/base"), "%2e%2e/etc"),
            Err(ApiError::InvalidPath(_))
        ));
    }

    #[test]
    fn slugify_lowercases_and_dashes() {
        assert_eq!(slugify("My SuperFile.JpG"), "my-superfile.jpg");
        assert_eq!(slugify("Big_Easy_Lofton.jpg"), "big-easy-lofton.jpg");
        assert_eq!(slugify("plaid-kitty.jpg"), "plaid-kitty.jpg");
        assert_eq!(slugify("kitties"), "kitties");
        assert_eq!(slugify("archive.tar.gz"), "archive-tar-gz");
    }

    #[test]
    fn short_ext_rule() {
        assert!(has_short_ext("photo.jpeg"));
        assert!(has_short_ext("photo.jpg"));
        assert!(!has_short_ext("script.js"));
        assert!(!has_short_ext("README"));
        assert!(!has_short_ext("archive.tar.gz"));
    }
}
