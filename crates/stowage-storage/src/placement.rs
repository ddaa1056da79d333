//! Link placement.
//!
//! A link is derived from the owning record, the attribute name and the upload
//! itself, according to a `PlacementPolicy`. Resolution is pure: the same
//! inputs always produce the same link.

use stowage_core::{
    numeric_id, FileNaming, FolderSegment, PlacementPolicy, UploadOwner, UploadedFile,
};

const SHARD_TOP: u64 = 125_000_000;
const SHARD_MID: u64 = 250_000;
const SHARD_LOW: u64 = 500;

const UNSAFE_FILENAME_CHARS: [char; 8] = [' ', '"', '\'', '&', '/', '\\', '?', '#'];

/// Three-level shard folder `c/a/b` for a numeric record id.
///
/// Records are grouped 500 per leaf, 500 leaves per middle folder and 500
/// middle folders per top folder.
pub fn shard_folder(id: u64) -> String {
    let c = id / SHARD_TOP;
    let a = (id - c * SHARD_TOP) / SHARD_MID;
    let b = (id - a * SHARD_MID - c * SHARD_TOP) / SHARD_LOW;
    format!("{}/{}/{}", c, a, b)
}

/// Convert a CamelCase type name into a dashed lower-case id, e.g. `BlogPost` -> `blog-post`.
///
/// A dash goes before every upper-case letter that does not follow another
/// upper-case letter, so acronyms stay together.
pub fn camel_to_id(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous_upper = false;
    for ch in name.chars() {
        let upper = ch.is_ascii_uppercase();
        if upper && !previous_upper {
            out.push('-');
        }
        out.push(ch);
        previous_upper = upper;
    }
    out.replace('_', "-")
        .to_ascii_lowercase()
        .trim_matches('-')
        .to_string()
}

/// Replace characters that are unsafe in a link segment with `-`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if UNSAFE_FILENAME_CHARS.contains(&c) {
                '-'
            } else {
                c
            }
        })
        .collect()
}

/// Normalize a slash-separated link.
///
/// Backslashes become slashes, empty and `.` segments are dropped and `..`
/// removes the preceding segment. The result never starts with `/`.
pub fn normalize_link(link: &str) -> String {
    let unified = link.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn segment(
    rule: &FolderSegment,
    owner: &dyn UploadOwner,
    attribute: &str,
    file: &UploadedFile,
    default: impl FnOnce() -> String,
) -> Option<String> {
    match rule {
        FolderSegment::Disabled => None,
        FolderSegment::Literal(value) => Some(value.clone()),
        FolderSegment::Default => Some(default()),
        FolderSegment::Custom(f) => Some(f(owner, attribute, file)),
    }
}

fn file_name(
    naming: &FileNaming,
    owner: &dyn UploadOwner,
    attribute: &str,
    file: &UploadedFile,
) -> String {
    match naming {
        FileNaming::Original => sanitize_filename(file.name()),
        FileNaming::Template(template) => template
            .replace("{id}", &owner.primary_key().join("_"))
            .replace("{attribute}", attribute)
            .replace("{name}", file.token())
            .replace("{ext}", &file.extension()),
        FileNaming::Custom(f) => f(owner, attribute, file),
    }
}

/// Resolve the link of `file` stored for `attribute` of `owner`.
pub fn resolve_link(
    owner: &dyn UploadOwner,
    attribute: &str,
    file: &UploadedFile,
    policy: &PlacementPolicy,
) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(4);

    parts.extend(segment(&policy.model_folder, owner, attribute, file, || {
        camel_to_id(owner.model_name())
    }));
    parts.extend(segment(&policy.shard_folder, owner, attribute, file, || {
        shard_folder(numeric_id(owner))
    }));
    parts.extend(segment(&policy.attribute_folder, owner, attribute, file, || {
        attribute.to_string()
    }));
    parts.push(file_name(&policy.file_name, owner, attribute, file));

    normalize_link(&parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stowage_core::{NamingFn, SegmentFn};

    struct Post {
        id: String,
    }

    impl UploadOwner for Post {
        fn model_name(&self) -> &str {
            "BlogPost"
        }

        fn primary_key(&self) -> Vec<String> {
            vec![self.id.clone()]
        }

        fn attribute(&self, _name: &str) -> Option<String> {
            None
        }

        fn set_attribute(&mut self, _name: &str, _value: String) {}

        fn add_error(&mut self, _attribute: &str, _message: String) {}
    }

    fn upload(name: &str) -> UploadedFile {
        UploadedFile::from_multipart(name, None, b"x")
            .unwrap()
            .with_token("tok")
    }

    #[test]
    fn test_shard_folder_known_values() {
        assert_eq!(shard_folder(0), "0/0/0");
        assert_eq!(shard_folder(1), "0/0/0");
        assert_eq!(shard_folder(500), "0/0/1");
        assert_eq!(shard_folder(250_000), "0/1/0");
        assert_eq!(shard_folder(125_000_000), "1/0/0");
        assert_eq!(shard_folder(125_250_501), "1/1/1");
    }

    #[test]
    fn test_shard_folder_components_bounded() {
        for id in [0u64, 499, 500, 249_999, 250_000, 124_999_999, 987_654_321] {
            let folder = shard_folder(id);
            let parts: Vec<u64> = folder.split('/').map(|p| p.parse().unwrap()).collect();
            assert_eq!(parts.len(), 3);
            assert!(parts[1] < 500, "a out of range for {}", id);
            assert!(parts[2] < 500, "b out of range for {}", id);
            assert_eq!(parts[0], id / 125_000_000);
        }
    }

    #[test]
    fn test_camel_to_id() {
        assert_eq!(camel_to_id("BlogPost"), "blog-post");
        assert_eq!(camel_to_id("User"), "user");
        assert_eq!(camel_to_id("HTMLPage"), "htmlpage");
        assert_eq!(camel_to_id("user_profile"), "user-profile");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my photo's #1?.jpg"), "my-photo-s--1-.jpg");
        assert_eq!(sanitize_filename("a/b\\c&\"d"), "a-b-c--d");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for name in ["plain.txt", "with space.png", "we&ird/\\?#'\".gif", ""] {
            let once = sanitize_filename(name);
            assert_eq!(sanitize_filename(&once), once);
        }
    }

    #[test]
    fn test_normalize_link() {
        assert_eq!(normalize_link("/a//b/./c"), "a/b/c");
        assert_eq!(normalize_link("a\\b\\c.txt"), "a/b/c.txt");
        assert_eq!(normalize_link("a/b/../c"), "a/c");
        assert_eq!(normalize_link("../../x"), "x");
    }

    #[test]
    fn test_resolve_link_default_policy() {
        let post = Post {
            id: "1".to_string(),
        };
        let link = resolve_link(&post, "image", &upload("Photo.JPG"), &PlacementPolicy::default());
        assert_eq!(link, "blog-post/0/0/0/image/1_tok.jpg");
    }

    #[test]
    fn test_resolve_link_is_deterministic() {
        let post = Post {
            id: "250001".to_string(),
        };
        let file = UploadedFile::from_multipart("a.png", None, b"x").unwrap();
        let policy = PlacementPolicy::default();
        assert_eq!(
            resolve_link(&post, "image", &file, &policy),
            resolve_link(&post, "image", &file, &policy)
        );
        assert!(resolve_link(&post, "image", &file, &policy).starts_with("blog-post/0/1/0/image/"));
    }

    #[test]
    fn test_resolve_link_disabled_and_literal_segments() {
        let post = Post {
            id: "7".to_string(),
        };
        let policy = PlacementPolicy::default()
            .with_model_folder(FolderSegment::Literal("media".to_string()))
            .with_shard_folder(FolderSegment::Disabled)
            .with_attribute_folder(FolderSegment::Disabled)
            .with_file_name(FileNaming::Original);
        let link = resolve_link(&post, "doc", &upload("Annual Report.pdf"), &policy);
        assert_eq!(link, "media/Annual-Report.pdf");
    }

    #[test]
    fn test_resolve_link_custom_functions() {
        let post = Post {
            id: "7".to_string(),
        };
        let folder: SegmentFn = Arc::new(|owner, attribute, _| {
            format!("{}-{}", owner.primary_key().join(""), attribute)
        });
        let naming: NamingFn = Arc::new(|_, _, file| format!("custom.{}", file.extension()));
        let policy = PlacementPolicy::default()
            .with_model_folder(FolderSegment::Disabled)
            .with_shard_folder(FolderSegment::Custom(folder))
            .with_file_name(FileNaming::Custom(naming));
        let link = resolve_link(&post, "avatar", &upload("me.PNG"), &policy);
        assert_eq!(link, "7-avatar/avatar/custom.png");
    }

    #[test]
    fn test_resolve_link_template_placeholders() {
        let post = Post {
            id: "3".to_string(),
        };
        let policy = PlacementPolicy::default()
            .with_model_folder(FolderSegment::Disabled)
            .with_shard_folder(FolderSegment::Disabled)
            .with_file_name(FileNaming::Template("{attribute}/{id}-{name}.{ext}".to_string()));
        let link = resolve_link(&post, "cover", &upload("x.Gif"), &policy);
        assert_eq!(link, "cover/cover/3-tok.gif");
    }
}
