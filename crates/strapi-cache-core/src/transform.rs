//! Rewriting of relative asset URLs in CMS payloads.
//!
//! Strapi reports uploaded media with paths relative to its own host
//! (`/uploads/cover.png`). [`ResponseTransformer`] prefixes those paths with the
//! CMS base URL so consumers can use them directly. Two rewrite modes exist:
//!
//! - [`UrlRewriteMode::UrlKey`]: strings stored under an object key named
//!   `url`, as found in media objects.
//! - [`UrlRewriteMode::MarkdownImage`]: `![alt](/path)` occurrences inside any
//!   string, as found in rich-text fields.
//!
//! Only paths starting with a single `/` are rewritten, which makes the
//! transform idempotent. Traversal uses an explicit stack; nodes nested deeper
//! than [`DEFAULT_MAX_DEPTH`] are left as they are.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

/// Depth below which nested values are not rewritten.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Regex for markdown images with a host-relative path: `![alt](/path)`
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static MARKDOWN_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\((/[^/)\s][^)\s]*)\)").unwrap());

/// Which strings get their URLs rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlRewriteMode {
    /// Values under a key literally named `url`.
    #[default]
    UrlKey,
    /// Markdown image paths inside any string value.
    MarkdownImage,
}

/// Rewrites relative asset URLs into absolute ones.
#[derive(Debug, Clone)]
pub struct ResponseTransformer {
    base_url: String,
    mode: UrlRewriteMode,
    max_depth: usize,
}

impl ResponseTransformer {
    /// Transformer prefixing paths with `base_url` (trailing slashes dropped).
    pub fn new(base_url: impl Into<String>, mode: UrlRewriteMode) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            mode,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Change the nesting limit.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Rewrite mode in use.
    #[must_use]
    pub const fn mode(&self) -> UrlRewriteMode {
        self.mode
    }

    /// Produce a rewritten copy of `value`, leaving the original intact.
    #[must_use]
    pub fn transform(&self, value: &Value) -> Value {
        self.transform_owned(value.clone())
    }

    /// Rewrite a value the caller no longer needs.
    #[must_use]
    pub fn transform_owned(&self, value: Value) -> Value {
        let mut out = value;

        if let Value::String(text) = &mut out {
            if self.mode == UrlRewriteMode::MarkdownImage {
                self.rewrite_markdown(text);
            }
            return out;
        }

        let mut stack: Vec<(&mut Value, usize)> = vec![(&mut out, 0)];
        while let Some((node, depth)) = stack.pop() {
            if depth >= self.max_depth {
                continue;
            }
            match node {
                Value::Object(map) => {
                    for (key, child) in map.iter_mut() {
                        if child.is_object() || child.is_array() {
                            stack.push((child, depth + 1));
                        } else if let Value::String(text) = child {
                            match self.mode {
                                UrlRewriteMode::UrlKey if key == "url" => self.rewrite_path(text),
                                UrlRewriteMode::MarkdownImage => self.rewrite_markdown(text),
                                UrlRewriteMode::UrlKey => {},
                            }
                        }
                    }
                },
                Value::Array(items) => {
                    for child in items.iter_mut() {
                        if child.is_object() || child.is_array() {
                            stack.push((child, depth + 1));
                        } else if let Value::String(text) = child {
                            if self.mode == UrlRewriteMode::MarkdownImage {
                                self.rewrite_markdown(text);
                            }
                        }
                    }
                },
                _ => {},
            }
        }

        out
    }

    fn rewrite_path(&self, text: &mut String) {
        if is_host_relative(text) {
            text.insert_str(0, &self.base_url);
        }
    }

    fn rewrite_markdown(&self, text: &mut String) {
        if text.is_empty() || !text.contains("![") {
            return;
        }
        let rewritten = MARKDOWN_IMAGE_RE.replace_all(text, |caps: &Captures<'_>| {
            format!("![{}]({}{})", &caps[1], self.base_url, &caps[2])
        });
        if let std::borrow::Cow::Owned(updated) = rewritten {
            *text = updated;
        }
    }
}

fn is_host_relative(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}
