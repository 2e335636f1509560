//! Rewrites site-internal Markdown links into absolute URLs.
//!
//! Documentation sources often link to sibling pages by their repository
//! path (`[Setup](/docs/guide/setup.md#install)`). Those targets are
//! meaningless inside a standalone DOCX, so they are pointed at the published
//! site instead: `[Setup](https://docs.example.com/v1/setup#install)`.

use once_cell::sync::Lazy;
use regex::Regex;

/// `(/…/<name>.md#<fragment>)` with an optional fragment. Group 1 is the page
/// name, group 2 the fragment including its `#`. No part may contain
/// parentheses or whitespace, so a match never spans two link targets.
static INTERNAL_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(/(?:[^()\s]*/)?([^/()\s]*?)\.md(#[^()\s]*)?\)").unwrap()
});

/// Rewrite every root-relative `.md` link target in `text` to
/// `<base_url>/<name><fragment>`.
///
/// Trailing slashes on `base_url` are ignored. Links that do not start with
/// `/` or do not end in `.md` (plus optional fragment) are left untouched.
pub fn rewrite_internal_links(text: &str, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    INTERNAL_LINK_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = caps.get(1).map_or("", |m| m.as_str());
            let fragment = caps.get(2).map_or("", |m| m.as_str());
            format!("({base}/{name}{fragment})")
        })
        .into_owned()
}
