//! RSS 2.0 feed of the most recent posts

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use rss::{ChannelBuilder, GuidBuilder, Item, ItemBuilder};

use crate::config::FeedConfig;
use crate::error::Result;
use crate::store::ContentStore;
use crate::types::Post;

pub const CONTENT_TYPE: &str = "application/rss+xml";

lazy_static! {
    static ref URL_REGEX: Regex = Regex::new(r"https?://\S+").unwrap();
}

/// Wrap every plain-text URL in an anchor
///
/// A single trailing period is treated as sentence punctuation and kept
/// outside the link. The URL is HTML-escaped inside the anchor. Text
/// without URLs is returned unchanged.
pub fn linkify(text: &str) -> String {
    URL_REGEX
        .replace_all(text, |caps: &Captures| {
            let matched = &caps[0];
            let (url, period) = match matched.strip_suffix('.') {
                Some(url) => (url, "."),
                None => (matched, ""),
            };
            let url = escape_html(url);
            format!("<a href=\"{}\">{}</a>{}", url, url, period)
        })
        .into_owned()
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub struct FeedRenderer {
    store: Arc<dyn ContentStore>,
    config: FeedConfig,
}

impl FeedRenderer {
    pub fn new(store: Arc<dyn ContentStore>, config: FeedConfig) -> Self {
        Self { store, config }
    }

    /// Read the most recent posts and serialize them as RSS 2.0 XML
    pub async fn render(&self) -> Result<String> {
        let posts = self.store.recent(self.config.limit).await?;
        tracing::debug!(count = posts.len(), "Rendering feed");
        Ok(self.render_posts(&posts))
    }

    /// Serialize `posts` in the order given
    pub fn render_posts(&self, posts: &[Post]) -> String {
        let items: Vec<Item> = posts.iter().map(|post| self.item(post)).collect();

        let channel = ChannelBuilder::default()
            .title(self.config.title.clone())
            .link(self.config.link.clone())
            .description(self.config.description.clone())
            .copyright(Some(self.config.copyright.clone()))
            .generator(Some(concat!("crosspost ", env!("CARGO_PKG_VERSION")).to_string()))
            .last_build_date(posts.first().map(|p| p.created_at.to_rfc2822()))
            .items(items)
            .build();

        channel.to_string()
    }

    fn item(&self, post: &Post) -> Item {
        let link = format!(
            "{}/{}",
            self.config.permalink_base.trim_end_matches('/'),
            post.id
        );
        let guid = GuidBuilder::default()
            .value(link.clone())
            .permalink(true)
            .build();

        ItemBuilder::default()
            .title(Some(post.content.clone()))
            .link(Some(link))
            .guid(Some(guid))
            .description(Some(linkify(&post.content)))
            .pub_date(Some(post.created_at.to_rfc2822()))
            .build()
    }
}
