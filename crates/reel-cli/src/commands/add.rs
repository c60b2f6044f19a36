use reel_core::util::{normalize_text_option, unix_millis_now};
use reel_core::{Document, ItemKey};

use crate::commands::common::{media_kind, open_state, Context};
use crate::error::CliError;

#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub id: u64,
    pub tv: bool,
    pub title: Option<String>,
    pub watched: bool,
    pub favourite: bool,
    pub rating: Option<u8>,
    pub tags: Vec<String>,
}

impl AddOptions {
    pub const fn key(&self) -> ItemKey {
        ItemKey::new(self.id, media_kind(self.tv))
    }
}

/// Record `options` on the item, creating it when needed.
///
/// Watched items leave the watchlist; anything else is queued on it.
pub fn apply_add(document: &mut Document, options: &AddOptions, now_ms: i64) {
    let item = document.item_entry(options.key());

    if let Some(title) = normalize_text_option(options.title.clone()) {
        item.title = Some(title);
    }
    if options.watched {
        item.watched = true;
        item.in_watchlist = false;
        item.watched_at.get_or_insert(now_ms);
    } else if !item.watched {
        item.in_watchlist = true;
    }
    if options.favourite {
        item.favourite = true;
    }
    if let Some(rating) = options.rating {
        item.rating = Some(rating);
    }
    for tag in &options.tags {
        item.add_tag(tag);
    }
}

pub async fn run_add(ctx: &Context, options: &AddOptions) -> Result<(), CliError> {
    if let Some(rating) = options.rating {
        if !(1..=10).contains(&rating) {
            return Err(CliError::InvalidRating(rating));
        }
    }

    let state = open_state(&ctx.db_path).await?;
    let now_ms = unix_millis_now();
    state
        .mutate(|document| apply_add(document, options, now_ms))
        .await?;

    println!("{}", options.key());
    Ok(())
}
