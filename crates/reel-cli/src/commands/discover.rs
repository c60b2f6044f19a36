use reel_core::cache::ReadThroughCache;
use reel_core::db::LocalStore;
use reel_core::metadata::{Availability, CachedMetadata, OfferKind, TitleSummary, TmdbSource};
use reel_core::{ItemKey, SharedState};

use crate::commands::common::{media_kind, open_state, resolve_region, Context};
use crate::error::CliError;

fn cached_metadata(
    ctx: &Context,
    state: &SharedState,
) -> Result<CachedMetadata<TmdbSource, LocalStore>, CliError> {
    let source = TmdbSource::from_config(&ctx.config)?.ok_or(CliError::MetadataNotConfigured)?;
    Ok(CachedMetadata::new(
        source,
        ReadThroughCache::new(state.store().clone()),
        ctx.config.sync.popular_ttl(),
        ctx.config.sync.availability_ttl(),
    ))
}

pub fn format_title_lines(titles: &[TitleSummary]) -> Vec<String> {
    titles
        .iter()
        .map(|title| {
            let year = title
                .release_date
                .as_deref()
                .and_then(|date| date.get(..4))
                .map(|year| format!(" ({year})"))
                .unwrap_or_default();
            format!("{:<12} {}{year}", title.key().to_string(), title.title)
        })
        .collect()
}

pub fn format_provider_lines(availability: &Availability) -> Vec<String> {
    if availability.providers.is_empty() {
        return vec![format!(
            "{} is not available in {}",
            availability.key, availability.region
        )];
    }

    let mut lines = availability
        .providers
        .iter()
        .map(|provider| {
            let offer = match provider.offer {
                OfferKind::Flatrate => "stream",
                OfferKind::Rent => "rent",
                OfferKind::Buy => "buy",
            };
            format!("{offer:<7} {}", provider.name)
        })
        .collect::<Vec<_>>();
    if let Some(link) = &availability.link {
        lines.push(link.clone());
    }
    lines
}

pub async fn run_popular(ctx: &Context, tv: bool, region: Option<String>) -> Result<(), CliError> {
    let state = open_state(&ctx.db_path).await?;
    let region = resolve_region(region, state.read(|document| document.region.clone()))?;
    let metadata = cached_metadata(ctx, &state)?;

    let read = metadata.popular(media_kind(tv), &region).await?;
    if read.is_stale() {
        eprintln!("Metadata source unreachable; showing the last saved list");
    }
    for line in format_title_lines(&read.into_inner()) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_providers(
    ctx: &Context,
    id: u64,
    tv: bool,
    region: Option<String>,
) -> Result<(), CliError> {
    let state = open_state(&ctx.db_path).await?;
    let region = resolve_region(region, state.read(|document| document.region.clone()))?;
    let metadata = cached_metadata(ctx, &state)?;

    let read = metadata
        .availability(ItemKey::new(id, media_kind(tv)), &region)
        .await?;
    if read.is_stale() {
        eprintln!("Metadata source unreachable; showing saved availability");
    }
    for line in format_provider_lines(&read.into_inner()) {
        println!("{line}");
    }
    Ok(())
}
