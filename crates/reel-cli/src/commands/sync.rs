use std::sync::Arc;

use reel_core::sync::{MemoryRelay, Relay, SessionState};

use crate::cli::{RelayKind, SyncCommands};
use crate::commands::common::{
    build_supabase_relay, identity_for, open_state, start_engine, Context,
};
use crate::error::CliError;

pub async fn run_sync(
    ctx: &Context,
    command: Option<SyncCommands>,
    relay: RelayKind,
) -> Result<(), CliError> {
    match command {
        Some(SyncCommands::Enable) => set_sync_enabled(ctx, true).await,
        Some(SyncCommands::Disable) => set_sync_enabled(ctx, false).await,
        None => match relay {
            RelayKind::Memory => sync_once(ctx, relay, Arc::new(MemoryRelay::new())).await,
            RelayKind::Supabase => {
                let supabase = build_supabase_relay(&ctx.config)?;
                sync_once(ctx, relay, Arc::new(supabase)).await
            }
        },
    }
}

async fn set_sync_enabled(ctx: &Context, enabled: bool) -> Result<(), CliError> {
    let state = open_state(&ctx.db_path).await?;
    state.set_sync_enabled(enabled).await?;
    if enabled {
        println!("Sync turned on for this device");
    } else {
        println!("Sync turned off for this device; edits stay local");
    }
    Ok(())
}

async fn sync_once<R: Relay>(ctx: &Context, kind: RelayKind, relay: Arc<R>) -> Result<(), CliError> {
    let identity = identity_for(ctx, kind)?;
    let state = open_state(&ctx.db_path).await?;
    let mut engine = start_engine(relay, state.clone(), identity, ctx.config.sync.clone()).await?;

    let started = engine.wait_until_started().await;
    let outcome = if started == SessionState::Ready {
        engine.sync_now().await
    } else {
        started
    };
    engine.stop();

    println!("{outcome}");
    if let SessionState::Error(_) = outcome {
        return Err(CliError::Sync(outcome.to_string()));
    }

    let (document, marker) = state.snapshot();
    println!(
        "{} items, local marker {}",
        document.items.len(),
        marker
    );
    Ok(())
}
