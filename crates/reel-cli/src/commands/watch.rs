use std::sync::Arc;
use std::time::Duration;

use reel_core::state::{ChangeOrigin, StateChange};
use reel_core::sync::{MemoryRelay, Relay};
use tokio::time::Instant;

use crate::cli::RelayKind;
use crate::commands::common::{
    build_supabase_relay, format_timestamp, identity_for, open_state, start_engine, Context,
};
use crate::error::CliError;

pub async fn run_watch(ctx: &Context, relay: RelayKind, seconds: Option<u64>) -> Result<(), CliError> {
    let deadline = seconds.map(|seconds| Instant::now() + Duration::from_secs(seconds));
    match relay {
        RelayKind::Memory => watch_with(ctx, relay, Arc::new(MemoryRelay::new()), deadline).await,
        RelayKind::Supabase => {
            let supabase = build_supabase_relay(&ctx.config)?;
            watch_with(ctx, relay, Arc::new(supabase), deadline).await
        }
    }
}

pub fn describe_change(change: &StateChange, items: usize) -> String {
    let source = match change.origin {
        ChangeOrigin::Loaded => "loaded from disk",
        ChangeOrigin::Local => "edited on this device",
        ChangeOrigin::Remote => "updated from another device",
    };
    format!(
        "Collection {source}: {items} items (marker {})",
        format_timestamp(change.marker)
    )
}

async fn watch_with<R: Relay>(
    ctx: &Context,
    kind: RelayKind,
    relay: Arc<R>,
    deadline: Option<Instant>,
) -> Result<(), CliError> {
    let identity = identity_for(ctx, kind)?;
    let state = open_state(&ctx.db_path).await?;
    let mut changes = state.subscribe();
    let mut engine = start_engine(relay, state.clone(), identity, ctx.config.sync.clone()).await?;
    let mut status = engine.status();

    println!(
        "Watching as device {} (Ctrl-C to stop)",
        engine.device_id()
    );
    println!("{}", *status.borrow_and_update());

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            () = sleep_until(deadline) => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                println!("{current}");
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let change = *changes.borrow_and_update();
                let items = state.read(|document| document.items.len());
                println!("{}", describe_change(&change, items));
            }
        }
    }

    engine.stop();
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
