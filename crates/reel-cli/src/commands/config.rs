use reel_core::util::normalize_text_option;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            relay_table,
            metadata_base_url,
            metadata_api_key,
            user_id,
            no_activate,
        } => {
            let updates = CliProfile {
                supabase_url,
                supabase_anon_key,
                relay_table,
                metadata_base_url,
                metadata_api_key,
                user_id,
            };
            run_config_init(profile.as_deref().or(global_profile), updates, no_activate)
        }
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
    }
}

/// Layer the values given on the command line over an existing profile
pub fn merge_profile(existing: &CliProfile, updates: CliProfile) -> CliProfile {
    CliProfile {
        supabase_url: normalize_text_option(updates.supabase_url)
            .or_else(|| existing.supabase_url.clone()),
        supabase_anon_key: normalize_text_option(updates.supabase_anon_key)
            .or_else(|| existing.supabase_anon_key.clone()),
        relay_table: normalize_text_option(updates.relay_table)
            .or_else(|| existing.relay_table.clone()),
        metadata_base_url: normalize_text_option(updates.metadata_base_url)
            .or_else(|| existing.metadata_base_url.clone()),
        metadata_api_key: normalize_text_option(updates.metadata_api_key)
            .or_else(|| existing.metadata_api_key.clone()),
        user_id: normalize_text_option(updates.user_id).or_else(|| existing.user_id.clone()),
    }
}

/// Settings a profile still needs before `reel sync` can reach Supabase
pub fn missing_sync_fields(profile: &CliProfile) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if profile.supabase_url.is_none() {
        missing.push("supabase_url");
    }
    if profile.supabase_anon_key.is_none() {
        missing.push("supabase_anon_key");
    }
    if profile.user_id().is_none() {
        missing.push("user_id");
    }
    missing
}

fn run_config_init(
    profile_name: Option<&str>,
    updates: CliProfile,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(&existing, updates);
    merged
        .client_config()
        .normalized()
        .map_err(CliError::Config)?;
    *config.profile_mut_or_default(&profile_name) = merged.clone();

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let missing = missing_sync_fields(&merged);
    if missing.is_empty() {
        println!(
            "Profile '{profile_name}' is ready to sync. Set REEL_ACCESS_TOKEN and run `reel sync`."
        );
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing.join(", ")
        );
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct ProfileView {
    profile: String,
    active: bool,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    relay_table: String,
    metadata_base_url: Option<String>,
    metadata_api_key: Option<String>,
    user_id: Option<String>,
}

/// Keep the first four characters of a secret
pub fn redact(secret: Option<&str>) -> Option<String> {
    secret.map(|secret| {
        let visible = secret.chars().take(4).collect::<String>();
        format!("{visible}****")
    })
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();
    let client = profile.client_config();

    let view = ProfileView {
        active: config.active_profile.as_deref() == Some(profile_name.as_str()),
        supabase_url: profile.supabase_url.clone(),
        supabase_anon_key: redact(profile.supabase_anon_key.as_deref()),
        relay_table: client.relay_table(),
        metadata_base_url: profile.metadata_base_url.clone(),
        metadata_api_key: redact(profile.metadata_api_key.as_deref()),
        user_id: profile.user_id(),
        profile: profile_name,
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
