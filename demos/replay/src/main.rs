//! Replays a scripted PHP debug session through the data cache.
//!
//! Run with: cargo run -p replay-demo
//!
//! Set `DBGP_PROXY_CONFIG` to a JSON file to override the cache
//! configuration, and `RUST_LOG=debug` to see every request.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use dbgp_proxy_cache::{DataCache, engine::ScriptedEngine};
use dbgp_proxy_core::{
    CacheConfig, EngineStatus,
    types::{EngineContext, EvaluationResult, PropertyEncoding, RawProperty, RawValue},
};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match std::env::var_os("DBGP_PROXY_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            CacheConfig::load(&path)
                .with_context(|| format!("loading config from {}", path.display()))?
        }
        None => CacheConfig::default(),
    };

    let engine = Arc::new(script_engine());
    let cache = DataCache::with_dbgp_converter(Arc::clone(&engine), &config);
    tracing::info!(session_id = %cache.session_id(), "session started");

    // Statuses as they would be parsed off the engine socket.
    let statuses = futures::stream::iter(["starting", "break"].map(str::parse::<EngineStatus>));
    engine.status_emitter().spawn_forwarder(statuses).await?;

    let scopes = cache.get_scopes_for_frame(0).await?;
    print_json("scopes", &scopes)?;

    let locals = cache.get_properties(&scopes[0].object_id).await?;
    print_json("locals", &locals)?;

    let rows = locals
        .iter()
        .find(|p| p.name == "$rows")
        .and_then(|p| p.value.object_id.clone())
        .context("$rows has no reference")?;
    let ranges = cache.get_properties(&rows).await?;
    print_json("$rows ranges", &ranges)?;

    let first_page = ranges
        .first()
        .and_then(|p| p.value.object_id.clone())
        .context("$rows has no ranges")?;
    print_json("$rows[0..31]", &cache.get_properties(&first_page).await?)?;

    let evaluated = cache.evaluate_on_call_frame(0, "$user").await?;
    print_json("evaluate $user", &evaluated)?;
    if let Some(user) = &evaluated.result.object_id {
        print_json("$user properties", &cache.get_properties(user).await?)?;
    }

    engine.emit_status(EngineStatus::Running);
    match cache.get_properties(&scopes[0].object_id).await {
        Err(e) if e.is_benign() => tracing::info!("after resume: {e}"),
        other => anyhow::bail!("expected the scope to be unavailable after resume, got {other:?}"),
    }

    cache.dispose();
    Ok(())
}

fn print_json<T: Serialize>(label: &str, value: &T) -> anyhow::Result<()> {
    println!("== {label}\n{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn script_engine() -> ScriptedEngine {
    let engine = ScriptedEngine::new();
    engine.set_contexts(
        0,
        vec![
            EngineContext::new("Locals", "0"),
            EngineContext::new("Superglobals", "1"),
            EngineContext::new("User defined constants", "2"),
        ],
    );

    let user = RawProperty {
        classname: Some("App\\User".to_string()),
        ..RawProperty::collection("$user", "$user", "object", 2)
    };
    engine.set_context_properties(
        0,
        "0",
        vec![
            RawProperty::scalar("$count", "int", "120"),
            RawProperty {
                encoding: PropertyEncoding::Base64,
                ..RawProperty::scalar("$greeting", "string", "aGVsbG8gd29ybGQ=")
            },
            RawProperty {
                pagesize: Some(32),
                ..RawProperty::collection("$rows", "$rows", "array", 120)
            },
            user.clone(),
        ],
    );

    let rows = (0..32)
        .map(|i| RawProperty {
            fullname: Some(format!("$rows[{i}]")),
            ..RawProperty::scalar(&i.to_string(), "int", &(i * i).to_string())
        })
        .collect();
    engine.set_page(0, "0", "$rows", 0, rows);
    engine.set_page(
        0,
        "0",
        "$user",
        0,
        vec![
            RawProperty::scalar("name", "string", "ann"),
            RawProperty::scalar("email", "string", "ann@example.com"),
        ],
    );

    engine.set_evaluation(
        0,
        "$user",
        EvaluationResult {
            result: RawValue::Property(user),
            was_thrown: false,
        },
    );
    engine
}
