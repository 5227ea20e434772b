//! Fight Arena headless runner
//!
//! Loads settings, connects to the training service if it answers, and runs
//! one all-AI bout recording the first fighter until a champion remains or
//! the tick limit is reached.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fight_arena::backend::{ArenaBackend, HttpBackend, OfflineBackend};
use fight_arena::consts::FRAME_DT;
use fight_arena::sim::{ArenaPhase, FrameClock, TickInput};
use fight_arena::{Arena, ArenaSettings};

/// Used when the asset listing is unavailable
const DEFAULT_ROSTER: [&str; 6] = [
    "Insert-GLBS/Big+Bob.glb",
    "Insert-GLBS/Rex.glb",
    "Insert-GLBS/Iron+Mae.glb",
    "Insert-GLBS/Kid+Vortex.glb",
    "Insert-GLBS/Saber.glb",
    "Insert-GLBS/Mongo.glb",
];

/// Fighter recorded by the bout
const RECORDED_FIGHTER: u32 = 1;

fn main() {
    env_logger::init();
    log::info!("Fight Arena (headless) starting...");

    let mut settings = ArenaSettings::load_or_default(ArenaSettings::FILE_NAME);
    settings.apply_env();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start the async runtime: {e}");
            std::process::exit(1);
        }
    };

    let backend: Arc<dyn ArenaBackend> = match HttpBackend::new(&settings) {
        Ok(http) => {
            log::info!("Training service at {}", http.base_url());
            Arc::new(http)
        }
        Err(e) => {
            log::warn!("HTTP client unavailable ({e}); running offline");
            Arc::new(OfflineBackend)
        }
    };

    let request_timeout = Duration::from_millis(settings.request_timeout_ms);
    let roster = load_roster(&runtime, backend.as_ref(), request_timeout);
    log_profiles(&runtime, backend.as_ref(), request_timeout);

    let mut arena = Arena::new(
        settings.clone(),
        backend.clone(),
        runtime.handle().clone(),
        &roster,
    );
    arena.connect();
    if let Err(e) = arena.start_episode(RECORDED_FIGHTER) {
        log::warn!("Bout will not be recorded: {e}");
    }

    let input = TickInput::default();
    let mut pacer = FrameClock::new();
    let started = Instant::now();
    while arena.state().phase == ArenaPhase::Fighting
        && arena.state().clock.frame < settings.max_ticks
    {
        let dt = if settings.realtime {
            std::thread::sleep(Duration::from_secs_f32(FRAME_DT));
            pacer.measure()
        } else {
            FRAME_DT
        };
        arena.step(&input, dt);
    }

    let state = arena.state();
    match state.phase {
        ArenaPhase::Victory { champion } => {
            let name = state.fighter(champion).map_or("?", |f| f.name.as_str());
            log::info!(
                "{name} (#{champion}) wins after {} ticks ({:.1}s wall time)",
                state.clock.frame,
                started.elapsed().as_secs_f32()
            );
        }
        ArenaPhase::Draw => log::info!("Draw after {} ticks", state.clock.frame),
        ArenaPhase::Fighting => log::info!(
            "No champion after {} ticks; {} fighters still standing",
            state.clock.frame,
            state.active_count()
        ),
    }

    // Let the completion and the stats request land
    for _ in 0..30 {
        std::thread::sleep(Duration::from_millis(20));
        arena.poll();
    }
    runtime.shutdown_timeout(Duration::from_secs(2));
}

/// Fighter assets from the listing endpoint, or the built-in roster
fn load_roster(
    runtime: &tokio::runtime::Runtime,
    backend: &dyn ArenaBackend,
    timeout: Duration,
) -> Vec<String> {
    let listing =
        runtime.block_on(async { tokio::time::timeout(timeout, backend.list_assets()).await });
    match listing {
        Ok(Ok(assets)) if !assets.is_empty() => {
            log::info!("Loaded {} fighter assets", assets.len());
            assets
        }
        Ok(Ok(_)) => {
            log::info!("No fighter assets listed; using the built-in roster");
            DEFAULT_ROSTER.iter().map(|s| s.to_string()).collect()
        }
        Ok(Err(e)) => {
            log::info!("Asset listing unavailable ({e}); using the built-in roster");
            DEFAULT_ROSTER.iter().map(|s| s.to_string()).collect()
        }
        Err(_) => {
            log::info!("Asset listing timed out; using the built-in roster");
            DEFAULT_ROSTER.iter().map(|s| s.to_string()).collect()
        }
    }
}

fn log_profiles(runtime: &tokio::runtime::Runtime, backend: &dyn ArenaBackend, timeout: Duration) {
    let listing = runtime.block_on(async {
        tokio::time::timeout(timeout, backend.list_profiles(RECORDED_FIGHTER)).await
    });
    if let Ok(Ok(profiles)) = listing {
        let names: Vec<&str> = profiles.iter().map(|p| p.profile_name.as_str()).collect();
        log::info!("Available profiles: {}", names.join(", "));
    }
}
