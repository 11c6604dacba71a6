use framefetch::cli::Args;
use framefetch::config::{self, PrefetchConfig};
use framefetch::core::{
    CacheManager, Collaborators, GlobalFrameCache, PlaybackState, Prefetcher, StartOutcome,
};
use framefetch::entities::{
    CacheTypes, Element, ElementGraphBuilder, GraphBuilder, RenderContext, Renderer,
    SharedTimeline, Timeline, UiState,
};
use framefetch::sim::SimulatedRenderer;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

const OUTPUT_SIZE: (u32, u32) = (320, 180);
const TICK: Duration = Duration::from_millis(5);
const REPORT_EVERY: Duration = Duration::from_millis(250);

fn init_logging(args: &Args, path_config: &config::PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Respects RUST_LOG if set
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(log_level.as_str().to_lowercase()),
        )
        .format_timestamp_millis()
        .init();
    }
    Ok(())
}

/// Background plate across the whole timeline, the rest staggered on top
fn build_timeline(frames: u32, elements: u32) -> SharedTimeline {
    let end = frames as f32;
    let timeline = SharedTimeline::new(end);
    timeline.push_element(Element::new("plate", 0.0, end));

    let layers = elements.saturating_sub(1);
    for i in 0..layers {
        let start = end * i as f32 / (layers + 1) as f32;
        let length = (end / 2.0).max(1.0);
        timeline.push_element(
            Element::new(format!("layer{}", i + 1), start, (start + length).min(end))
                .on_channel(i + 1),
        );
    }
    timeline
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }
    init_logging(&args, &path_config)?;

    info!("framefetch starting...");
    debug!("Command-line args: {:?}", args);

    let config_path = config::config_file(config::CONFIG_FILE, &path_config);
    info!("Config path: {}", config_path.display());
    let mut prefetch_config = PrefetchConfig::load(&config_path).unwrap_or_else(|e| {
        warn!("{:#}, using defaults", e);
        PrefetchConfig::default()
    });
    if let Some(capacity) = args.capacity {
        prefetch_config.cache_capacity = capacity;
    }

    // Collaborators
    let shared_timeline = Arc::new(build_timeline(args.frames, args.elements));
    let timeline: Arc<dyn Timeline> = shared_timeline.clone();
    let manager = Arc::new(CacheManager::new(
        prefetch_config.mem_fraction,
        prefetch_config.reserve_gb,
    ));
    let cache = Arc::new(GlobalFrameCache::new(prefetch_config.cache_capacity, manager));
    let render_cost = Duration::from_millis(args.render_ms);
    let renderer = Arc::new(SimulatedRenderer::new(render_cost).with_cache(cache.clone()));
    let graphs = Arc::new(ElementGraphBuilder::new());
    let playback = Arc::new(PlaybackState::new(args.fps));
    let mut loops_left = args.loops.unwrap_or(0);
    playback.set_loop(loops_left > 0);

    let mut prefetcher = Prefetcher::new(
        Collaborators {
            graphs: graphs.clone(),
            renderer: renderer.clone(),
            cache: cache.clone(),
            ui: playback.clone(),
        },
        prefetch_config,
    );

    // Foreground side: its own graph, renders on cache misses during playback
    let context = RenderContext::new(timeline.uuid(), OUTPUT_SIZE.0, OUTPUT_SIZE.1);
    let mut foreground = graphs.build(timeline.as_ref(), "render");
    let estimated_cost = render_cost.as_secs_f32() * playback.fps();

    let started = Instant::now();
    let play_at = args.play.map(|s| Duration::from_secs_f32(s.max(0.0)));
    let mut last_report = Instant::now();
    let mut played = false;
    let mut last_frame = timeline.current_frame();

    loop {
        if let Some(at) = play_at
            && !played
            && started.elapsed() >= at
        {
            info!("Playback starting at frame {}", timeline.current_frame());
            playback.play();
            played = true;
        }

        // Done once the worker finished (or is parked on a full cache) and no
        // playback is outstanding
        let id = timeline.uuid();
        let settled = prefetcher.job(id).is_some_and(|job| !job.is_running() || job.is_waiting());
        let playback_pending = play_at.is_some() && (!played || playback.is_playing());
        if settled && !playback_pending {
            break;
        }

        if let Some(frame) = playback.update(&shared_timeline) {
            if frame < last_frame {
                loops_left = loops_left.saturating_sub(1);
                info!("Playback wrapped, {} loop(s) left", loops_left);
                if loops_left == 0 {
                    playback.set_loop(false);
                }
            }
            last_frame = frame;
            cache.set_playhead(timeline.uuid(), frame);
            if cache.get(timeline.uuid(), frame, CacheTypes::FINAL_OUT).is_none() {
                foreground.evaluate(frame);
                if let Err(e) = renderer.render(&context, &foreground.evaluated_scene(), frame) {
                    debug!("Foreground render failed at {}: {}", frame, e);
                }
            }
        }

        let cursor = timeline.current_frame();
        match prefetcher.start_or_resume(&timeline, &context, cursor, estimated_cost) {
            Ok(StartOutcome::Started) => debug!("Prefetch (re)started at {}", cursor),
            Ok(_) => {}
            Err(e) => warn!("{}", e),
        }

        if last_report.elapsed() >= REPORT_EVERY {
            last_report = Instant::now();
            if let Some((start, end)) = prefetcher.time_range(timeline.uuid()) {
                println!(
                    "t={:>6.2}s playhead={:>5} window=[{}, {}) cached={} running={} waiting={}",
                    started.elapsed().as_secs_f32(),
                    cursor,
                    start,
                    end,
                    cache.timeline_len(timeline.uuid()),
                    prefetcher.is_running(timeline.uuid()),
                    prefetcher.is_waiting(timeline.uuid()),
                );
            }
        }

        std::thread::sleep(TICK);
    }

    prefetcher.stop(timeline.uuid());
    let stats = cache.stats();
    let job = prefetcher.job(timeline.uuid());
    println!("--- framefetch summary ---");
    println!(
        "prefetched frames: {}",
        job.map_or(0, |j| j.frames_rendered())
    );
    println!("worker threads:    {}", job.map_or(0, |j| j.threads_spawned()));
    println!("last exit:         {:?}", job.and_then(|j| j.last_exit()));
    println!(
        "cache:             {} entries, {} KB",
        cache.len(),
        cache.manager().usage() / 1024
    );
    println!(
        "playback hits:     {} / {} ({:.0}%), recycled {}",
        stats.hits(),
        stats.hits() + stats.misses(),
        stats.hit_rate() * 100.0,
        stats.recycled()
    );

    prefetcher.free(timeline.uuid());
    info!("framefetch done in {:.2}s", started.elapsed().as_secs_f32());
    Ok(())
}
