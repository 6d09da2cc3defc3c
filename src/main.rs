use seqcache::cli::Args;
use seqcache::config::{self, CacheConfig};
use seqcache::core::cache_events::{FramesFailed, RequestHandled};
use seqcache::core::sequence_cache::{Response, SequenceCache};
use seqcache::utils::{describe_sequence, expand_inputs, format_frame_ranges};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

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
            .as_ref()
            .cloned()
            .unwrap_or_else(|| path_config.config_file("seqcache.log"));

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
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Config file (explicit or from the config directory) with CLI overrides applied
fn resolve_config(args: &Args, path_config: &config::PathConfig) -> Result<CacheConfig> {
    let mut cfg = match &args.config_file {
        Some(path) => CacheConfig::load(path)?,
        None => CacheConfig::load_or_default(&path_config.config_file(config::CONFIG_FILE))?,
    };

    if let Some(n) = args.prefetch {
        cfg.prefetch_radius = n;
    }
    if let Some(n) = args.safe {
        cfg.safe_radius = n;
    }
    if let Some(n) = args.workers {
        cfg.workers = n;
    }
    if let Some(f) = args.mem_fraction {
        cfg.mem_fraction = f;
    }

    cfg.validate().context("Invalid cache settings")?;
    Ok(cfg)
}

fn print_response(frame: usize, path: &Path, response: &Response) {
    match (&response.image, response.dimensions) {
        (Some(image), Some(dims)) => {
            let channels = response
                .metadata
                .as_ref()
                .and_then(|m| m.get("channels"))
                .unwrap_or("?");
            println!(
                "frame {:>5}  {}  {} (decoded {}x{} {:?}, {} channels, {:.1} MB)",
                frame,
                path.display(),
                dims,
                image.width(),
                image.height(),
                image.format(),
                channels,
                image.mem() as f64 / (1024.0 * 1024.0)
            );
        }
        _ => println!("frame {:>5}  {}  <not loaded>", frame, path.display()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = path_config.ensure_dirs() {
        eprintln!("Warning: Failed to create config directory: {}", e);
    }

    init_logging(&args, &path_config)?;
    info!("seqcache {} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let cfg = resolve_config(&args, &path_config)?;
    let timeout = Duration::from_secs(args.timeout_secs);

    let paths = expand_inputs(&args.inputs)?;
    println!("sequence: {} ({} frames)", describe_sequence(&paths), paths.len());

    let mut cache = SequenceCache::with_default_stack(&cfg).context("Failed to start worker pool")?;

    let handled = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&handled);
    cache.event_bus().subscribe::<RequestHandled, _>(move |_| {
        h.fetch_add(1, Ordering::Relaxed);
    });
    cache.event_bus().subscribe::<FramesFailed, _>(|e| {
        for failure in &e.failures {
            eprintln!("failed: {}: {}", failure.path.display(), failure.error);
        }
    });

    cache
        .set_sequence(&paths)
        .context("Failed to read sequence headers")?;

    let frames = if args.frames.is_empty() { vec![0] } else { args.frames.clone() };

    for frame in frames {
        let Some(path) = cache.catalog().descriptor_at(frame).map(|d| d.path().to_path_buf()) else {
            warn!("Frame {} out of range (0..{})", frame, cache.catalog().len());
            println!("frame {:>5}  <out of range>", frame);
            continue;
        };

        let started = Instant::now();
        let mut response = cache.request(&path);
        if response.is_empty() {
            if !cache.wait_idle(timeout) {
                warn!("Timed out after {:?} waiting for frame {}", timeout, frame);
            }
            response = cache.request(&path);
            // A request outside the last window schedules its own load
            if response.is_empty() && cache.wait_idle(timeout) {
                response = cache.request(&path);
            }
        }
        debug!("Frame {} answered in {:.1}ms", frame, started.elapsed().as_secs_f64() * 1000.0);

        print_response(frame, &path, &response);
        println!(
            "             prefetch {}  safe {}",
            cache.prefetch_region(),
            cache.safe_region()
        );
    }

    cache.wait_idle(timeout);
    println!("loads completed: {}", handled.load(Ordering::Relaxed));
    println!("cached frames: {}", format_frame_ranges(&cache.cached_frames()));

    Ok(())
}
