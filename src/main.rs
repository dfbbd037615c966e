mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cli::Cli;
use sinegraph::audio::decode::load_track;
use sinegraph::audio::mixer::Mixer;
use sinegraph::config::{self, Config, TrackConfig};
use sinegraph::pipeline::Pipeline;
use sinegraph::plot::mapper::PlotSettings;
use sinegraph::plot::visualizer::{PlotPath, Visualizer};
use sinegraph::spectrum::Presenter;

#[derive(Serialize)]
struct PathRecord<'a> {
    layer: usize,
    #[serde(flatten)]
    path: &'a PlotPath,
}

struct PathSink {
    writer: BufWriter<File>,
    written: usize,
}

impl PathSink {
    fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    fn poll_layers(&mut self, layers: &[Arc<Visualizer>], clock: Duration) -> Result<()> {
        for (layer, visualizer) in layers.iter().enumerate() {
            if let Some(path) = visualizer.poll(clock) {
                serde_json::to_writer(&mut self.writer, &PathRecord { layer, path: &path })?;
                self.writer.write_all(b"\n")?;
                self.written += 1;
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<usize> {
        self.writer.flush().context("Failed to flush output file")?;
        Ok(self.written)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Explicit --config path, or sinegraph.toml here, or the user config dir
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("sinegraph.toml");
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("sinegraph").join("config.toml"))
            .filter(|path| path.exists())
    });
    let mut cfg = Config::default();
    if let Some(ref path) = config_path {
        if let Some(loaded) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            cfg = loaded;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    // CLI values win unless they are still at their defaults
    if cli.sample_rate != 44100 {
        cfg.session.sample_rate = cli.sample_rate;
    }
    if cli.buffer_frames != 220 {
        cfg.session.buffer_frames = cli.buffer_frames;
    }
    if cli.fft_size.is_some() {
        cfg.analyzer.fft_size = cli.fft_size;
    }
    if !cli.analysis_tracks.is_empty() {
        cfg.analyzer.tracks = std::mem::take(&mut cli.analysis_tracks);
    }
    if !cli.tracks.is_empty() {
        cfg.tracks = std::mem::take(&mut cli.tracks)
            .into_iter()
            .map(TrackConfig::from_path)
            .collect();
    }
    if cfg.tracks.is_empty() {
        anyhow::bail!("No tracks given. Pass audio files or list [[tracks]] in the config.");
    }
    if cfg.visualizers.is_empty() {
        cfg.visualizers = config::default_visualizers();
    }

    log::info!("sinegraph - looping spectrum plotter");
    log::info!("Session: {}Hz, {} frames per buffer", cfg.session.sample_rate, cfg.session.buffer_frames);

    // 1. Load tracks; failures play silence
    let mut failed = 0;
    let tracks = cfg
        .tracks
        .iter()
        .map(|track| {
            let (track, err) = load_track(track, cfg.session.sample_rate);
            if err.is_some() {
                failed += 1;
            }
            track
        })
        .collect::<Vec<_>>();
    if failed > 0 {
        log::warn!("{} of {} tracks failed to load", failed, tracks.len());
    }

    // 2. Wire the pipeline
    let Pipeline {
        mixer,
        handle,
        presenters,
    } = Pipeline::new(&cfg.session, &cfg.analyzer, tracks)?;

    // 3. Visualizer layers, each following one analysed track
    let mut layers: Vec<Arc<Visualizer>> = Vec::with_capacity(cfg.visualizers.len());
    for (index, v) in cfg.visualizers.iter().enumerate() {
        let presenter = presenters
            .get(v.track)
            .and_then(Option::as_ref)
            .with_context(|| format!("Visualizer {} follows track {}, which is not analysed", index, v.track))?;
        let settings = PlotSettings {
            min_frequency: v.min_frequency,
            max_frequency: v.max_frequency,
            ..cfg.plot.settings.clone()
        };
        let layer = Arc::new(
            Visualizer::new(settings, cfg.plot.viewport, v.shape, v.delay())
                .with_context(|| format!("Invalid visualizer {}", index))?,
        );
        log::debug!(
            "Layer {}: track {}, {:?}, {}ms behind",
            index,
            v.track,
            layer.shape(),
            layer.delay().as_millis()
        );
        presenter.add_listener(&layer);
        layers.push(layer);
    }
    log::info!("{} visualizer layers", layers.len());

    let mut sink = PathSink::create(&cli.output)?;
    let duration = Duration::from_secs_f32(cli.seconds.max(0.0));

    // 4. Run the host clock
    handle.play();
    if cli.live {
        run_live(mixer, &cfg, &presenters, &layers, &mut sink, duration)?;
    } else {
        run_offline(mixer, &cfg, &presenters, &layers, &mut sink, duration)?;
    }
    handle.pause();

    for (track, presenter) in presenters.iter().enumerate() {
        if let Some(presenter) = presenter {
            let stats = presenter.bus().stats();
            log::info!(
                "Track {} spectra: {} published, {} superseded, {} dropped",
                track,
                stats.published,
                stats.superseded,
                stats.dropped
            );
        }
    }

    let written = sink.finish()?;
    log::info!("Done! {} paths written to {}", written, cli.output.display());
    Ok(())
}

fn pump_all(presenters: &[Option<Presenter>]) {
    for presenter in presenters.iter().flatten() {
        presenter.pump();
    }
}

fn run_offline(
    mut mixer: Mixer,
    cfg: &Config,
    presenters: &[Option<Presenter>],
    layers: &[Arc<Visualizer>],
    sink: &mut PathSink,
    duration: Duration,
) -> Result<()> {
    let sample_rate = cfg.session.sample_rate;
    let block = cfg.session.buffer_frames;
    let total_frames = (duration.as_secs_f64() * sample_rate as f64).ceil() as u64;
    let total_blocks = total_frames.div_ceil(block as u64);

    let pb = ProgressBar::new(total_blocks);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} buffers ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let mut left = vec![0.0f32; block];
    let mut right = vec![0.0f32; block];
    for index in 0..total_blocks {
        mixer.render(&mut left, &mut right)?;
        let clock = Duration::from_secs_f64(((index + 1) * block as u64) as f64 / sample_rate as f64);
        pump_all(presenters);
        sink.poll_layers(layers, clock)?;
        pb.set_position(index + 1);
    }

    pb.finish_with_message("Rendering complete");
    Ok(())
}

#[cfg(feature = "playback")]
fn run_live(
    mixer: Mixer,
    cfg: &Config,
    presenters: &[Option<Presenter>],
    layers: &[Arc<Visualizer>],
    sink: &mut PathSink,
    duration: Duration,
) -> Result<()> {
    let stream = sinegraph::audio::playback::OutputStream::start(mixer, cfg.session.sample_rate)?;
    log::info!("Playing for {:.1}s at {}Hz", duration.as_secs_f32(), stream.sample_rate());

    let started = std::time::Instant::now();
    while started.elapsed() < duration {
        std::thread::sleep(Duration::from_millis(16));
        pump_all(presenters);
        sink.poll_layers(layers, started.elapsed())?;
    }
    drop(stream);
    Ok(())
}

#[cfg(not(feature = "playback"))]
fn run_live(
    _mixer: Mixer,
    _cfg: &Config,
    _presenters: &[Option<Presenter>],
    _layers: &[Arc<Visualizer>],
    _sink: &mut PathSink,
    _duration: Duration,
) -> Result<()> {
    anyhow::bail!(
        "Live playback requires the 'playback' feature. \
         Rebuild with: cargo build --features playback"
    );
}
