mod audio;
mod cli;
mod config;
mod dsp;
mod element;
mod encode;
mod error;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::Path;

use audio::adapter::{FrameClock, SampleAdapter};
use audio::pcm::{PcmBuffer, PcmFormat};
use audio::source::{open_source, PcmSource};
use cli::{Cli, Element};
use config::Config;
use dsp::{AudioProcessor, ProcessorUpdate};
use element::template::{default_template, load_template};
use element::{EventEmitter, SpectrogramScope};
use encode::events::EventWriter;
use encode::ffmpeg::FfmpegEncoder;
use render::frame::VideoFrame;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut cfg = match config::discover_config(cli.config.clone()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) => {
                log::warn!("Failed to load config from {}: {:#}", path.display(), err);
                Config::default()
            }
        },
        None => Config::default(),
    };
    cli.apply(&mut cfg);
    cfg.input.validate()?;

    let raw = cli
        .is_raw()
        .then(|| PcmFormat::new(cfg.input.rate, cfg.input.channels));
    if raw.is_none() && !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("onsetscope - spectral onset detection");
    log::info!("Input: {}", cli.input.display());

    let mut source = open_source(&cli.input, raw)?;
    let format = source.format();
    format.validate().context("Unsupported input format")?;

    match cli.element {
        Element::Events => run_events(&cfg, source.as_mut()),
        Element::Scope => {
            let audio = raw.is_none().then_some(cli.input.as_path());
            run_scope(&cfg, source.as_mut(), audio)
        }
    }
}

/// Stream buffers through the event emitter and print each event as it is
/// produced.
fn run_events(cfg: &Config, source: &mut dyn PcmSource) -> Result<()> {
    cfg.emitter.validate()?;
    let format = source.format();
    let mut emitter = EventEmitter::new(cfg.emitter.clone(), format)?;

    let stdout = io::stdout();
    let mut writer = EventWriter::new(stdout.lock(), cfg.output.format);
    let mut samples = Vec::with_capacity(cfg.input.buffer_frames * usize::from(format.channels));
    let mut offset = 0u64;

    loop {
        let frames = source.read_frames(cfg.input.buffer_frames, &mut samples)?;
        if frames == 0 {
            break;
        }
        let buffer = PcmBuffer::new(&samples, format, offset);
        if let ProcessorUpdate::Snapshot(events) = emitter.process_block(&buffer) {
            writer.write_all(&events)?;
        }
        offset += frames as u64;
    }

    log::info!(
        "Done: {} frames, {} windows, {} events, {} onsets",
        offset,
        emitter.windows_processed(),
        writer.written(),
        emitter.detector().onsets()
    );
    Ok(())
}

/// Render one spectrogram frame per video frame and pipe it to ffmpeg,
/// printing events on the way.
fn run_scope(cfg: &Config, source: &mut dyn PcmSource, audio: Option<&Path>) -> Result<()> {
    let settings = &cfg.scope;
    settings.validate()?;
    let template = match settings.template {
        Some(ref path) => load_template(path)?,
        None => default_template(),
    };

    let format = source.format();
    let mut scope = SpectrogramScope::new(settings.clone(), format, template)?;
    let spf = scope.samples_per_fft();
    let (width, height, fps) = (settings.width, settings.height, settings.fps);

    log::info!("Output: {}", cfg.output.path.display());
    log::info!("Resolution: {}x{} @ {}fps", width, height, fps);

    let mut encoder = FfmpegEncoder::new(
        &cfg.output.path,
        audio,
        width,
        height,
        fps,
        &cfg.output.encoder_options(),
    )?;

    let mut clock = FrameClock::new(format.sample_rate, fps);
    let pb = match source.total_frames() {
        Some(total) => ProgressBar::new(clock.frames_for(total)),
        None => ProgressBar::new_spinner(),
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let stdout = io::stdout();
    let mut writer = EventWriter::new(stdout.lock(), cfg.output.format);
    let mut frame = VideoFrame::new(width, height);
    let mut adapter = SampleAdapter::new(format.channels);
    let mut samples = Vec::new();
    let mut skip = 0usize;
    let mut eof = false;

    loop {
        while !eof && adapter.available() < spf + skip {
            if source.read_frames(cfg.input.buffer_frames, &mut samples)? == 0 {
                eof = true;
            } else {
                adapter.push(&samples);
            }
        }
        skip -= adapter.flush(skip);
        if adapter.available() == 0 {
            break;
        }

        let position = adapter.position();
        let buffer = PcmBuffer::new(adapter.peek(spf), format, position);
        if let ProcessorUpdate::Snapshot(event) = scope.process_block(&buffer) {
            writer.write(&event)?;
            writer.flush()?;
        }
        scope.paint(&mut frame);
        encoder.write_frame(frame.as_bytes())?;
        pb.inc(1);

        skip += clock.advance();
    }

    pb.finish_with_message("Rendering complete");

    log::info!("Finishing encoding...");
    encoder.finish()?;

    log::info!(
        "Done! {} frames, {} onsets. Output: {}",
        clock.frame(),
        scope.detector().onsets(),
        cfg.output.path.display()
    );
    Ok(())
}
