use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::render::frame::FFMPEG_PIXEL_FORMAT;

/// Output encoding knobs passed straight to ffmpeg.
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    pub codec: String,
    pub pix_fmt: String,
    pub crf: u32,
    pub bitrate: Option<String>,
}

pub struct FfmpegEncoder {
    child: Child,
    frames: u64,
}

/// Arguments for raw host-endian 32-bit frames on stdin, with `audio` muxed
/// in when given.
fn build_args(
    output_path: &Path,
    audio: Option<&Path>,
    width: u32,
    height: u32,
    fps: u32,
    options: &EncoderOptions,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), FFMPEG_PIXEL_FORMAT.into(),
        "-video_size".into(), format!("{}x{}", width, height),
        "-framerate".into(), fps.to_string(),
        "-i".into(), "pipe:0".into(),
    ];

    if let Some(audio) = audio {
        args.extend(["-i".to_string(), audio.to_string_lossy().into_owned()]);
    }

    args.extend([
        "-c:v".to_string(), options.codec.clone(),
        "-pix_fmt".into(), options.pix_fmt.clone(),
    ]);

    if let Some(ref br) = options.bitrate {
        args.extend(["-b:v".to_string(), br.clone()]);
    } else {
        args.extend(["-crf".to_string(), options.crf.to_string()]);
        args.extend(["-preset".to_string(), "medium".to_string()]);
    }

    if audio.is_some() {
        args.extend([
            "-c:a".to_string(), "aac".into(),
            "-b:a".into(), "192k".into(),
            "-shortest".into(),
        ]);
    }

    args.push(output_path.to_string_lossy().into_owned());
    args
}

impl FfmpegEncoder {
    pub fn new(
        output_path: &Path,
        audio: Option<&Path>,
        width: u32,
        height: u32,
        fps: u32,
        options: &EncoderOptions,
    ) -> Result<Self> {
        let args = build_args(output_path, audio, width, height, fps, options);

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}, input={}",
            width,
            height,
            fps,
            options.codec,
            FFMPEG_PIXEL_FORMAT
        );

        Ok(Self { child, frames: 0 })
    }

    pub fn write_frame(&mut self, pixels: &[u8]) -> Result<()> {
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(pixels).context("Failed to write frame to ffmpeg")?;
        self.frames += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // Close stdin to signal EOF
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete: {} frames", self.frames);
        Ok(())
    }
}
