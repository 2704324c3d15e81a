use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::pcm::PcmFormat;

/// Fully decoded track, interleaved signed 16-bit.
pub struct AudioData {
    pub samples: Vec<i16>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn format(&self) -> PcmFormat {
        PcmFormat::new(self.sample_rate, self.channels)
    }

    pub fn frames(&self) -> u64 {
        (self.samples.len() / usize::from(self.channels.max(1))) as u64
    }
}

pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;
    let channels = u16::try_from(channels).context("Too many channels")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<i16> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(err)) => {
                log::warn!("Skipping undecodable packet: {err}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        // Channels stay interleaved; the elements downmix.
        let mut sample_buf = SampleBuffer::<i16>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        all_samples.extend_from_slice(sample_buf.samples());
    }

    let frames = all_samples.len() / usize::from(channels.max(1));
    log::info!(
        "Decoded audio: {} frames, {}Hz x{}, {:.1}s",
        frames,
        sample_rate,
        channels,
        frames as f32 / sample_rate as f32
    );

    Ok(AudioData {
        samples: all_samples,
        channels,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_wav(path: &Path, rate: u32, channels: u16, samples: &[i16]) {
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&rate.to_le_bytes());
        bytes.extend_from_slice(&(rate * u32::from(channels) * 2).to_le_bytes());
        bytes.extend_from_slice(&(channels * 2).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        std::fs::File::create(path).unwrap().write_all(&bytes).unwrap();
    }

    #[test]
    fn decodes_stereo_wav_interleaved() {
        let path = std::env::temp_dir().join(format!("onsetscope-decode-{}.wav", std::process::id()));
        let samples: Vec<i16> = (0..400).map(|i| if i % 2 == 0 { 1_000 } else { -1_000 }).collect();
        write_wav(&path, 8_000, 2, &samples);

        let audio = decode_audio(&path).unwrap();
        assert_eq!(audio.format(), PcmFormat::new(8_000, 2));
        assert_eq!(audio.frames(), 200);
        assert_eq!(&audio.samples[..4], &[1_000, -1_000, 1_000, -1_000]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_reported() {
        let err = decode_audio(Path::new("/nonexistent/onsetscope.wav")).err().unwrap();
        assert!(err.to_string().contains("Failed to open audio file"));
    }
}
