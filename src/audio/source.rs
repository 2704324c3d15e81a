use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};

use super::decode::{decode_audio, AudioData};
use super::pcm::PcmFormat;

/// Delivers interleaved PCM in arrival order, `frames` at a time.
pub trait PcmSource {
    fn format(&self) -> PcmFormat;

    /// Replace `out` with up to `frames` whole frames. Returns the number of
    /// frames read; 0 means end of stream.
    fn read_frames(&mut self, frames: usize, out: &mut Vec<i16>) -> Result<usize>;

    /// Stream length when known up front.
    fn total_frames(&self) -> Option<u64> {
        None
    }
}

pub struct DecodedSource {
    audio: AudioData,
    cursor: usize,
}

impl DecodedSource {
    pub fn new(audio: AudioData) -> Self {
        Self { audio, cursor: 0 }
    }
}

impl PcmSource for DecodedSource {
    fn format(&self) -> PcmFormat {
        self.audio.format()
    }

    fn read_frames(&mut self, frames: usize, out: &mut Vec<i16>) -> Result<usize> {
        let channels = usize::from(self.audio.channels.max(1));
        let end = (self.cursor + frames * channels).min(self.audio.samples.len());
        out.clear();
        out.extend_from_slice(&self.audio.samples[self.cursor..end]);
        let read = (end - self.cursor) / channels;
        self.cursor = end;
        Ok(read)
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.audio.frames())
    }
}

/// Headerless interleaved signed 16-bit little-endian samples.
pub struct RawSource<R> {
    reader: R,
    format: PcmFormat,
    bytes: Vec<u8>,
}

impl<R: Read> RawSource<R> {
    pub fn new(reader: R, format: PcmFormat) -> Self {
        Self {
            reader,
            format,
            bytes: Vec::new(),
        }
    }
}

impl<R: Read> PcmSource for RawSource<R> {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn read_frames(&mut self, frames: usize, out: &mut Vec<i16>) -> Result<usize> {
        let frame_bytes = usize::from(self.format.channels.max(1)) * 2;
        let want = frames * frame_bytes;
        self.bytes.resize(want, 0);

        let mut filled = 0;
        while filled < want {
            match self.reader.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("Failed to read raw PCM"),
            }
        }

        let whole = filled / frame_bytes;
        if filled % frame_bytes != 0 {
            log::warn!("Dropping {} bytes of a partial frame at end of stream", filled % frame_bytes);
        }
        out.clear();
        out.extend(
            self.bytes[..whole * frame_bytes]
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]])),
        );
        Ok(whole)
    }
}

/// Open `path` as a decoded file, or as raw PCM in `raw` format. `-` reads
/// raw PCM from standard input.
pub fn open_source(path: &Path, raw: Option<PcmFormat>) -> Result<Box<dyn PcmSource>> {
    if path == Path::new("-") {
        let format = raw.context("Reading from stdin needs --raw with --rate and --channels")?;
        log::info!("Reading raw PCM from stdin: {}Hz x{}", format.sample_rate, format.channels);
        return Ok(Box::new(RawSource::new(BufReader::new(io::stdin()), format)));
    }

    match raw {
        Some(format) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open raw PCM file: {}", path.display()))?;
            log::info!(
                "Reading raw PCM from {}: {}Hz x{}",
                path.display(),
                format.sample_rate,
                format.channels
            );
            Ok(Box::new(RawSource::new(BufReader::new(file), format)))
        }
        None => Ok(Box::new(DecodedSource::new(decode_audio(path)?))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn raw_source_reads_whole_frames() {
        let bytes: Vec<u8> = [1i16, -2, 3, -4, 5]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let mut source = RawSource::new(Cursor::new(bytes), PcmFormat::new(8_000, 2));
        let mut out = Vec::new();

        assert_eq!(source.read_frames(1, &mut out).unwrap(), 1);
        assert_eq!(out, vec![1, -2]);
        // one full frame, then a dangling sample
        assert_eq!(source.read_frames(4, &mut out).unwrap(), 1);
        assert_eq!(out, vec![3, -4]);
        assert_eq!(source.read_frames(4, &mut out).unwrap(), 0);
        assert!(out.is_empty());
        assert_eq!(source.total_frames(), None);
    }

    #[test]
    fn decoded_source_chunks_in_order() {
        let audio = AudioData {
            samples: (0..10).collect(),
            channels: 1,
            sample_rate: 8_000,
        };
        let mut source = DecodedSource::new(audio);
        assert_eq!(source.total_frames(), Some(10));

        let mut out = Vec::new();
        let mut seen = Vec::new();
        while source.read_frames(4, &mut out).unwrap() > 0 {
            seen.push(out.clone());
        }
        assert_eq!(seen, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);
    }

    #[test]
    fn stdin_requires_raw_format() {
        assert!(open_source(Path::new("-"), None).is_err());
    }
}
