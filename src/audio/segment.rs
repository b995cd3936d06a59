use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::backend::AudioFrame;
use super::convert::{process_frame, rms_level};

/// Container of the finalized audio blob
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentFormat {
    /// Raw little-endian 16-bit PCM (`audio/pcm`)
    #[default]
    Pcm,
    /// 16-bit PCM in a WAV container
    Wav,
}

/// Accumulates captured frames for one utterance
#[derive(Debug)]
pub struct SegmentBuffer {
    format: SegmentFormat,
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
    frame_count: usize,
    level: f32,
}

impl SegmentBuffer {
    pub fn new(format: SegmentFormat, sample_rate: u32, channels: u16) -> Self {
        Self {
            format,
            sample_rate,
            channels,
            samples: Vec::new(),
            frame_count: 0,
            level: 0.0,
        }
    }

    /// Append one frame, converted to the segment's rate and channels.
    /// Returns the frame's energy level.
    pub fn push(&mut self, frame: AudioFrame) -> f32 {
        let frame = process_frame(frame, self.sample_rate, self.channels);
        self.level = rms_level(&frame.samples);
        self.samples.extend_from_slice(&frame.samples);
        self.frame_count += 1;
        self.level
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Level of the most recent frame
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn duration_ms(&self) -> u64 {
        let per_second = self.sample_rate as u64 * self.channels.max(1) as u64;
        if per_second == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / per_second
    }

    /// Produce the single audio blob for this utterance
    pub fn finalize(self) -> Result<Vec<u8>> {
        match self.format {
            SegmentFormat::Pcm => Ok(self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()),
            SegmentFormat::Wav => {
                let spec = hound::WavSpec {
                    channels: self.channels,
                    sample_rate: self.sample_rate,
                    bits_per_sample: 16,
                    sample_format: hound::SampleFormat::Int,
                };

                let mut cursor = Cursor::new(Vec::new());
                {
                    let mut writer = hound::WavWriter::new(&mut cursor, spec)
                        .context("Failed to create in-memory WAV writer")?;
                    for &sample in &self.samples {
                        writer
                            .write_sample(sample)
                            .context("Failed to write sample to WAV")?;
                    }
                    writer.finalize().context("Failed to finalize WAV segment")?;
                }

                Ok(cursor.into_inner())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<i16>) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn pcm_is_little_endian_concatenation() {
        let mut buffer = SegmentBuffer::new(SegmentFormat::Pcm, 16000, 1);
        buffer.push(frame(vec![1, -2]));
        buffer.push(frame(vec![0x0304]));

        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.finalize().unwrap(), vec![1, 0, 0xfe, 0xff, 0x04, 0x03]);
    }

    #[test]
    fn wav_segment_reads_back() {
        let mut buffer = SegmentBuffer::new(SegmentFormat::Wav, 16000, 1);
        buffer.push(frame(vec![10, 20, 30]));

        let bytes = buffer.finalize().unwrap();
        assert_eq!(&bytes[..4], b"RIFF");

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![10, 20, 30]);
    }

    #[test]
    fn converts_stereo_input_to_configured_mono() {
        let mut buffer = SegmentBuffer::new(SegmentFormat::Pcm, 16000, 1);
        buffer.push(AudioFrame {
            samples: vec![100, 100, 50, 50],
            sample_rate: 16000,
            channels: 2,
            timestamp_ms: 0,
        });

        assert_eq!(buffer.sample_count(), 2);
    }
}
