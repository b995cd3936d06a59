use super::backend::AudioFrame;

/// Process audio frame: downsample and convert to target format
pub fn process_frame(frame: AudioFrame, target_sample_rate: u32, target_channels: u16) -> AudioFrame {
    let mut processed = frame;

    // Downsample if needed
    if processed.sample_rate != target_sample_rate {
        processed = downsample_frame(processed, target_sample_rate);
    }

    // Convert to mono if needed
    if processed.channels != target_channels && target_channels == 1 {
        processed = stereo_to_mono(processed);
    }

    processed
}

/// Whether `process_frame` converts `from` into `to` without changing pitch.
///
/// Rates must match or divide by a whole number; channels must match or go
/// from stereo to mono.
pub fn supports_conversion(from_rate: u32, from_channels: u16, to_rate: u32, to_channels: u16) -> bool {
    let rate_ok = from_rate == to_rate || (to_rate > 0 && from_rate > to_rate && from_rate % to_rate == 0);
    let channels_ok = from_channels == to_channels || (from_channels == 2 && to_channels == 1);
    rate_ok && channels_ok
}

/// Downsample audio frame by decimation (whole-number ratios only)
pub fn downsample_frame(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate || target_rate == 0 {
        return frame;
    }

    if !supports_conversion(frame.sample_rate, frame.channels, target_rate, frame.channels) {
        return frame; // Can't upsample or resample by a fractional ratio
    }
    let ratio = (frame.sample_rate / target_rate) as usize;

    // Decimate whole interleaved sample groups so channels stay aligned
    let channels = frame.channels.max(1) as usize;
    let downsampled: Vec<i16> = frame
        .samples
        .chunks_exact(channels)
        .step_by(ratio)
        .flatten()
        .copied()
        .collect();

    AudioFrame {
        samples: downsampled,
        sample_rate: target_rate,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Convert stereo to mono by averaging channels
pub fn stereo_to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels != 2 {
        return frame; // Only support stereo -> mono
    }

    let mono_samples = frame
        .samples
        .chunks_exact(2)
        .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
        .collect();

    AudioFrame {
        samples: mono_samples,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// RMS energy of the samples, normalized to `0.0..=1.0`
pub fn rms_level(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64 / i16::MAX as f64;
            v * v
        })
        .sum();

    ((sum_squares / samples.len() as f64).sqrt() as f32).min(1.0)
}
