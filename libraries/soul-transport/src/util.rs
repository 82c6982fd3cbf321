//! Display helpers

/// Format seconds as `mm:ss`, or `hh:mm:ss` from one hour up
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };

    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let secs = total % 60;

    if hours == 0 {
        format!("{minutes:02}:{secs:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    }
}

/// Reduce decoded samples to waveform bars
///
/// Each of `blocks` bars is the mean absolute amplitude of its slice, scaled
/// so the loudest bar equals `max` and no bar falls below `min`.
pub fn normalize_waveform(samples: &[f32], blocks: usize, max: f32, min: f32) -> Vec<f32> {
    if blocks == 0 {
        return Vec::new();
    }

    let block_size = (samples.len() / blocks).max(1);
    let means: Vec<f32> = (0..blocks)
        .map(|block| {
            let start = block * block_size;
            let slice = samples.get(start..(start + block_size).min(samples.len()));
            match slice {
                Some(slice) if !slice.is_empty() => {
                    slice.iter().map(|s| s.abs()).sum::<f32>() / slice.len() as f32
                }
                _ => 0.0,
            }
        })
        .collect();

    let peak = means.iter().copied().fold(0.0_f32, f32::max);
    if peak <= 0.0 {
        return vec![min; blocks];
    }

    means
        .into_iter()
        .map(|mean| ((mean * max / peak).max(min) * 1e5).round() / 1e5)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_hours() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(65.9), "01:05");
        assert_eq!(format_time(3599.0), "59:59");
        assert_eq!(format_time(3600.0 + 61.0), "01:01:01");
        assert_eq!(format_time(f64::NAN), "00:00");
        assert_eq!(format_time(-3.0), "00:00");
    }

    #[test]
    fn waveform_scales_to_peak() {
        let samples = [0.5, -0.5, 0.1, -0.1, 0.0, 0.0];
        let bars = normalize_waveform(&samples, 3, 0.9, 0.1);

        assert_eq!(bars.len(), 3);
        assert!((bars[0] - 0.9).abs() < 1e-5);
        assert!((bars[1] - 0.18).abs() < 1e-5);
        assert!((bars[2] - 0.1).abs() < 1e-5);
    }

    #[test]
    fn waveform_of_silence_is_floor() {
        assert_eq!(normalize_waveform(&[0.0; 8], 4, 0.9, 0.1), vec![0.1; 4]);
        assert!(normalize_waveform(&[0.3], 0, 0.9, 0.1).is_empty());
    }

    #[test]
    fn waveform_with_more_blocks_than_samples() {
        let bars = normalize_waveform(&[1.0, 0.5], 4, 1.0, 0.0);
        assert_eq!(bars, vec![1.0, 0.5, 0.0, 0.0]);
    }
}
