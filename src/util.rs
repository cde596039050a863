//! Small numeric helpers over piece-time samples (seconds).

pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(samples: &[f64]) -> Option<f64> {
    let avg = mean(samples)?;
    let variance = samples
        .iter()
        .map(|s| (s - avg).powi(2))
        .sum::<f64>()
        / samples.len() as f64;
    Some(variance.sqrt())
}

pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Trailing moving average; the first points average over what exists so far.
pub fn moving_average(samples: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..samples.len())
        .map(|i| {
            let from = (i + 1).saturating_sub(window);
            let slice = &samples[from..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// `12.3s` under a minute, `4m 05s` above.
pub fn format_piece_time(secs: f64) -> String {
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let whole = secs.floor() as u64;
        format!("{}m {:02}s", whole / 60, whole % 60)
    }
}

/// `1h 05m` or `12m`.
pub fn format_duration(secs: f64) -> String {
    let whole = secs.max(0.0).floor() as u64;
    let hours = whole / 3600;
    let mins = (whole % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {mins:02}m")
    } else {
        format!("{mins}m")
    }
}

/// `HH:MM:SS` clock display.
pub fn format_clock(secs: f64) -> String {
    let whole = secs.max(0.0).floor() as u64;
    format!("{:02}:{:02}:{:02}", whole / 3600, (whole % 3600) / 60, whole % 60)
}
