/// Upper X (piece number) and Y (seconds) bounds for the progression chart
pub fn compute_chart_params(points: &[(f64, f64)]) -> (f64, f64) {
    let slowest = points.iter().map(|&(_, secs)| secs).fold(0.0, f64::max);

    // a single point still needs a non-empty x range
    let last_piece = points.last().map(|p| p.0).unwrap_or(1.0).max(2.0);

    (last_piece, slowest.ceil().max(1.0))
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.1}")
    }
}

/// Bar width that spreads `bins` bars over `width` columns.
pub fn bar_width(width: u16, bins: usize) -> u16 {
    if bins == 0 {
        return 1;
    }
    let per_bar = width.saturating_sub(2) / bins as u16;
    per_bar.saturating_sub(1).clamp(1, 9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_chart_params_empty() {
        let (x, y) = compute_chart_params(&[]);
        assert_eq!(x, 2.0);
        assert_eq!(y, 1.0);
    }

    #[test]
    fn test_compute_chart_params_rounds_up_slowest() {
        let (x, y) = compute_chart_params(&[(1.0, 4.2), (2.0, 12.5), (3.0, 7.0)]);
        assert_eq!(x, 3.0);
        assert_eq!(y, 13.0);
    }

    #[test]
    fn test_format_label() {
        assert_eq!(format_label(1.0), "1");
        assert_eq!(format_label(12.34), "12.3");
    }

    #[test]
    fn test_bar_width() {
        assert_eq!(bar_width(50, 4), 9);
        assert_eq!(bar_width(20, 6), 2);
        assert_eq!(bar_width(3, 8), 1);
    }
}
