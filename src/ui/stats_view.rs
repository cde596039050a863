use piecemeal::{
    stats::{round_to, PuzzleStats, ScopeCharts},
    time_series::TrendDirection,
    util::{format_duration, format_piece_time},
};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, BarChart, Block, Borders, Chart, Dataset, GraphType, Paragraph, Widget},
};

use crate::{
    ui::charting::{bar_width, compute_chart_params, format_label},
    App,
};

/// Pure presenter for the puzzle summary block
pub fn summary_lines(stats: &PuzzleStats) -> Vec<Line<'static>> {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());

    let mut lines = vec![
        Line::from(vec![
            Span::styled(format!("{:.1}%", round_to(stats.progress, 1)), bold_style),
            Span::raw(format!(
                " of {} pieces   {} placed   {} failed   {:.1}% success",
                stats.puzzle.total_pieces,
                stats.total_pieces_placed,
                stats.total_pieces_failed,
                round_to(stats.success_rate, 1)
            )),
        ]),
        Line::from(format!(
            "avg {:.2}s   median {}   sd {}   {} over {} sessions",
            round_to(stats.avg_time_per_piece, 2),
            or_dash(stats.median_time_per_piece.map(format_piece_time)),
            or_dash(stats.piece_time_std_dev.map(|sd| format!("{sd:.2}s"))),
            format_duration(stats.total_time),
            stats.sessions_count
        )),
    ];
    if let Some(eta) = stats.estimated_time_remaining() {
        lines.push(Line::from(format!(
            "{} pieces left, about {} at this pace",
            stats.pieces_remaining(),
            format_duration(eta)
        )));
    }
    lines
}

fn trend_line(charts: &ScopeCharts) -> Line<'static> {
    match &charts.progression.trend {
        Some(trend) => {
            let color = match trend.direction {
                TrendDirection::Improving => Color::Green,
                TrendDirection::NoImprovement => Color::Yellow,
            };
            Line::from(vec![
                Span::raw("trend: "),
                Span::styled(
                    trend.direction.to_string(),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!(
                    " ({} -> {})",
                    format_piece_time(trend.first_half_mean),
                    format_piece_time(trend.second_half_mean)
                )),
            ])
        }
        None => Line::from("trend: needs at least 3 placed pieces"),
    }
}

fn render_histogram(charts: &ScopeCharts, area: Rect, buf: &mut Buffer) {
    let block = Block::default().borders(Borders::ALL).title("piece times");
    let Some(histogram) = &charts.histogram else {
        Paragraph::new("no placed pieces yet")
            .alignment(Alignment::Center)
            .block(block)
            .render(area, buf);
        return;
    };

    let labelled = histogram.labelled();
    let data: Vec<(&str, u64)> = labelled.iter().map(|(l, c)| (l.as_str(), *c)).collect();
    BarChart::default()
        .block(block)
        .data(data.as_slice())
        .bar_width(bar_width(area.width, data.len()))
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .render(area, buf);
}

fn render_progression(charts: &ScopeCharts, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let points: Vec<(f64, f64)> = charts.progression.points.iter().map(|&p| p.into()).collect();
    let rolling: Vec<(f64, f64)> = charts.progression.rolling.iter().map(|&p| p.into()).collect();
    let (last_piece, slowest) = compute_chart_params(&points);

    let datasets = vec![
        Dataset::default()
            .name("piece")
            .marker(Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Magenta))
            .data(&points),
        Dataset::default()
            .name("rolling avg")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Green))
            .data(&rolling),
    ];

    Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title("progression"))
        .x_axis(
            Axis::default()
                .title("piece")
                .bounds([1.0, last_piece])
                .labels(vec![
                    Span::styled("1", bold_style),
                    Span::styled(format_label(last_piece), bold_style),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("secs")
                .bounds([0.0, slowest])
                .labels(vec![
                    Span::styled("0", bold_style),
                    Span::styled(format_label(slowest), bold_style),
                ]),
        )
        .render(area, buf);
}

pub fn render_stats(app: &App, area: Rect, buf: &mut Buffer) {
    let (stats, charts) = app.stats_view();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(5), // summary
            Constraint::Min(6),    // charts
            Constraint::Length(1), // trend
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(summary_lines(&stats))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(app.puzzle.name.as_str()),
        )
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let charts_area = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);
    render_histogram(&charts, charts_area[0], buf);
    render_progression(&charts, charts_area[1], buf);

    Paragraph::new(trend_line(&charts))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    Paragraph::new(Span::styled(
        format!(
            "scope: {}  |  (tab) switch scope / (s) back / (esc)ape",
            charts.scope
        ),
        Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);
}
