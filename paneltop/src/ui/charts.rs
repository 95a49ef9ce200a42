//! Line charts for the rolling CPU, memory and network series.

use ratatui::{
    layout::Rect,
    style::{Style, Stylize},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
};

use crate::chart::MetricChart;
use crate::ui::theme::MUTED;

fn title(chart: &MetricChart) -> Line<'static> {
    let mut spans = vec![Span::raw(format!("{} ", chart.label()))];
    for (i, ds) in chart.datasets().iter().enumerate() {
        let now = chart
            .latest(i)
            .map(|v| chart.format_tick(v))
            .unwrap_or_else(|| "–".into());
        let text = if chart.datasets().len() > 1 {
            format!("{}: {now} ", ds.label)
        } else {
            format!("{now} ")
        };
        spans.push(Span::styled(text, Style::default().fg(ds.color)));
    }
    Line::from(spans)
}

pub fn draw_metric_chart(f: &mut ratatui::Frame<'_>, area: Rect, chart: &MetricChart) {
    let points: Vec<Vec<(f64, f64)>> = (0..chart.datasets().len())
        .map(|i| chart.points(i))
        .collect();
    let datasets: Vec<Dataset<'_>> = chart
        .datasets()
        .iter()
        .zip(&points)
        .map(|(ds, pts)| {
            Dataset::default()
                .name(ds.label.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(ds.color))
                .data(pts)
        })
        .collect();

    let y_labels: Vec<Span<'_>> = chart
        .y_labels()
        .into_iter()
        .map(|l| Span::raw(l).fg(MUTED))
        .collect();

    let widget = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title(chart)))
        .x_axis(Axis::default().bounds(chart.x_bounds()))
        .y_axis(Axis::default().bounds(chart.y_bounds()).labels(y_labels))
        .legend_position(None);
    f.render_widget(widget, area);
}
