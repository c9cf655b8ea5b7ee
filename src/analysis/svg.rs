//! SVG rendering of a distribution plot through the plotters SVG backend,
//! which needs no system fonts.

use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use plotters_svg::SVGBackend;

use crate::analysis::{DistributionPlot, Series};
use crate::error::AugmentError;

const SIZE: (u32, u32) = (800, 500);

/// Dark to light, one colour per predictor slot.
const PALETTE: [RGBColor; 7] = [
    RGBColor(0x00, 0x00, 0x00),
    RGBColor(0x1c, 0x3a, 0x78),
    RGBColor(0x2f, 0x6b, 0x80),
    RGBColor(0x3b, 0x8a, 0x5a),
    RGBColor(0x7c, 0x9d, 0x4c),
    RGBColor(0xb4, 0xa3, 0x5a),
    RGBColor(0xd6, 0xb9, 0xa4),
];

fn plot_error(err: impl std::fmt::Display) -> AugmentError {
    AugmentError::Plot(err.to_string())
}

/// Runs of consecutive points, broken wherever the series has no value.
fn segments(series: &Series) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for (x, y) in &series.points {
        match y {
            Some(y) => current.push((*x, *y)),
            None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

pub fn render(plot: &DistributionPlot) -> Result<String, AugmentError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let x_min = plot.edges.first().copied().unwrap_or(0.0);
        let x_max = plot.edges.last().copied().unwrap_or(1.0);
        let y_top = plot.y_limit();
        let y_max = if y_top > 0.0 { y_top * 1.05 } else { 1.0 };

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("{} {}", plot.residue, plot.atom), ("sans-serif", 20))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, 0.0..y_max)
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("Chemical Shift [ppm]")
            .y_desc("Normalized Percent")
            .draw()
            .map_err(plot_error)?;

        let reference_style = RGBColor(0x80, 0x80, 0x80).mix(0.3).filled();
        for (idx, segment) in segments(&plot.reference).into_iter().enumerate() {
            let drawn = chart
                .draw_series(AreaSeries::new(segment, 0.0, reference_style))
                .map_err(plot_error)?;
            if idx == 0 {
                drawn
                    .label(plot.reference.label.as_str())
                    .legend(move |(x, y)| {
                        Rectangle::new([(x, y - 4), (x + 20, y + 4)], reference_style)
                    });
            }
        }

        for series in &plot.series {
            let style = PALETTE[series.slot % PALETTE.len()].stroke_width(1);
            for (idx, segment) in segments(series).into_iter().enumerate() {
                let drawn = chart
                    .draw_series(LineSeries::new(segment, style))
                    .map_err(plot_error)?;
                if idx == 0 {
                    drawn
                        .label(series.label.as_str())
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 20, y)], style)
                        });
                }
            }
        }

        if let Some(value) = plot.random_coil {
            let style = BLUE.stroke_width(1);
            chart
                .draw_series(DashedLineSeries::new(
                    [(value, 0.0), (value, plot.y_max * 100.0)],
                    6,
                    4,
                    style,
                ))
                .map_err(plot_error)?
                .label("Random Coil")
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
        }

        if !plot.reference_stats.is_empty() {
            let stats = plot
                .reference_stats
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join("  ");
            root.draw(&Text::new(
                format!("BMRB {stats}"),
                (80, SIZE.1 as i32 - 14),
                ("sans-serif", 11).into_font().color(&BLACK),
            ))
            .map_err(plot_error)?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(plot_error)?;

        root.present().map_err(plot_error)?;
    }
    Ok(svg)
}
