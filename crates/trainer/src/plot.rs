use plotters::prelude::*;
use std::path::Path;

use crate::error::{Result, TrainError};

fn plot_err<E: std::fmt::Display>(err: E) -> TrainError {
    TrainError::Plot(err.to_string())
}

fn bounds(points: &[(f64, f64)]) -> (f64, f64) {
    let x_max = points.iter().map(|p| p.0).fold(0.0f64, f64::max).max(1.0);
    let y_max = points.iter().map(|p| p.1).fold(0.0f64, f64::max);
    (x_max, if y_max > 0.0 { y_max * 1.1 } else { 1.0 })
}

/// Scatter plot of one metric series against epochs, written as PNG.
pub fn scatter_plot(path: &Path, title: &str, y_label: &str, points: &[(f64, f64)]) -> Result<()> {
    if points.is_empty() {
        log::warn!("nothing to plot for {:?}", path);
        return Ok(());
    }

    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let (x_max, y_max) = bounds(points);
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 32))
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, 0.0..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Epoch")
        .y_desc(y_label)
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 3, BLUE.filled())),
        )
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Trained vs held-out accuracy on one chart, with a legend.
pub fn combined_accuracy_plot(
    path: &Path,
    trained: &[(f64, f64)],
    held_out: &[(f64, f64)],
) -> Result<()> {
    if trained.is_empty() && held_out.is_empty() {
        log::warn!("nothing to plot for {:?}", path);
        return Ok(());
    }

    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut all = trained.to_vec();
    all.extend_from_slice(held_out);
    let (x_max, y_max) = bounds(&all);

    let mut chart = ChartBuilder::on(&root)
        .caption("Accuracy vs Epoch", ("sans-serif", 32))
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, 0.0..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Epoch")
        .y_desc("Accuracy")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(
            trained
                .iter()
                .map(|&(x, y)| TriangleMarker::new((x, y), 4, RED.filled())),
        )
        .map_err(plot_err)?
        .label("trained nodes")
        .legend(|(x, y)| TriangleMarker::new((x, y), 4, RED.filled()));

    chart
        .draw_series(
            held_out
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 3, BLUE.filled())),
        )
        .map_err(plot_err)?
        .label("held-out nodes")
        .legend(|(x, y)| Circle::new((x, y), 3, BLUE.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}
