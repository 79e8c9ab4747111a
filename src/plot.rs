use crate::utils::DynError;
use plotters::prelude::PathElement;
use plotters::prelude::*;

const PLOT_FONT_SCALE: f64 = 1.2;

fn scaled_font_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

fn scaled_area_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

fn value_range(data: &[f64]) -> (f64, f64) {
    let min_val = data.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_val = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !min_val.is_finite() || !max_val.is_finite() {
        return (0.0, 1.0);
    }
    if (max_val - min_val).abs() < f64::EPSILON {
        let pad = if min_val == 0.0 { 1.0 } else { min_val.abs() * 0.05 };
        return (min_val - pad, max_val + pad);
    }
    let pad = (max_val - min_val) * 0.05;
    (min_val - pad, max_val + pad)
}

/// Line plot of `data` against its index (column profiles).
pub fn plot_series_by_index(
    data: &[f64],
    title: &str,
    filename: &str,
    x_label: &str,
    y_label: &str,
    label: &str,
) -> Result<(), DynError> {
    if data.is_empty() {
        return Err("No data points to plot".into());
    }

    let root = BitMapBackend::new(filename, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let (min_val, max_val) = value_range(data);
    let x_max = (data.len() as f64 - 1.0).max(1.0);

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", scaled_font_size(28)).into_font())
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(60))
        .build_cartesian_2d(0.0..x_max, min_val..max_val)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .label_style(("sans-serif", scaled_font_size(20)).into_font())
        .axis_desc_style(("sans-serif", scaled_font_size(24)).into_font())
        .light_line_style(WHITE.mix(0.0))
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            data.iter().enumerate().map(|(x, y)| (x as f64, *y)),
            &BLUE,
        ))?
        .label(label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], BLUE));

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", scaled_font_size(20)).into_font())
        .draw()?;

    root.present()?;
    Ok(())
}

/// Dashed smoothed-correlation curve with the selected peaks marked and annotated.
pub fn plot_series_with_peaks(
    data: &[f64],
    peaks: &[usize],
    title: &str,
    filename: &str,
    x_label: &str,
    y_label: &str,
) -> Result<(), DynError> {
    if data.is_empty() {
        return Err("No data points to plot".into());
    }

    let root = BitMapBackend::new(filename, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let (min_val, max_val) = value_range(data);
    let x_max = (data.len() as i32 - 1).max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", scaled_font_size(28)).into_font())
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(60))
        .build_cartesian_2d(0..x_max, min_val..max_val)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .label_style(("sans-serif", scaled_font_size(20)).into_font())
        .axis_desc_style(("sans-serif", scaled_font_size(24)).into_font())
        .light_line_style(WHITE.mix(0.0))
        .draw()?;

    chart
        .draw_series(DashedLineSeries::new(
            data.iter().enumerate().map(|(x, y)| (x as i32, *y)),
            8,
            4,
            BLUE.stroke_width(1),
        ))?
        .label("Correlation Results")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], BLUE));

    let marked: Vec<(i32, f64)> = peaks
        .iter()
        .filter_map(|&idx| data.get(idx).map(|&v| (idx as i32, v)))
        .collect();
    chart.draw_series(marked.iter().map(|&(x, y)| Circle::new((x, y), 5, RED.filled())))?;
    chart.draw_series(marked.iter().map(|&(x, y)| {
        Text::new(
            format!("Peak {x}"),
            (x, y),
            ("sans-serif", scaled_font_size(16)).into_font(),
        )
    }))?;

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", scaled_font_size(20)).into_font())
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::value_range;

    #[test]
    fn flat_series_gets_a_non_empty_range() {
        let (lo, hi) = value_range(&[2.0, 2.0]);
        assert!(lo < 2.0 && hi > 2.0);
        let (lo, hi) = value_range(&[0.0]);
        assert_eq!((lo, hi), (-1.0, 1.0));
    }

    #[test]
    fn range_is_padded_around_extremes() {
        let (lo, hi) = value_range(&[-1.0, 3.0]);
        assert!((lo + 1.2).abs() < 1e-12);
        assert!((hi - 3.2).abs() < 1e-12);
    }
}
