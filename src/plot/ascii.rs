//! ASCII plotting of the daily mean prediction for terminal output.
//!
//! Fixed-size character grid, deterministic for a given input (golden tests
//! rely on it).
//!
//! Plot elements:
//! - valid day mean: `o`
//! - line between consecutive valid days: `-`
//! - no-data day: `x` on the bottom row

use crate::series::SeriesRow;

/// Render the per-day mean of `band` across the series.
pub fn render_series_plot(rows: &[SeriesRow], band: &str, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return "Plot: empty series\n".to_string();
    };

    let n = rows.len();
    let points: Vec<(usize, f64)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.mean.filter(|m| m.is_finite()).map(|m| (i, m)))
        .collect();

    let (y_min, y_max) = y_range(&points).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Line first so markers overlay it.
    let mut prev = None;
    for &(i, m) in &points {
        let x = map_x(i, n, width);
        let y = map_y(m, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(&mut grid, x0, y0, x, y, '-');
        }
        prev = Some((x, y));
    }
    for &(i, m) in &points {
        grid[map_y(m, y_min, y_max, height)][map_x(i, n, width)] = 'o';
    }
    for (i, r) in rows.iter().enumerate() {
        if r.mean.is_none() {
            grid[height - 1][map_x(i, n, width)] = 'x';
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {band} daily mean | days=[{}, {}] | y=[{y_min:.2}, {y_max:.2}]\n",
        first.date, last.date
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn y_range(points: &[(usize, f64)]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, y) in points {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if !(min_y.is_finite() && max_y.is_finite()) {
        return None;
    }
    if max_y > min_y {
        Some((min_y, max_y))
    } else {
        Some((min_y - 0.5, max_y + 0.5))
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(i: usize, n: usize, width: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let u = i as f64 / (n as f64 - 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Row 0 is the maximum.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish). Only fills blank cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(d: u32, mean: Option<f64>) -> SeriesRow {
        SeriesRow {
            date: NaiveDate::from_ymd_opt(2023, 7, d).unwrap(),
            valid: mean.is_some(),
            source_image_count: if mean.is_some() { 2 } else { 0 },
            valid_pixels: if mean.is_some() { 100 } else { 0 },
            mean,
            min: mean,
            max: mean,
        }
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let rows = vec![
            row(1, Some(300.0)),
            row(2, Some(302.0)),
            row(3, None),
            row(4, Some(304.0)),
            row(5, Some(310.0)),
        ];

        let txt = render_series_plot(&rows, "LST", 10, 5);
        let expected = concat!(
            "Plot: LST daily mean | days=[2023-07-01, 2023-07-05] | y=[299.50, 310.50]\n",
            "         o\n",
            "        - \n",
            "     --o  \n",
            " -o--     \n",
            "o    x    \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn flat_or_empty_series_still_renders() {
        let flat = vec![row(1, Some(300.0)), row(2, Some(300.0))];
        let txt = render_series_plot(&flat, "LST", 10, 5);
        assert_eq!(txt.lines().count(), 6);
        assert!(txt.contains("y=[299.45, 300.55]"));

        assert_eq!(render_series_plot(&[], "LST", 10, 5), "Plot: empty series\n");

        let gaps = vec![row(1, None), row(2, None)];
        let txt = render_series_plot(&gaps, "LST", 10, 5);
        assert_eq!(txt.lines().last().unwrap(), "x        x");
    }
}
