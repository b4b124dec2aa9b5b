//! Terminal rendering of the glucose-over-time chart.

use colored::Colorize;

use cgmview_core::{ChartSeries, GlucoseBand};

const TIME_LABEL_FORMAT: &str = "%m-%d %H:%M";
const AXIS_WIDTH: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    UpperBand,
    LowerBand,
    Reading(GlucoseBand),
}

/// Chart cells, top row first, plus the value range covered.
#[derive(Debug)]
pub struct ChartGrid {
    pub rows: Vec<Vec<Cell>>,
    pub top: f64,
    pub bottom: f64,
}

impl ChartGrid {
    fn row_of(&self, value: f64) -> usize {
        let last = self.rows.len() - 1;
        let scaled = (self.top - value) / (self.top - self.bottom) * last as f64;
        (scaled.round().max(0.0) as usize).min(last)
    }

    fn value_at(&self, row: usize) -> f64 {
        let last = (self.rows.len() - 1) as f64;
        self.top - row as f64 * (self.top - self.bottom) / last
    }
}

/// Lay the series out on a `width` x `height` grid.
///
/// Readings are averaged into at most `width` columns. Returns `None` when
/// there is nothing to draw.
pub fn layout(series: &ChartSeries, width: usize, height: usize) -> Option<ChartGrid> {
    let n = series.points.len();
    if n == 0 || width == 0 || height < 2 {
        return None;
    }

    let columns = width.min(n);
    let values: Vec<f64> = (0..columns)
        .map(|c| {
            let bucket = &series.points[c * n / columns..(c + 1) * n / columns];
            bucket.iter().map(|p| p.glucose_mmol_l).sum::<f64>() / bucket.len() as f64
        })
        .collect();

    let data_max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let data_min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let top = data_max.max(series.bands.upper) + 0.5;
    let bottom = (data_min.min(series.bands.lower) - 0.5).max(0.0);

    let mut grid = ChartGrid {
        rows: vec![vec![Cell::Empty; columns]; height],
        top,
        bottom,
    };

    let upper_row = grid.row_of(series.bands.upper);
    let lower_row = grid.row_of(series.bands.lower);
    grid.rows[upper_row].fill(Cell::UpperBand);
    grid.rows[lower_row].fill(Cell::LowerBand);

    for (c, value) in values.iter().enumerate() {
        let row = grid.row_of(*value);
        grid.rows[row][c] = Cell::Reading(series.bands.classify(*value));
    }

    Some(grid)
}

/// Render the chart as printable lines.
pub fn render(series: &ChartSeries, width: usize, height: usize) -> Vec<String> {
    let Some(grid) = layout(series, width, height) else {
        return vec!["No readings to chart.".dimmed().to_string()];
    };

    let mut lines: Vec<String> = grid
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let cells: String = row.iter().map(|cell| paint(*cell)).collect();
            format!("{:>5.1} ┤{}", grid.value_at(r), cells)
        })
        .collect();

    let columns = grid.rows[0].len();
    lines.push(format!("{}└{}", " ".repeat(AXIS_WIDTH - 1), "─".repeat(columns)));

    if let (Some(first), Some(last)) = (series.points.first(), series.points.last()) {
        let start = first.timestamp.format(TIME_LABEL_FORMAT).to_string();
        let end = last.timestamp.format(TIME_LABEL_FORMAT).to_string();
        let gap = columns.saturating_sub(start.len() + end.len()).max(1);
        lines.push(format!("{}{}{}{}", " ".repeat(AXIS_WIDTH), start, " ".repeat(gap), end));
    }

    lines.push(format!(
        "{}{} upper normal ({})  {} lower normal ({})",
        " ".repeat(AXIS_WIDTH),
        "╌".yellow(),
        series.bands.upper,
        "╌".red(),
        series.bands.lower
    ));

    lines
}

fn paint(cell: Cell) -> String {
    match cell {
        Cell::Empty => " ".to_string(),
        Cell::UpperBand => "╌".yellow().to_string(),
        Cell::LowerBand => "╌".red().to_string(),
        Cell::Reading(GlucoseBand::Low) => "●".bright_red().to_string(),
        Cell::Reading(GlucoseBand::InRange) => "●".bright_green().to_string(),
        Cell::Reading(GlucoseBand::High) => "●".bright_yellow().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmview_core::{ChartPoint, ReferenceBands};
    use chrono::{Duration, NaiveDate};

    fn series(values: &[f64]) -> ChartSeries {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        ChartSeries {
            points: values
                .iter()
                .enumerate()
                .map(|(i, v)| ChartPoint {
                    timestamp: start + Duration::minutes(15 * i as i64),
                    glucose_mmol_l: *v,
                })
                .collect(),
            bands: ReferenceBands::clinical(),
        }
    }

    fn reading_row(grid: &ChartGrid, column: usize) -> usize {
        grid.rows
            .iter()
            .position(|row| matches!(row[column], Cell::Reading(_)))
            .unwrap()
    }

    #[test]
    fn test_empty_series_has_no_layout() {
        assert!(layout(&series(&[]), 40, 10).is_none());
        assert!(layout(&series(&[5.0]), 40, 1).is_none());
    }

    #[test]
    fn test_range_covers_bands_and_data() {
        let grid = layout(&series(&[5.0, 6.0]), 40, 10).unwrap();
        assert_eq!(grid.top, 7.8 + 0.5);
        assert!((grid.bottom - 3.4).abs() < 1e-9);

        let grid = layout(&series(&[2.0, 14.0]), 40, 10).unwrap();
        assert_eq!(grid.top, 14.5);
        assert_eq!(grid.bottom, 1.5);
    }

    #[test]
    fn test_columns_are_bucketed_to_width() {
        let values: Vec<f64> = (0..100).map(|i| 4.0 + (i % 5) as f64).collect();
        let grid = layout(&series(&values), 20, 12).unwrap();
        assert_eq!(grid.rows.len(), 12);
        assert!(grid.rows.iter().all(|r| r.len() == 20));
    }

    #[test]
    fn test_readings_classified_and_placed() {
        let grid = layout(&series(&[3.0, 6.0, 12.0]), 40, 20).unwrap();

        assert_eq!(grid.rows[reading_row(&grid, 0)][0], Cell::Reading(GlucoseBand::Low));
        assert_eq!(grid.rows[reading_row(&grid, 1)][1], Cell::Reading(GlucoseBand::InRange));
        assert_eq!(grid.rows[reading_row(&grid, 2)][2], Cell::Reading(GlucoseBand::High));

        // Higher values sit on higher rows.
        assert!(reading_row(&grid, 2) < reading_row(&grid, 1));
        assert!(reading_row(&grid, 1) < reading_row(&grid, 0));
    }

    #[test]
    fn test_band_rows_drawn() {
        let grid = layout(&series(&[5.0]), 10, 15).unwrap();
        assert!(grid.rows.iter().any(|r| r.contains(&Cell::UpperBand)));
        assert!(grid.rows.iter().any(|r| r.contains(&Cell::LowerBand)));
    }

    #[test]
    fn test_render_line_count() {
        colored::control::set_override(false);
        let lines = render(&series(&[5.0, 6.0, 7.0]), 30, 8);
        // rows + axis + time labels + legend
        assert_eq!(lines.len(), 8 + 3);
        assert!(lines[8].contains('└'));
    }
}
