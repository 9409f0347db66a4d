//! Structured table pass.
//!
//! A table is a run of at least two consecutive lines that each have two or
//! more cells. Cells are snapped to columns by x position, then one axis of
//! the grid is read as stop labels and the other as departure times.

use std::collections::BTreeSet;

use chrono::NaiveTime;

use crate::domain::{DayType, DepartureTime, Schedule, StopKey, parse_time_token};

use super::day_marker;
use super::layout::{Layout, Line};

/// Minimum number of lines in a table region.
const MIN_ROWS: usize = 2;

/// Minimum number of cells in a table line.
const MIN_CELLS: usize = 2;

/// Read every table in the document into the schedule.
///
/// Returns true if at least one stop with a departure was found. Stops of
/// the first table set the order; later tables only add new stops.
pub(crate) fn extract_tables(layout: &Layout, schedule: &mut Schedule) -> bool {
    let mut reader = TableReader {
        schedule,
        tolerance: layout.column_tolerance,
        day_type: None,
        found: false,
    };

    for page in &layout.pages {
        let mut region: Vec<&Line> = Vec::new();
        for line in page {
            if let Some(marker) = day_marker(line) {
                reader.flush(&mut region);
                reader.day_type = Some(marker);
            } else if line.cells.len() >= MIN_CELLS {
                region.push(line);
            } else {
                reader.flush(&mut region);
            }
        }
        reader.flush(&mut region);
    }

    reader.found
}

struct TableReader<'a> {
    schedule: &'a mut Schedule,
    tolerance: f32,
    day_type: Option<DayType>,
    found: bool,
}

impl TableReader<'_> {
    fn flush(&mut self, region: &mut Vec<&Line>) {
        if region.len() >= MIN_ROWS {
            let grid = Grid::build(region, self.tolerance);
            let stops = grid.read_stops();
            if !stops.is_empty() {
                self.record(stops);
            }
        }
        region.clear();
    }

    fn record(&mut self, stops: Vec<(String, Vec<NaiveTime>)>) {
        let first_table = !self.found;
        for (label, times) in stops {
            if first_table || !self.schedule.stops().contains(&label) {
                self.schedule.push_stop(label.clone());
            }
            let day_type = self.day_type;
            self.schedule.add_departures(
                StopKey::Stop(label),
                times
                    .into_iter()
                    .map(|t| DepartureTime::with_day_type(t, day_type)),
            );
        }
        self.found = true;
    }
}

/// Cells of a table region snapped to columns.
#[derive(Debug)]
struct Grid {
    rows: Vec<Vec<Option<String>>>,
}

impl Grid {
    fn build(lines: &[&Line], tolerance: f32) -> Self {
        let centres = column_centres(lines, tolerance);

        let rows = lines
            .iter()
            .map(|line| {
                let mut row: Vec<Option<String>> = vec![None; centres.len()];
                for cell in &line.cells {
                    let column = nearest(&centres, cell.x);
                    if let Some(text) = &mut row[column] {
                        text.push(' ');
                        text.push_str(&cell.text);
                    } else {
                        row[column] = Some(cell.text.clone());
                    }
                }
                row
            })
            .collect();

        Self { rows }
    }

    fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    fn first_row(&self) -> impl Iterator<Item = &str> {
        (0..self.width()).filter_map(|c| self.cell(0, c))
    }

    fn first_column(&self) -> impl Iterator<Item = &str> {
        (0..self.rows.len()).filter_map(|r| self.cell(r, 0))
    }

    /// Read (label, times) pairs, choosing the header axis with fewer
    /// non-alphabetic entries and falling back to the other one.
    fn read_stops(&self) -> Vec<(String, Vec<NaiveTime>)> {
        let row_noise = self.first_row().filter(|t| !has_letter(t)).count();
        let column_noise = self.first_column().filter(|t| !has_letter(t)).count();

        if row_noise <= column_noise {
            let stops = self.read_header_row();
            if stops.is_empty() {
                self.read_header_column()
            } else {
                stops
            }
        } else {
            let stops = self.read_header_column();
            if stops.is_empty() {
                self.read_header_row()
            } else {
                stops
            }
        }
    }

    /// Labels across the first row, times down each column.
    fn read_header_row(&self) -> Vec<(String, Vec<NaiveTime>)> {
        (0..self.width())
            .filter_map(|column| {
                let label = self.cell(0, column).and_then(stop_label)?;
                let times: Vec<NaiveTime> = (1..self.rows.len())
                    .filter_map(|row| self.cell(row, column))
                    .flat_map(cell_times)
                    .collect();
                (!times.is_empty()).then_some((label, times))
            })
            .collect()
    }

    /// Labels down the first column, times along each row.
    fn read_header_column(&self) -> Vec<(String, Vec<NaiveTime>)> {
        (0..self.rows.len())
            .filter_map(|row| {
                let label = self.cell(row, 0).and_then(stop_label)?;
                let times: Vec<NaiveTime> = (1..self.width())
                    .filter_map(|column| self.cell(row, column))
                    .flat_map(cell_times)
                    .collect();
                (!times.is_empty()).then_some((label, times))
            })
            .collect()
    }
}

/// Cell positions that belong to one column.
#[derive(Debug)]
struct Cluster {
    start: f32,
    sum: f32,
    count: usize,
    /// Lines with a cell in this cluster
    rows: BTreeSet<usize>,
}

impl Cluster {
    fn new(x: f32, row: usize) -> Self {
        Self {
            start: x,
            sum: x,
            count: 1,
            rows: BTreeSet::from([row]),
        }
    }

    fn add(&mut self, x: f32, row: usize) {
        self.sum += x;
        self.count += 1;
        self.rows.insert(row);
    }

    fn merge(&mut self, other: Cluster) {
        self.sum += other.sum;
        self.count += other.count;
        self.rows.extend(other.rows);
    }

    fn centre(&self) -> f32 {
        self.sum / self.count as f32
    }
}

/// Centres of the columns of a table region, left to right.
///
/// Positions are clustered greedily: a cluster starts at the first x more
/// than `tolerance` past the previous cluster's start. Neighbouring
/// clusters that never share a line are one column drawn with two
/// alignments, such as left-aligned stop names over centred times.
fn column_centres(lines: &[&Line], tolerance: f32) -> Vec<f32> {
    let mut positions: Vec<(f32, usize)> = lines
        .iter()
        .enumerate()
        .flat_map(|(row, line)| line.cells.iter().map(move |c| (c.x, row)))
        .collect();
    positions.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut clusters: Vec<Cluster> = Vec::new();
    for (x, row) in positions {
        match clusters.last_mut() {
            Some(cluster) if x - cluster.start <= tolerance => cluster.add(x, row),
            _ => clusters.push(Cluster::new(x, row)),
        }
    }

    let mut columns: Vec<Cluster> = Vec::new();
    for cluster in clusters {
        match columns.last_mut() {
            Some(column) if column.rows.is_disjoint(&cluster.rows) => column.merge(cluster),
            _ => columns.push(cluster),
        }
    }

    columns.iter().map(Cluster::centre).collect()
}

/// Index of the centre closest to `x`.
fn nearest(centres: &[f32], x: f32) -> usize {
    centres
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - x).abs().total_cmp(&(*b - x).abs()))
        .map_or(0, |(i, _)| i)
}

fn has_letter(text: &str) -> bool {
    text.chars().any(char::is_alphabetic)
}

/// A header cell names a stop if it contains a letter.
fn stop_label(text: &str) -> Option<String> {
    let label = text.trim().trim_end_matches(':').trim();
    has_letter(label).then(|| label.to_string())
}

/// Times in a data cell. Cells with letters are notes, not times.
fn cell_times(text: &str) -> Vec<NaiveTime> {
    if has_letter(text) {
        return Vec::new();
    }
    text.split_whitespace()
        .filter_map(|token| parse_time_token(token).ok())
        .collect()
}
