//! Schedule extraction from timetable documents.
//!
//! Extraction never fails. Each stage fills what the previous one could not:
//!
//! 1. tables, read as stop labels against columns or rows of times
//! 2. runs of times in free text, attributed to a stop when labelled
//! 3. raw text only, kept for manual reading
//!
//! Lines that only name a day type ("Saturday to Thursday", "Friday") tag
//! the departures that follow them.

mod free_text;
mod layout;
mod pdf;
mod table;

use tracing::{debug, warn};

use crate::domain::{DayType, ExtractionStage, Schedule, is_time_token};

use self::layout::{Layout, Line};

/// Lines with more cells than this are never day-type markers.
const MAX_MARKER_CELLS: usize = 2;

/// Extract a schedule from raw document bytes.
///
/// PDFs are read from their page content; anything else is read as text.
///
/// # Examples
///
/// ```
/// use timetable_server::domain::ExtractionStage;
/// use timetable_server::extract::extract;
///
/// let schedule = extract("SH1", b"Al Ghubaiba  05:30  06:00\nUnion  05:45  06:15\n");
/// assert_eq!(schedule.stage(), ExtractionStage::Table);
/// assert_eq!(schedule.stops(), ["Al Ghubaiba", "Union"]);
/// ```
pub fn extract(route_code: &str, bytes: &[u8]) -> Schedule {
    let mut layout = Layout::recover(bytes);
    let mut schedule = Schedule::new(route_code, std::mem::take(&mut layout.raw_text));

    if table::extract_tables(&layout, &mut schedule) {
        schedule.set_stage(ExtractionStage::Table);
    } else if free_text::extract_runs(&layout, &mut schedule) {
        schedule.set_stage(ExtractionStage::FreeText);
    }

    if schedule.is_weak() {
        warn!(
            route_code,
            bytes = bytes.len(),
            "no departures recognised; only raw text is available"
        );
    } else {
        debug!(
            route_code,
            stage = schedule.stage().as_str(),
            stops = schedule.stops().len(),
            departures = schedule.departure_count(),
            "extracted schedule"
        );
    }

    schedule
}

/// Split text into tokens on whitespace and list punctuation.
pub(crate) fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '|' | '-' | '–' | '—'))
        .filter(|t| !t.is_empty())
        .collect()
}

/// The day type a line introduces, if it is a short line without times.
pub(crate) fn day_marker(line: &Line) -> Option<DayType> {
    if line.is_empty() || line.cells.len() > MAX_MARKER_CELLS {
        return None;
    }
    let text = line.text();
    if tokenize(&text).into_iter().any(is_time_token) {
        return None;
    }
    DayType::detect(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StopKey;
    use crate::test_helpers::{sample_timetable_pdf, timetable_pdf};

    #[test]
    fn sample_pdf_reads_as_table() {
        let schedule = extract("SH1", &sample_timetable_pdf());

        assert_eq!(schedule.stage(), ExtractionStage::Table);
        assert_eq!(schedule.stops(), ["Al Ghubaiba", "Union", "Dubai Mall"]);
        assert_eq!(schedule.departures_at("Union").unwrap().len(), 3);
        assert!(schedule.raw_text().contains("--- Page 1 ---"));
        assert!(!schedule.is_weak());
    }

    #[test]
    fn pdf_without_table_falls_back_to_free_text() {
        let bytes = timetable_pdf(&[&[
            (50, 780, "Route 11 timetable 2024"),
            (50, 740, "First bus 05:15, then 05:45, 06:15"),
            (50, 720, "Every 30 minutes until 23:45"),
        ]]);

        let schedule = extract("11", &bytes);
        assert_eq!(schedule.stage(), ExtractionStage::FreeText);
        let all: Vec<String> = schedule
            .all_departures()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(all, vec!["05:15", "05:45", "06:15", "23:45"]);
        assert_eq!(schedule.stops(), ["First bus"]);
        assert_eq!(
            schedule.departures_at("First bus").unwrap().len(),
            1,
            "only the leading run belongs to the labelled stop"
        );
        assert_eq!(schedule.departures()[&StopKey::RouteLevel].len(), 3);
    }

    #[test]
    fn centred_times_keep_every_stop() {
        let bytes = timetable_pdf(&[&[
            (50, 760, "Al Ghubaiba"),
            (200, 760, "Union"),
            (350, 760, "Dubai Mall"),
            (72, 740, "05:30"),
            (222, 740, "05:45"),
            (372, 740, "06:05"),
            (72, 720, "06:00"),
            (222, 720, "06:15"),
            (372, 720, "06:35"),
        ]]);

        let schedule = extract("SH1", &bytes);
        assert_eq!(schedule.stage(), ExtractionStage::Table);
        assert_eq!(schedule.stops(), ["Al Ghubaiba", "Union", "Dubai Mall"]);
        assert_eq!(schedule.departures_at("Dubai Mall").unwrap().len(), 2);
    }

    #[test]
    fn pdf_without_times_is_weak() {
        let bytes = timetable_pdf(&[&[(50, 700, "Timetable temporarily unavailable")]]);

        let schedule = extract("C10", &bytes);
        assert_eq!(schedule.stage(), ExtractionStage::RawTextOnly);
        assert!(schedule.is_weak());
        assert!(schedule.raw_text().contains("temporarily unavailable"));
    }

    #[test]
    fn day_type_pages_tag_departures() {
        let bytes = timetable_pdf(&[
            &[
                (50, 780, "Saturday to Thursday"),
                (50, 740, "Union"),
                (200, 740, "Deira"),
                (50, 720, "06:00"),
                (200, 720, "06:10"),
            ],
            &[
                (50, 780, "Weekend"),
                (50, 740, "Union"),
                (200, 740, "Deira"),
                (50, 720, "08:00"),
                (200, 720, "08:10"),
            ],
        ]);

        let schedule = extract("F62", &bytes);
        let union = schedule.departures_at("Union").unwrap();
        let tagged: Vec<_> = union.iter().map(|d| (d.to_string(), d.day_type())).collect();
        assert_eq!(
            tagged,
            vec![
                ("06:00".to_string(), Some(DayType::SaturdayToThursday)),
                ("08:00".to_string(), Some(DayType::Weekend)),
            ]
        );
    }

    #[test]
    fn plain_text_input() {
        let schedule = extract("8", "Gold Souq\t07:00\t07:30\nDeira\t07:10\t07:40".as_bytes());
        assert_eq!(schedule.stage(), ExtractionStage::Table);
        assert_eq!(schedule.stops(), ["Gold Souq", "Deira"]);
    }

    #[test]
    fn empty_input() {
        let schedule = extract("8", b"");
        assert_eq!(schedule.stage(), ExtractionStage::RawTextOnly);
        assert!(!schedule.has_departures());
        assert!(!schedule.is_weak());
    }

    #[test]
    fn marker_lines() {
        assert_eq!(
            day_marker(&Line::from_text("Saturday - Thursday")),
            Some(DayType::SaturdayToThursday)
        );
        assert_eq!(day_marker(&Line::from_text("Fri  Sat")), Some(DayType::Friday));
        // Too many cells to be a heading
        assert_eq!(day_marker(&Line::from_text("Fri  Sat  Sun")), None);
        // Lines with times are data
        assert_eq!(day_marker(&Line::from_text("Friday 09:00")), None);
    }
}
