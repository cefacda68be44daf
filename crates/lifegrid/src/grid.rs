//! Week grid derivation
//!
//! Turns the user's settings and their saved week records into cells, one per
//! week of the expected lifespan. Nothing here touches storage: callers load
//! settings and records, build a [`Grid`], and build a fresh one after every
//! write.
//!
//! Weeks run Sunday to Saturday. Cell `i` covers the week containing
//! `dob + i weeks`, so consecutive cells never overlap and never leave a gap.

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::ops::Range;

use crate::error::{Error, Result};
use crate::types::{
    parse_date, CellStatus, CellView, MoodHistogram, ProgressStats, Settings, WeekEdit,
    WeekRecord,
};

/// Grid rows are a fixed 52 weeks per year rather than an exact calendar count
pub const WEEKS_PER_YEAR: u32 = 52;

const SECONDS_PER_WEEK: i64 = 7 * 24 * 60 * 60;

/// Number of cells in the grid
pub fn total_weeks(settings: &Settings) -> u32 {
    settings.life_expectancy_years * WEEKS_PER_YEAR
}

/// Whole weeks between local midnight of the birth date and `now`, rounded down.
/// Negative when `now` is before the birth date.
pub fn current_week_index(settings: &Settings, now: NaiveDateTime) -> i64 {
    let born = settings.dob.and_time(NaiveTime::MIN);
    (now - born).num_seconds().div_euclid(SECONDS_PER_WEEK)
}

/// Sunday on or before `date`
pub fn week_start(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_sub_days(Days::new(date.weekday().num_days_from_sunday() as u64))
        .ok_or_else(|| Error::validation(format!("no week starts before {}", date)))
}

/// Saturday closing the week that starts on `start`
pub fn week_end(start: NaiveDate) -> Result<NaiveDate> {
    start
        .checked_add_days(Days::new(6))
        .ok_or_else(|| Error::validation(format!("week starting {} ends past the calendar", start)))
}

/// Cell index of the week named by `id` under `settings`. The id has to be
/// the start of a week inside the grid.
fn locate(settings: &Settings, id: &str) -> Result<u32> {
    let date = parse_date(id)?;
    if week_start(date)? != date {
        return Err(Error::validation(format!(
            "week id '{}' is not the start of a week",
            id
        )));
    }

    let first = week_start(settings.dob)?;
    let index = (date - first).num_days() / 7;
    let total = total_weeks(settings);
    if index < 0 || index >= total as i64 {
        return Err(Error::OutOfRange { index, total });
    }
    Ok(index as u32)
}

/// Render a percentage for display: "0%", "<0.1%", or two decimals
pub fn format_percentage(percent: f64) -> String {
    if percent == 0.0 {
        "0%".to_string()
    } else if percent < 0.1 {
        "<0.1%".to_string()
    } else {
        format!("{:.2}%", percent)
    }
}

/// A derived view of the whole life grid at one moment
#[derive(Debug)]
pub struct Grid<'a> {
    settings: &'a Settings,
    records: &'a [WeekRecord],
    by_index: HashMap<u32, &'a WeekRecord>,
    current_week: i64,
}

impl<'a> Grid<'a> {
    /// Build the grid for one render pass. `now` is read once here, so every
    /// cell of the pass agrees on which week is the present one.
    pub fn new(settings: &'a Settings, records: &'a [WeekRecord], now: NaiveDateTime) -> Self {
        // Placed by id, since the stored index goes stale when the birth date changes
        let by_index = records
            .iter()
            .filter_map(|r| locate(settings, &r.id).ok().map(|i| (i, r)))
            .collect();
        Self {
            settings,
            records,
            by_index,
            current_week: current_week_index(settings, now),
        }
    }

    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    pub fn total_weeks(&self) -> u32 {
        total_weeks(self.settings)
    }

    pub fn current_week_index(&self) -> i64 {
        self.current_week
    }

    /// Present week as a cell index, if it falls inside the grid
    pub fn present_index(&self) -> Option<u32> {
        u32::try_from(self.current_week)
            .ok()
            .filter(|i| *i < self.total_weeks())
    }

    pub fn status_of(&self, index: u32) -> CellStatus {
        let index = index as i64;
        if index < self.current_week {
            CellStatus::Past
        } else if index == self.current_week {
            CellStatus::Present
        } else {
            CellStatus::Future
        }
    }

    /// Whether the week at `index` has already started, so the editor asks
    /// for a reflection rather than a plan
    pub fn is_reflection(&self, index: u32) -> bool {
        (index as i64) <= self.current_week
    }

    pub fn record_at(&self, index: u32) -> Option<&'a WeekRecord> {
        self.by_index.get(&index).copied()
    }

    /// Start and end dates of the week at `index`
    pub fn bounds(&self, index: u32) -> Result<(NaiveDate, NaiveDate)> {
        self.check_index(index)?;
        let day = self
            .settings
            .dob
            .checked_add_signed(Duration::weeks(index as i64))
            .ok_or_else(|| {
                Error::validation(format!("week {} lies past the end of the calendar", index))
            })?;
        let start = week_start(day)?;
        Ok((start, week_end(start)?))
    }

    pub fn cell_at(&self, index: u32) -> Result<CellView<'a>> {
        let (start_date, end_date) = self.bounds(index)?;
        let record = self.record_at(index);
        let display_color = record.and_then(|r| r.explicit_color().or(r.mood.map(|m| m.color())));

        Ok(CellView {
            index,
            start_date,
            end_date,
            status: self.status_of(index),
            record,
            display_color,
        })
    }

    /// Cells for a visible range, clamped to the grid. Cells are built lazily,
    /// one per step of the iterator.
    pub fn cells(&self, range: Range<u32>) -> impl Iterator<Item = CellView<'a>> + '_ {
        let end = range.end.min(self.total_weeks());
        (range.start..end).filter_map(move |i| self.cell_at(i).ok())
    }

    pub fn progress(&self) -> ProgressStats {
        let total_weeks = self.total_weeks();
        let weeks_lived = u32::try_from(self.current_week.max(0)).unwrap_or(u32::MAX);
        let weeks_remaining = total_weeks.saturating_sub(weeks_lived);
        let percent_lived = if total_weeks == 0 {
            0.0
        } else {
            (weeks_lived as f64 / total_weeks as f64 * 100.0).clamp(0.0, 100.0)
        };

        let mut moods = MoodHistogram::default();
        for mood in self.records.iter().filter_map(|r| r.mood) {
            moods.add(mood);
        }

        ProgressStats {
            total_weeks,
            weeks_lived,
            weeks_remaining,
            percent_lived,
            moods,
        }
    }

    /// A blank record for the week at `index`, with id, index and dates
    /// consistent with each other
    pub fn envelope(&self, index: u32) -> Result<WeekRecord> {
        let (start, _) = self.bounds(index)?;
        Ok(WeekRecord::empty(index, start))
    }

    /// The record an editor save for week `index` should persist
    pub fn compose(&self, index: u32, edit: WeekEdit) -> Result<WeekRecord> {
        let mut record = self.envelope(index)?;
        record.apply_edit(edit);
        record.validate()?;
        Ok(record)
    }

    /// Map a week id back to its cell index
    pub fn index_of_id(&self, id: &str) -> Result<u32> {
        locate(self.settings, id)
    }

    fn check_index(&self, index: u32) -> Result<()> {
        let total = self.total_weeks();
        if index >= total {
            return Err(Error::OutOfRange {
                index: index as i64,
                total,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Mood, PLACEHOLDER_COLOR};
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at_noon(y: i32, m: u32, d: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(12, 0, 0).unwrap()
    }

    fn settings_1990() -> Settings {
        Settings::new(date(1990, 1, 1), 90, None)
    }

    fn record_for(grid: &Grid, index: u32, mood: Option<Mood>, color: Option<&str>) -> WeekRecord {
        let mut record = grid.envelope(index).unwrap();
        record.mood = mood;
        record.color = color.map(str::to_string);
        record
    }

    // ========== total_weeks / current_week_index tests ==========

    #[test]
    fn test_total_weeks_uses_52_per_year() {
        for years in [50, 77, 90, 120] {
            let settings = Settings::new(date(1990, 1, 1), years, None);
            assert_eq!(total_weeks(&settings), years * 52);
        }
    }

    #[test]
    fn test_scenario_1990_to_2024() {
        let settings = settings_1990();
        let now = date(2024, 1, 1).and_time(NaiveTime::MIN);
        let grid = Grid::new(&settings, &[], now);

        assert_eq!(grid.total_weeks(), 4680);
        // 12418 days between the two dates
        assert_eq!(grid.current_week_index(), 1774);
    }

    #[test]
    fn test_current_week_differs_from_52_week_approximation() {
        // 34 years at 52 weeks/year would be 1768; the exact difference is 1774
        let settings = settings_1990();
        let now = date(2024, 1, 1).and_time(NaiveTime::MIN);
        assert_ne!(current_week_index(&settings, now), 34 * WEEKS_PER_YEAR as i64);
    }

    #[test]
    fn test_current_week_index_rounds_down() {
        let settings = settings_1990();
        assert_eq!(current_week_index(&settings, at_noon(1990, 1, 1)), 0);
        assert_eq!(current_week_index(&settings, at_noon(1990, 1, 7)), 0);
        assert_eq!(current_week_index(&settings, at_noon(1990, 1, 8)), 1);
    }

    #[test]
    fn test_current_week_index_negative_before_birth() {
        let settings = settings_1990();
        assert_eq!(current_week_index(&settings, at_noon(1989, 12, 31)), -1);
        assert_eq!(current_week_index(&settings, at_noon(1989, 12, 20)), -2);
    }

    #[test]
    fn test_current_week_index_monotonic() {
        let settings = settings_1990();
        let mut now = date(1989, 6, 1).and_time(NaiveTime::MIN);
        let mut previous = current_week_index(&settings, now);
        for _ in 0..400 {
            now += Duration::hours(37);
            let current = current_week_index(&settings, now);
            assert!(current >= previous);
            previous = current;
        }
    }

    // ========== week boundary tests ==========

    #[test]
    fn test_week_start_is_sunday() {
        // 1990-01-01 was a Monday
        assert_eq!(week_start(date(1990, 1, 1)).unwrap(), date(1989, 12, 31));
        assert_eq!(week_start(date(1989, 12, 31)).unwrap(), date(1989, 12, 31));
        assert_eq!(week_end(date(1989, 12, 31)).unwrap(), date(1990, 1, 6));
    }

    #[test]
    fn test_week_end_past_calendar() {
        assert!(matches!(week_end(NaiveDate::MAX), Err(Error::Validation(_))));
    }

    #[test]
    fn test_bounds_past_calendar_end() {
        // Bypasses Settings::validate, as a corrupt settings row would
        let settings = Settings::new(date(262100, 1, 1), 120, None);
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        let last = grid.total_weeks() - 1;

        assert!(matches!(grid.cell_at(last), Err(Error::Validation(_))));
        assert!(grid.envelope(last).is_err());
        assert!(grid.cell_at(0).is_ok());
        assert!(grid.cells(0..grid.total_weeks()).count() < last as usize);
    }

    #[test]
    fn test_cells_are_contiguous() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));

        let cells: Vec<_> = grid.cells(0..grid.total_weeks()).collect();
        assert_eq!(cells.len(), 4680);
        for cell in &cells {
            assert!(cell.start_date <= cell.end_date);
            assert_eq!(cell.start_date.weekday(), Weekday::Sun);
        }
        for pair in cells.windows(2) {
            assert_eq!(pair[1].start_date, pair[0].end_date + Duration::days(1));
        }
    }

    #[test]
    fn test_first_cell_contains_birth_date() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        let cell = grid.cell_at(0).unwrap();
        assert!(cell.start_date <= settings.dob && settings.dob <= cell.end_date);
    }

    #[test]
    fn test_cell_at_out_of_range() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        assert!(grid.cell_at(4679).is_ok());
        assert!(matches!(
            grid.cell_at(4680),
            Err(Error::OutOfRange {
                index: 4680,
                total: 4680
            })
        ));
    }

    #[test]
    fn test_cells_range_is_clamped() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        assert_eq!(grid.cells(4670..5000).count(), 10);
        assert_eq!(grid.cells(5000..6000).count(), 0);
    }

    // ========== status tests ==========

    #[test]
    fn test_status_partition() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        let current = grid.current_week_index() as u32;

        let cells: Vec<_> = grid.cells(0..grid.total_weeks()).collect();
        let present: Vec<_> = cells
            .iter()
            .filter(|c| c.status == CellStatus::Present)
            .collect();
        assert_eq!(present.len(), 1);
        assert_eq!(present[0].index, current);
        assert_eq!(grid.present_index(), Some(current));

        for cell in &cells {
            let expected = match cell.index.cmp(&current) {
                std::cmp::Ordering::Less => CellStatus::Past,
                std::cmp::Ordering::Equal => CellStatus::Present,
                std::cmp::Ordering::Greater => CellStatus::Future,
            };
            assert_eq!(cell.status, expected);
        }
    }

    #[test]
    fn test_future_birth_date_is_all_future() {
        let settings = Settings::new(date(2030, 5, 5), 80, None);
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));

        assert!(grid.current_week_index() < 0);
        assert!(grid.present_index().is_none());
        assert!(grid
            .cells(0..grid.total_weeks())
            .all(|c| c.status == CellStatus::Future));

        let stats = grid.progress();
        assert_eq!(stats.weeks_lived, 0);
        assert_eq!(stats.weeks_remaining, 80 * 52);
        assert_eq!(stats.percent_lived, 0.0);
    }

    #[test]
    fn test_expectancy_exceeded() {
        let settings = Settings::new(date(1900, 1, 1), 50, None);
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));

        assert!(grid.present_index().is_none());
        assert!(grid
            .cells(0..grid.total_weeks())
            .all(|c| c.status == CellStatus::Past));

        let stats = grid.progress();
        assert_eq!(stats.weeks_remaining, 0);
        assert_eq!(stats.percent_lived, 100.0);
    }

    #[test]
    fn test_is_reflection() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], date(2024, 1, 1).and_time(NaiveTime::MIN));
        assert!(grid.is_reflection(1773));
        assert!(grid.is_reflection(1774));
        assert!(!grid.is_reflection(1775));
    }

    // ========== display color tests ==========

    #[test]
    fn test_mood_color_fallback() {
        let settings = settings_1990();
        let empty = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        let records = vec![record_for(&empty, 10, Some(Mood::Great), None)];
        let grid = Grid::new(&settings, &records, at_noon(2024, 1, 1));

        let cell = grid.cell_at(10).unwrap();
        assert_eq!(cell.display_color, Some("#22c55e"));
        assert!(cell.has_data());
    }

    #[test]
    fn test_explicit_color_overrides_mood() {
        let settings = settings_1990();
        let empty = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        let records = vec![record_for(&empty, 10, Some(Mood::Great), Some("#123abc"))];
        let grid = Grid::new(&settings, &records, at_noon(2024, 1, 1));

        assert_eq!(grid.cell_at(10).unwrap().display_color, Some("#123abc"));
    }

    #[test]
    fn test_placeholder_color_is_ignored() {
        let settings = settings_1990();
        let empty = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        let records = vec![
            record_for(&empty, 10, Some(Mood::Bad), Some(PLACEHOLDER_COLOR)),
            record_for(&empty, 11, None, Some(PLACEHOLDER_COLOR)),
        ];
        let grid = Grid::new(&settings, &records, at_noon(2024, 1, 1));

        assert_eq!(grid.cell_at(10).unwrap().display_color, Some("#f59e0b"));
        let blank = grid.cell_at(11).unwrap();
        assert_eq!(blank.display_color, None);
        assert!(blank.record.is_some());
        assert!(!blank.has_data());
    }

    #[test]
    fn test_cell_without_record() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        let cell = grid.cell_at(3).unwrap();
        assert!(cell.record.is_none());
        assert!(cell.display_color.is_none());
        assert!(!cell.has_data());
    }

    // ========== progress tests ==========

    #[test]
    fn test_progress_stats() {
        let settings = settings_1990();
        let now = date(2024, 1, 1).and_time(NaiveTime::MIN);
        let empty = Grid::new(&settings, &[], now);
        let records = vec![
            record_for(&empty, 1, Some(Mood::Great), None),
            record_for(&empty, 2, Some(Mood::Great), None),
            record_for(&empty, 3, Some(Mood::Terrible), None),
            record_for(&empty, 4, None, Some("#abcdef")),
        ];
        let grid = Grid::new(&settings, &records, now);
        let stats = grid.progress();

        assert_eq!(stats.total_weeks, 4680);
        assert_eq!(stats.weeks_lived, 1774);
        assert_eq!(stats.weeks_remaining, 4680 - 1774);
        assert!((stats.percent_lived - 1774.0 / 4680.0 * 100.0).abs() < 1e-9);
        assert_eq!(stats.moods.get(Mood::Great), 2);
        assert_eq!(stats.moods.get(Mood::Terrible), 1);
        assert_eq!(stats.moods.total(), 3);
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(0.0), "0%");
        assert_eq!(format_percentage(0.04), "<0.1%");
        assert_eq!(format_percentage(0.1), "0.10%");
        assert_eq!(format_percentage(37.5), "37.50%");
        assert_eq!(format_percentage(100.0), "100.00%");
    }

    #[test]
    fn test_first_week_percentage_label() {
        // One week lived out of 4680 is about 0.02%
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(1990, 1, 9));
        assert_eq!(format_percentage(grid.progress().percent_lived), "<0.1%");
    }

    // ========== editor tests ==========

    #[test]
    fn test_envelope_is_consistent() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        let record = grid.envelope(1774).unwrap();

        let (start, end) = grid.bounds(1774).unwrap();
        assert_eq!(record.week_index, 1774);
        assert_eq!(record.start_date, start);
        assert_eq!(record.end_date, end);
        assert_eq!(record.id, start.format("%Y-%m-%d").to_string());
        assert!(record.validate().is_ok());
        assert_eq!(grid.index_of_id(&record.id).unwrap(), 1774);
    }

    #[test]
    fn test_envelope_id_independent_of_expectancy() {
        let short = Settings::new(date(1990, 1, 1), 50, None);
        let long = Settings::new(date(1990, 1, 1), 120, None);
        let now = at_noon(2024, 1, 1);
        let a = Grid::new(&short, &[], now).envelope(100).unwrap();
        let b = Grid::new(&long, &[], now).envelope(100).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_compose_applies_mood_color() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        let record = grid
            .compose(
                42,
                WeekEdit {
                    title: Some("Graduation".to_string()),
                    mood: Some(Mood::Great),
                    color: Some(PLACEHOLDER_COLOR.to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(record.week_index, 42);
        assert_eq!(record.color.as_deref(), Some("#22c55e"));
    }

    #[test]
    fn test_compose_rejects_bad_color() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        let result = grid.compose(
            42,
            WeekEdit {
                color: Some("blue".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_compose_out_of_range() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        assert!(matches!(
            grid.compose(9999, WeekEdit::default()),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_index_of_id_rejects_non_week_start() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        // 2024-01-01 is a Monday
        assert!(matches!(
            grid.index_of_id("2024-01-01"),
            Err(Error::Validation(_))
        ));
        assert!(grid.index_of_id("garbage").is_err());
    }

    #[test]
    fn test_index_of_id_outside_grid() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        assert!(matches!(
            grid.index_of_id("1989-12-24"),
            Err(Error::OutOfRange { index: -1, .. })
        ));
        assert_eq!(grid.index_of_id("1989-12-31").unwrap(), 0);
    }

    #[test]
    fn test_index_of_id_at_calendar_start() {
        let settings = settings_1990();
        let grid = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        let id = crate::types::week_id(NaiveDate::MIN);
        assert!(grid.index_of_id(&id).is_err());
    }

    #[test]
    fn test_records_follow_birth_date_change() {
        let before = settings_1990();
        let now = at_noon(2024, 1, 1);
        let old = Grid::new(&before, &[], now);
        let records = vec![
            record_for(&old, 1775, Some(Mood::Good), None),
            record_for(&old, 0, Some(Mood::Bad), None),
        ];
        assert_eq!(records[0].id, "2024-01-07");

        // Two weeks later; the first saved week now lies before the grid
        let after = Settings::new(date(1990, 1, 15), 90, None);
        let grid = Grid::new(&after, &records, now);

        let cell = grid.cell_at(1773).unwrap();
        assert_eq!(cell.start_date, date(2024, 1, 7));
        assert_eq!(cell.record, Some(&records[0]));
        assert!(grid.cell_at(1775).unwrap().record.is_none());
        assert!(grid.cell_at(0).unwrap().record.is_none());
        assert_eq!(grid.index_of_id(&records[0].id).unwrap(), 1773);

        // Saving the week again realigns the stored index
        let saved = grid.compose(1773, WeekEdit::default()).unwrap();
        assert_eq!(saved.id, records[0].id);
        assert_eq!(saved.week_index, 1773);
    }

    #[test]
    fn test_record_lookup_by_index() {
        let settings = settings_1990();
        let empty = Grid::new(&settings, &[], at_noon(2024, 1, 1));
        let records = vec![record_for(&empty, 7, Some(Mood::Neutral), None)];
        let grid = Grid::new(&settings, &records, at_noon(2024, 1, 1));

        assert!(grid.record_at(7).is_some());
        assert!(grid.record_at(8).is_none());
        assert_eq!(grid.cell_at(7).unwrap().record, Some(&records[0]));
    }
}
