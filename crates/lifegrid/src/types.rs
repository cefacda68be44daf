use chrono::{Datelike, Days, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default life expectancy when none is given
pub const DEFAULT_LIFE_EXPECTANCY: u32 = 90;

/// Accepted life expectancy range, in years
pub const MIN_LIFE_EXPECTANCY: u32 = 50;
pub const MAX_LIFE_EXPECTANCY: u32 = 120;

/// Accepted birth years. Every week of the longest grid then still has a
/// four-digit year in its id.
pub const MIN_BIRTH_YEAR: i32 = 1000;
pub const MAX_BIRTH_YEAR: i32 = 9000;

/// Color a color picker reports when the user never touched it.
/// A record carrying it has no explicit color.
pub const PLACEHOLDER_COLOR: &str = "#000000";

/// Format used for week ids and every date on the wire
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Subjective quality of a week
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Great,
    Good,
    Neutral,
    Bad,
    Terrible,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::Great,
        Mood::Good,
        Mood::Neutral,
        Mood::Bad,
        Mood::Terrible,
    ];

    /// Canonical display color for this mood
    pub fn color(self) -> &'static str {
        match self {
            Mood::Great => "#22c55e",
            Mood::Good => "#84cc16",
            Mood::Neutral => "#94a3b8",
            Mood::Bad => "#f59e0b",
            Mood::Terrible => "#ef4444",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mood::Great => "Great",
            Mood::Good => "Good",
            Mood::Neutral => "Neutral",
            Mood::Bad => "Bad",
            Mood::Terrible => "Terrible",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Great => "great",
            Mood::Good => "good",
            Mood::Neutral => "neutral",
            Mood::Bad => "bad",
            Mood::Terrible => "terrible",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| Error::validation(format!("unknown mood '{}'", s)))
    }
}

/// The one user's settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Date of birth
    pub dob: NaiveDate,

    /// Target lifespan in years; defines the grid length
    #[serde(default = "default_life_expectancy")]
    pub life_expectancy_years: u32,

    /// Display name, no effect on any computation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

fn default_life_expectancy() -> u32 {
    DEFAULT_LIFE_EXPECTANCY
}

impl Settings {
    pub fn new(dob: NaiveDate, life_expectancy_years: u32, name: Option<String>) -> Self {
        Self {
            dob,
            life_expectancy_years,
            name: non_blank(name),
        }
    }

    /// Build settings from raw form input, parsing the birth date
    pub fn parse(dob: &str, life_expectancy_years: Option<u32>, name: Option<String>) -> Result<Self> {
        let dob = parse_date(dob)?;
        let settings = Self::new(
            dob,
            life_expectancy_years.unwrap_or(DEFAULT_LIFE_EXPECTANCY),
            name,
        );
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_BIRTH_YEAR..=MAX_BIRTH_YEAR).contains(&self.dob.year()) {
            return Err(Error::validation(format!(
                "birth year must be between {} and {}, got {}",
                MIN_BIRTH_YEAR,
                MAX_BIRTH_YEAR,
                self.dob.year()
            )));
        }
        if !(MIN_LIFE_EXPECTANCY..=MAX_LIFE_EXPECTANCY).contains(&self.life_expectancy_years) {
            return Err(Error::validation(format!(
                "life expectancy must be between {} and {} years, got {}",
                MIN_LIFE_EXPECTANCY, MAX_LIFE_EXPECTANCY, self.life_expectancy_years
            )));
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(Error::validation("name must not be blank"));
        }
        Ok(())
    }
}

/// User content attached to one week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekRecord {
    /// ISO date of the week start; independent of the grid length
    pub id: String,

    /// Whole weeks between the birth date and this week
    pub week_index: u32,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,

    /// Custom hex color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl WeekRecord {
    /// A record with no content, for the week starting on `start_date`
    pub fn empty(week_index: u32, start_date: NaiveDate) -> Self {
        Self {
            id: week_id(start_date),
            week_index,
            start_date,
            end_date: start_date + Duration::days(6),
            title: None,
            notes: None,
            mood: None,
            color: None,
        }
    }

    /// Color chosen explicitly by the user, ignoring the placeholder
    pub fn explicit_color(&self) -> Option<&str> {
        self.color
            .as_deref()
            .filter(|c| !c.eq_ignore_ascii_case(PLACEHOLDER_COLOR))
    }

    /// Whether the record carries anything the user wrote or picked.
    /// Cleared records stay in the store but count as absent here.
    pub fn has_data(&self) -> bool {
        is_present(&self.title)
            || is_present(&self.notes)
            || self.mood.is_some()
            || self.explicit_color().is_some()
    }

    /// Replace the user content wholesale, as the week editor does on save
    pub fn apply_edit(&mut self, edit: WeekEdit) {
        self.title = non_blank(edit.title);
        self.notes = non_blank(edit.notes);
        self.mood = edit.mood;
        self.color = saved_color(edit.mood, non_blank(edit.color));
    }

    /// Merge only the fields present in `edit`. An empty string clears a field.
    pub fn apply_patch(&mut self, edit: WeekEdit) {
        if let Some(title) = edit.title {
            self.title = non_blank(Some(title));
        }
        if let Some(notes) = edit.notes {
            self.notes = non_blank(Some(notes));
        }
        if let Some(mood) = edit.mood {
            self.mood = Some(mood);
        }
        if let Some(color) = edit.color {
            self.color = non_blank(Some(color));
        }
        self.color = saved_color(self.mood, self.color.take());
    }

    /// Check the shape of the record: dates line up with the id and form
    /// one Sunday-to-Saturday week, and the color is a hex color.
    pub fn validate(&self) -> Result<()> {
        if self.start_date.weekday() != Weekday::Sun {
            return Err(Error::validation(format!(
                "week start {} is not a Sunday",
                self.start_date
            )));
        }
        if self.start_date.checked_add_days(Days::new(6)) != Some(self.end_date) {
            return Err(Error::validation(format!(
                "week end {} does not close the week starting {}",
                self.end_date, self.start_date
            )));
        }
        if self.id != week_id(self.start_date) {
            return Err(Error::validation(format!(
                "week id '{}' does not match start date {}",
                self.id, self.start_date
            )));
        }
        if let Some(color) = &self.color {
            if !is_hex_color(color) {
                return Err(Error::validation(format!("'{}' is not a hex color", color)));
            }
        }
        Ok(())
    }
}

/// Edit of a week's user content, as submitted by an editor surface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekEdit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Temporal classification of a week relative to now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    Past,
    Present,
    Future,
}

impl CellStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CellStatus::Past => "past",
            CellStatus::Present => "present",
            CellStatus::Future => "future",
        }
    }
}

/// One rendered week of the grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellView<'a> {
    pub index: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CellStatus,
    pub record: Option<&'a WeekRecord>,
    pub display_color: Option<&'a str>,
}

impl CellView<'_> {
    pub fn has_data(&self) -> bool {
        self.record.is_some_and(WeekRecord::has_data)
    }

    pub fn tooltip(&self) -> String {
        match self.status {
            CellStatus::Present => "This Week • Click to reflect".to_string(),
            _ => format!("Week {} • Click to add a memory", self.index),
        }
    }
}

/// Count of records per mood
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MoodHistogram {
    pub great: usize,
    pub good: usize,
    pub neutral: usize,
    pub bad: usize,
    pub terrible: usize,
}

impl MoodHistogram {
    pub fn add(&mut self, mood: Mood) {
        *self.slot(mood) += 1;
    }

    pub fn get(&self, mood: Mood) -> usize {
        match mood {
            Mood::Great => self.great,
            Mood::Good => self.good,
            Mood::Neutral => self.neutral,
            Mood::Bad => self.bad,
            Mood::Terrible => self.terrible,
        }
    }

    pub fn total(&self) -> usize {
        Mood::ALL.iter().map(|m| self.get(*m)).sum()
    }

    /// Moods with at least one week, in canonical order
    pub fn non_empty(&self) -> impl Iterator<Item = (Mood, usize)> + '_ {
        Mood::ALL
            .into_iter()
            .map(move |m| (m, self.get(m)))
            .filter(|(_, count)| *count > 0)
    }

    fn slot(&mut self, mood: Mood) -> &mut usize {
        match mood {
            Mood::Great => &mut self.great,
            Mood::Good => &mut self.good,
            Mood::Neutral => &mut self.neutral,
            Mood::Bad => &mut self.bad,
            Mood::Terrible => &mut self.terrible,
        }
    }
}

/// Life progress summary shown next to the grid
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total_weeks: u32,
    pub weeks_lived: u32,
    pub weeks_remaining: u32,
    pub percent_lived: f64,
    pub moods: MoodHistogram,
}

/// Week id for the week starting on `start_date`
pub fn week_id(start_date: NaiveDate) -> String {
    start_date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| Error::validation(format!("'{}' is not a valid YYYY-MM-DD date: {}", s, e)))
}

/// `#rgb` or `#rrggbb`
pub fn is_hex_color(s: &str) -> bool {
    match s.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Color to persist: a picked mood fills in for a missing or placeholder color
fn saved_color(mood: Option<Mood>, color: Option<String>) -> Option<String> {
    match (mood, color) {
        (Some(mood), None) => Some(mood.color().to_string()),
        (Some(mood), Some(c)) if c.eq_ignore_ascii_case(PLACEHOLDER_COLOR) => {
            Some(mood.color().to_string())
        }
        (_, color) => color,
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

fn is_present(s: &Option<String>) -> bool {
    s.as_deref().is_some_and(|v| !v.trim().is_empty())
}
