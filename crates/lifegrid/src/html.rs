use anyhow::Result;
use chrono::NaiveDateTime;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::fs;
use std::path::Path;

use crate::grid::{format_percentage, Grid};
use crate::types::{
    Mood, Settings, WeekRecord, DEFAULT_LIFE_EXPECTANCY, MAX_LIFE_EXPECTANCY,
    MIN_LIFE_EXPECTANCY, PLACEHOLDER_COLOR,
};

/// Generate a static HTML file of the grid
pub fn generate_html(
    settings: &Settings,
    records: &[WeekRecord],
    now: NaiveDateTime,
    path: &Path,
) -> Result<()> {
    let grid = Grid::new(settings, records, now);
    let html = render_page(&grid);
    fs::write(path, html.into_string())?;
    Ok(())
}

fn layout(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body { (body) }
        }
    }
}

pub fn render_page(grid: &Grid) -> Markup {
    let settings = grid.settings();

    layout(
        "LifeGrid",
        html! {
            div.page {
                main.grid-area {
                    header {
                        h1 { "LifeGrid" }
                        @if let Some(name) = &settings.name {
                            p.subtitle {
                                (name) "'s life map • " (settings.life_expectancy_years) " years"
                            }
                        }
                        p.hint { "Each box represents one week. Click to reflect." }
                    }
                    div.weeks #"weeks" {
                        @for cell in grid.cells(0..grid.total_weeks()) {
                            a.cell.(cell.status.as_str()).has-data[cell.has_data()]
                                href={ "/weeks/" (cell.index) }
                                title=(cell.tooltip())
                                data-week=(cell.index)
                                style=[cell.display_color.map(|c| format!("background-color: {}", c))] {}
                        }
                    }
                }
                aside.sidebar { (render_stats(grid)) }
            }
        },
    )
}

/// Life progress and mood summary
pub fn render_stats(grid: &Grid) -> Markup {
    let stats = grid.progress();
    let percent = format_percentage(stats.percent_lived);

    html! {
        section.card {
            h2 { "Life Progress" }
            div.big #"percent-lived" { (percent) }
            div.muted { (stats.weeks_lived) " / " (stats.total_weeks) " weeks" }
            div.bar {
                div.bar-fill style={ "width: " (format!("{:.2}", stats.percent_lived)) "%" } {}
            }
        }
        @if let Some(present) = grid.present_index() {
            a.button #"this-week" href={ "/weeks/" (present) } { "Reflect on this week" }
        }
        div.pair {
            section.card {
                div.number #"weeks-lived" { (stats.weeks_lived) }
                div.label { "Weeks Lived" }
            }
            section.card {
                div.number #"weeks-remaining" { (stats.weeks_remaining) }
                div.label { "Weeks Left" }
            }
        }
        @if stats.moods.total() > 0 {
            section.card {
                h2 { "Mood Analysis" }
                ul.legend {
                    @for (mood, count) in stats.moods.non_empty() {
                        li {
                            span.swatch style={ "background-color: " (mood.color()) } {}
                            (mood.label()) " (" (count) ")"
                        }
                    }
                }
            }
        }
        p.muted.center { "Target age: " (grid.settings().life_expectancy_years) " years" }
    }
}

/// Editor for one week. Fails when `index` is outside the grid.
pub fn render_editor(grid: &Grid, index: u32) -> crate::Result<Markup> {
    let (start, end) = grid.bounds(index)?;
    let record = grid.record_at(index);
    let field = |f: fn(&WeekRecord) -> Option<&String>| {
        record.and_then(f).cloned().unwrap_or_default()
    };
    let mood = record.and_then(|r| r.mood);
    let color = record
        .and_then(|r| r.color.clone())
        .unwrap_or_else(|| PLACEHOLDER_COLOR.to_string());
    let heading = if grid.is_reflection(index) {
        "Reflect on this week"
    } else {
        "Plan for this week"
    };

    Ok(layout(
        heading,
        html! {
            div.editor {
                div.muted.mono { "Week " (index + 1) }
                h1 { (heading) }
                p.muted {
                    (start.format("%b %-d, %Y")) " — " (end.format("%b %-d, %Y"))
                }
                form method="post" action={ "/weeks/" (index) } {
                    label for="title" { "Highlight / Title" }
                    input #title type="text" name="title"
                        placeholder="Big promotion, Trip to Japan, etc."
                        value=(field(|r| r.title.as_ref()));

                    fieldset.moods {
                        legend { "How was it?" }
                        @for m in Mood::ALL {
                            label.mood {
                                input type="radio" name="mood" value=(m.as_str()) checked[mood == Some(m)];
                                span.swatch style={ "background-color: " (m.color()) } {}
                                (m.label())
                            }
                        }
                    }

                    label for="notes" { "Journal" }
                    textarea #notes name="notes" placeholder="What happened? What did you learn?" {
                        (field(|r| r.notes.as_ref()))
                    }

                    label for="color" { "Custom Color" }
                    input #color type="color" name="color" value=(color);

                    div.actions {
                        a.button href="/" { "Cancel" }
                        button type="submit" { "Save Memory" }
                    }
                }
            }
        },
    ))
}

/// First-run form asking for a birth date and life expectancy
pub fn render_onboarding(error: Option<&str>) -> Markup {
    layout(
        "Welcome to LifeGrid",
        html! {
            div.editor {
                h1 { "Your life in weeks" }
                p.muted { "Tell us when you were born to draw your grid." }
                @if let Some(error) = error {
                    p.error { (error) }
                }
                form method="post" action="/settings" {
                    label for="name" { "Name" }
                    input #name type="text" name="name";

                    label for="dob" { "Date of birth" }
                    input #dob type="date" name="dob" required;

                    label for="life_expectancy_years" { "Life expectancy (years)" }
                    input #life_expectancy_years type="number" name="life_expectancy_years"
                        min=(MIN_LIFE_EXPECTANCY) max=(MAX_LIFE_EXPECTANCY)
                        value=(DEFAULT_LIFE_EXPECTANCY);

                    div.actions {
                        button type="submit" { "Start" }
                    }
                }
            }
        },
    )
}

const CSS: &str = r#"
* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Inter', sans-serif;
    background: #fafaf9;
    color: #1c1917;
    line-height: 1.4;
}

.page {
    display: flex;
    min-height: 100vh;
}

.grid-area {
    flex: 1;
    padding: 24px 32px 80px;
    max-width: 1100px;
    margin: 0 auto;
}

h1 {
    font-size: 1.9em;
    font-weight: 700;
}

h2 {
    font-size: 0.8em;
    text-transform: uppercase;
    letter-spacing: 0.08em;
    color: #78716c;
    margin-bottom: 8px;
}

.subtitle, .hint, .muted {
    color: #78716c;
}

.hint {
    font-size: 0.85em;
    margin: 12px 0 28px;
}

.weeks {
    display: grid;
    grid-template-columns: repeat(auto-fill, minmax(12px, 1fr));
    gap: 4px;
}

.cell {
    display: block;
    width: 12px;
    height: 12px;
    border-radius: 2px;
    transition: transform 0.2s;
}

.cell:hover {
    transform: scale(1.5);
}

.cell.past {
    background: #e7e5e4;
}

.cell.present {
    background: #1c1917;
    transform: scale(1.25);
    box-shadow: 0 0 8px rgba(0,0,0,0.2);
}

.cell.future {
    border: 1px solid #f5f5f4;
}

.sidebar {
    width: 320px;
    border-left: 1px solid #e7e5e4;
    background: #fff;
    padding: 24px;
}

.card {
    background: #fafaf9;
    border-radius: 8px;
    padding: 16px;
    margin-bottom: 16px;
}

#this-week {
    display: block;
    text-align: center;
    margin-bottom: 16px;
}

.big {
    font-size: 2.4em;
    font-weight: 700;
}

.number {
    font-size: 1.5em;
    font-weight: 700;
    font-family: monospace;
}

.label {
    font-size: 0.7em;
    text-transform: uppercase;
    color: #78716c;
}

.pair {
    display: grid;
    grid-template-columns: 1fr 1fr;
    gap: 16px;
}

.bar {
    height: 8px;
    background: #e7e5e4;
    border-radius: 4px;
    overflow: hidden;
    margin-top: 12px;
}

.bar-fill {
    height: 100%;
    background: #1c1917;
}

.legend {
    list-style: none;
    display: grid;
    grid-template-columns: 1fr 1fr;
    gap: 6px;
    font-size: 0.8em;
}

.swatch {
    display: inline-block;
    width: 12px;
    height: 12px;
    border-radius: 2px;
    margin-right: 6px;
    vertical-align: middle;
}

.center {
    text-align: center;
    font-size: 0.8em;
}

.editor {
    max-width: 480px;
    margin: 48px auto;
    padding: 0 16px;
}

.mono {
    font-family: monospace;
    text-transform: uppercase;
}

form {
    display: grid;
    gap: 10px;
    margin-top: 24px;
}

input[type="text"], input[type="date"], input[type="number"], textarea {
    padding: 8px;
    border: 1px solid #d6d3d1;
    border-radius: 6px;
    font: inherit;
}

textarea {
    min-height: 120px;
    resize: none;
}

.moods {
    border: none;
    display: flex;
    justify-content: space-between;
}

.mood {
    font-size: 0.7em;
    text-transform: uppercase;
}

.actions {
    display: flex;
    justify-content: flex-end;
    gap: 12px;
    padding-top: 16px;
    border-top: 1px solid #e7e5e4;
}

.error {
    color: #ef4444;
}

@media (max-width: 768px) {
    .page {
        flex-direction: column;
    }

    .sidebar {
        width: 100%;
        border-left: none;
    }
}
"#;
