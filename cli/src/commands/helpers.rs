use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use clearplate_core::models::{DaySummary, DishAnalysis, IngredientAssessment};
use clearplate_core::selection::Bucket;
use clearplate_core::session::{LoggingSession, ManualIngredient};
use uuid::Uuid;

pub(crate) fn parse_date(date_str: Option<&str>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[derive(Tabled)]
struct IngredientRow {
    #[tabled(rename = "#")]
    idx: String,
    #[tabled(rename = "Sel")]
    selected: &'static str,
    #[tabled(rename = "Ingredient")]
    name: String,
    #[tabled(rename = "Risk")]
    risk: String,
    #[tabled(rename = "Why")]
    explanation: String,
}

fn render(rows: &[IngredientRow]) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0)).with(Alignment::right()))
        .to_string()
}

fn assessment_row(
    idx: Option<usize>,
    selected: bool,
    assessment: &IngredientAssessment,
) -> IngredientRow {
    IngredientRow {
        idx: idx.map(|i| i.to_string()).unwrap_or_default(),
        selected: if selected { "[x]" } else { "[ ]" },
        name: truncate(&assessment.name, 30),
        risk: assessment.acne_risk.to_string(),
        explanation: truncate(&assessment.explanation, 60),
    }
}

/// Print one table per dish. Rows are not numbered.
pub(crate) fn print_dishes(dishes: &[DishAnalysis]) {
    for dish in dishes {
        let rows: Vec<IngredientRow> = dish
            .ingredients
            .iter()
            .map(|a| assessment_row(None, false, a))
            .collect();
        println!("{}", dish.dish);
        println!("{}", render(&rows));
    }
}

pub(crate) fn print_ingredient(assessment: &IngredientAssessment) {
    println!("{}", render(&[assessment_row(None, false, assessment)]));
}

/// Print dish tables followed by the manual bucket, numbering every row.
/// Numbers run across all tables in display order, matching
/// [`numbered_entries`].
pub(crate) fn print_session_tables(session: &LoggingSession) {
    let mut n = 0;
    for dish in session.dishes() {
        let bucket = Bucket::dish(&dish.dish);
        let rows: Vec<IngredientRow> = dish
            .ingredients
            .iter()
            .map(|a| {
                n += 1;
                assessment_row(Some(n), session.is_selected(a.id, &bucket), a)
            })
            .collect();
        println!("{bucket}");
        println!("{}", render(&rows));
    }

    let manual = session.manual_ingredients();
    if manual.is_empty() {
        return;
    }
    let rows: Vec<IngredientRow> = manual
        .iter()
        .map(|m| {
            n += 1;
            let selected = session.is_selected(m.id(), &Bucket::Manual);
            match m {
                ManualIngredient::Resolved(a) => assessment_row(Some(n), selected, a),
                ManualIngredient::Pending { name, .. } => IngredientRow {
                    idx: n.to_string(),
                    selected: if selected { "[x]" } else { "[ ]" },
                    name: truncate(name, 30),
                    risk: m.risk_label().to_string(),
                    explanation: String::new(),
                },
            }
        })
        .collect();
    println!("{}", Bucket::Manual);
    println!("{}", render(&rows));
}

/// Ingredient ids with their bucket, in the order [`print_session_tables`]
/// numbers them.
pub(crate) fn numbered_entries(session: &LoggingSession) -> Vec<(Uuid, Bucket)> {
    let dishes = session.dishes().iter().flat_map(|dish| {
        dish.ingredients
            .iter()
            .map(|a| (a.id, Bucket::dish(&dish.dish)))
    });
    let manual = session
        .manual_ingredients()
        .iter()
        .map(|m| (m.id(), Bucket::Manual));
    dishes.chain(manual).collect()
}

pub(crate) fn print_day_summary(summary: &DaySummary) {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Meal")]
        meal_type: String,
        #[tabled(rename = "Foods")]
        foods: String,
        #[tabled(rename = "Ingredients")]
        ingredients: String,
        #[tabled(rename = "ID")]
        id: String,
    }

    #[derive(Tabled)]
    struct BreakoutRow {
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Severity")]
        severity: String,
        #[tabled(rename = "Notes")]
        notes: String,
        #[tabled(rename = "ID")]
        id: String,
    }

    println!("{}", summary.date.format("%A, %B %-d, %Y"));
    if summary.is_empty() {
        println!("No entries.");
        return;
    }

    let meal_rows: Vec<MealRow> = summary
        .meals
        .iter()
        .flat_map(|group| &group.entries)
        .map(|m| MealRow {
            time: m.date.format("%H:%M").to_string(),
            meal_type: m.meal_type.to_string(),
            foods: truncate(&m.foods.join(", "), 40),
            ingredients: truncate(
                &m.selected_ingredients
                    .iter()
                    .map(|a| format!("{} ({})", a.name, a.acne_risk))
                    .collect::<Vec<_>>()
                    .join(", "),
                50,
            ),
            id: m.id.to_string(),
        })
        .collect();
    if !meal_rows.is_empty() {
        println!("{}", Table::new(&meal_rows).with(Style::rounded()));
    }

    let breakout_rows: Vec<BreakoutRow> = summary
        .breakouts
        .iter()
        .map(|b| BreakoutRow {
            time: b.date.format("%H:%M").to_string(),
            severity: b.severity.to_string(),
            notes: b.notes.as_deref().map(|n| truncate(n, 40)).unwrap_or_default(),
            id: b.id.to_string(),
        })
        .collect();
    if !breakout_rows.is_empty() {
        println!("Breakouts");
        println!("{}", Table::new(&breakout_rows).with(Style::rounded()));
    }

    if !summary.high_risk_ingredients.is_empty() {
        println!(
            "High-risk ingredients: {}",
            summary.high_risk_ingredients.join(", ")
        );
    }
}
