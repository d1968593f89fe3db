use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDate};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use uuid::Uuid;

use clearplate_core::error::AnalysisError;
use clearplate_core::models::{
    BreakoutRecord, DishAnalysis, IngredientAssessment, MealType, Severity, parse_local_datetime,
};
use clearplate_core::selection::Bucket;
use clearplate_core::service::{AnalysisService, CompletionProvider};
use clearplate_core::session::{AnalysisTicket, LoggingSession, PendingIngredient};
use clearplate_core::store::RecordStore;

use super::helpers::{numbered_entries, parse_date, print_day_summary, print_session_tables};

const HELP: &str = "\
Commands:
  food <name>                   add a food to the meal
  unfood <n>                    remove food number n
  meal <type>                   breakfast, lunch, dinner or snack
  at <YYYY-MM-DD HH:MM|now>     set when the meal was eaten
  analyze                       ask for the ingredients of the foods
  toggle <n>                    select or unselect ingredient number n from the last 'show'
  add <ingredient>              add an ingredient by hand
  remove <ingredient>           remove a hand-added ingredient
  show                          show the meal being logged
  save                          save the meal and start a new one
  cancel                        discard the meal being logged
  day [date]                    show the meals and breakouts of a day
  breakout <severity> [notes]   record a breakout (mild, moderate, severe)
  delete <id>                   delete a saved meal or breakout
  help                          show this help
  quit                          leave";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionCommand {
    Food(String),
    Unfood(usize),
    Meal(MealType),
    /// `None` means now.
    At(Option<DateTime<Local>>),
    Analyze,
    Toggle(usize),
    Add(String),
    Remove(String),
    Show,
    Save,
    Cancel,
    Day(NaiveDate),
    Breakout {
        severity: Severity,
        notes: Option<String>,
    },
    Delete(Uuid),
    Help,
    Quit,
    Empty,
}

fn required<'a>(arg: &'a str, usage: &str) -> Result<&'a str> {
    if arg.is_empty() {
        bail!("Usage: {usage}");
    }
    Ok(arg)
}

fn position(arg: &str, usage: &str) -> Result<usize> {
    let n = required(arg, usage)?
        .parse::<usize>()
        .with_context(|| format!("Invalid number '{arg}'. Usage: {usage}"))?;
    if n == 0 {
        bail!("Numbers start at 1");
    }
    Ok(n)
}

pub(crate) fn parse_command(line: &str) -> Result<SessionCommand> {
    let line = line.trim();
    let (word, arg) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "" => SessionCommand::Empty,
        "food" => SessionCommand::Food(required(arg, "food <name>")?.to_string()),
        "unfood" => SessionCommand::Unfood(position(arg, "unfood <n>")?),
        "meal" => SessionCommand::Meal(required(arg, "meal <type>")?.parse()?),
        "at" => match required(arg, "at <YYYY-MM-DD HH:MM|now>")? {
            "now" => SessionCommand::At(None),
            when => SessionCommand::At(Some(parse_local_datetime(when)?)),
        },
        "analyze" => SessionCommand::Analyze,
        "toggle" => SessionCommand::Toggle(position(arg, "toggle <n>")?),
        "add" => SessionCommand::Add(required(arg, "add <ingredient>")?.to_string()),
        "remove" => SessionCommand::Remove(required(arg, "remove <ingredient>")?.to_string()),
        "show" => SessionCommand::Show,
        "save" => SessionCommand::Save,
        "cancel" => SessionCommand::Cancel,
        "day" => SessionCommand::Day(parse_date((!arg.is_empty()).then_some(arg))?),
        "breakout" => {
            let arg = required(arg, "breakout <severity> [notes]")?;
            let (severity, notes) = match arg.split_once(char::is_whitespace) {
                Some((severity, notes)) => (severity, Some(notes.trim().to_string())),
                None => (arg, None),
            };
            SessionCommand::Breakout {
                severity: severity.parse()?,
                notes,
            }
        }
        "delete" => {
            let arg = required(arg, "delete <id>")?;
            SessionCommand::Delete(
                arg.parse::<Uuid>()
                    .with_context(|| format!("Invalid id '{arg}'"))?,
            )
        }
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        other => bail!("Unknown command '{other}'. Type 'help' for a list"),
    };
    Ok(command)
}

/// Completion of work started by the loop.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    MealAnalyzed {
        generation: u64,
        result: Result<Vec<DishAnalysis>, AnalysisError>,
    },
    IngredientResolved {
        id: Uuid,
        result: Result<IngredientAssessment, AnalysisError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

/// One task owns the session and the store. Analyses run in spawned tasks and
/// report back over `events`.
pub(crate) struct Repl<P> {
    session: LoggingSession,
    store: RecordStore,
    /// Ingredient numbering printed by the last `show`.
    shown: Vec<(Uuid, Bucket)>,
    service: Arc<AnalysisService<P>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<P: CompletionProvider + 'static> Repl<P> {
    pub(crate) fn new(
        service: Arc<AnalysisService<P>>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            session: LoggingSession::new(Local::now()),
            store: RecordStore::new(),
            shown: Vec::new(),
            service,
            events,
        }
    }

    fn spawn_analysis(&self, ticket: AnalysisTicket) {
        let service = Arc::clone(&self.service);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = service.analyze_meal(&ticket.description).await;
            let _ = events.send(SessionEvent::MealAnalyzed {
                generation: ticket.generation,
                result,
            });
        });
    }

    fn spawn_ingredient(&self, pending: PendingIngredient) {
        let service = Arc::clone(&self.service);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = service.analyze_ingredient(&pending.name).await;
            let _ = events.send(SessionEvent::IngredientResolved {
                id: pending.id,
                result,
            });
        });
    }

    #[allow(clippy::too_many_lines)]
    pub(crate) fn handle(&mut self, command: SessionCommand) -> Result<Flow> {
        match command {
            SessionCommand::Empty => {}
            SessionCommand::Food(name) => {
                if self.session.add_food(&name) {
                    println!("Added food #{}: {}", self.session.foods().len(), name.trim());
                }
            }
            SessionCommand::Unfood(n) => match self.session.remove_food(n - 1) {
                Some(name) => println!("Removed {name}"),
                None => bail!("No food #{n}"),
            },
            SessionCommand::Meal(meal_type) => {
                self.session.set_meal_type(meal_type);
                println!("Meal type: {meal_type}");
            }
            SessionCommand::At(when) => {
                let when = when.unwrap_or_else(Local::now);
                self.session.set_date(when);
                println!("Eaten at {}", when.format("%Y-%m-%d %H:%M"));
            }
            SessionCommand::Analyze => {
                let Some(ticket) = self.session.begin_analysis() else {
                    bail!("Add at least one food first");
                };
                println!("Analyzing {}...", ticket.description);
                self.spawn_analysis(ticket);
            }
            SessionCommand::Toggle(n) => {
                if self.shown != numbered_entries(&self.session) {
                    bail!("The ingredient list changed since the last 'show'. Type 'show' again");
                }
                let Some((id, bucket)) = self.shown.get(n - 1) else {
                    bail!("No ingredient #{n}. Type 'show' to list them");
                };
                self.session.toggle(*id, bucket);
                let state = if self.session.is_selected(*id, bucket) {
                    "Selected"
                } else {
                    "Unselected"
                };
                println!("{state} #{n} ({bucket})");
            }
            SessionCommand::Add(name) => match self.session.add_manual_ingredient(&name) {
                Some(pending) => {
                    println!("Analyzing {}...", pending.name);
                    self.spawn_ingredient(pending);
                }
                None => println!("'{}' is already listed", name.trim()),
            },
            SessionCommand::Remove(name) => {
                if !self.session.remove_manual_ingredient(&name) {
                    bail!("No hand-added ingredient named '{}'", name.trim());
                }
                println!("Removed {}", name.trim());
            }
            SessionCommand::Show => self.show(),
            SessionCommand::Save => {
                let pending = self
                    .session
                    .manual_ingredients()
                    .iter()
                    .filter(|m| m.is_pending())
                    .count();
                let record = self.session.save(&mut self.store, Local::now())?;
                println!(
                    "Saved {} meal {} with {} ingredient(s)",
                    record.meal_type,
                    record.id,
                    record.selected_ingredients.len()
                );
                if pending > 0 {
                    println!("{pending} ingredient(s) still analyzing were left out");
                }
            }
            SessionCommand::Cancel => {
                self.session.cancel(Local::now());
                println!("Discarded. Starting a new meal.");
            }
            SessionCommand::Day(day) => print_day_summary(&self.store.build_day_summary(day)),
            SessionCommand::Breakout { severity, notes } => {
                let record = self
                    .store
                    .append_breakout(BreakoutRecord::new(Local::now(), severity, notes));
                println!("Recorded {} breakout {}", record.severity, record.id);
            }
            SessionCommand::Delete(id) => {
                if self.store.delete_meal(id) || self.store.delete_breakout(id) {
                    println!("Deleted {id}");
                } else {
                    bail!("No meal or breakout with id {id}");
                }
            }
            SessionCommand::Help => println!("{HELP}"),
            SessionCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Apply a finished analysis. Returns `false` when it no longer applies.
    pub(crate) fn apply_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::MealAnalyzed { generation, result } => {
                if !self.session.apply_analysis(generation, result) {
                    return false;
                }
                match self.session.last_error() {
                    Some(message) => println!("\n{message}"),
                    None => {
                        println!(
                            "\nAnalysis ready: {} dish(es). Type 'show' to pick ingredients.",
                            self.session.dishes().len()
                        );
                    }
                }
                true
            }
            SessionEvent::IngredientResolved { id, result } => {
                if !self.session.resolve_manual_ingredient(id, result) {
                    return false;
                }
                if let Some(m) = self.session.manual_ingredients().iter().find(|m| m.id() == id) {
                    println!("\n{}: {} risk", m.name(), m.risk_label());
                }
                true
            }
        }
    }

    fn show(&mut self) {
        let foods = self.session.foods();
        if foods.is_empty() {
            println!("Foods: (none)");
        } else {
            println!("Foods:");
            for (i, food) in foods.iter().enumerate() {
                println!("  {}. {food}", i + 1);
            }
        }
        println!(
            "Meal: {} at {}",
            self.session.meal_type(),
            self.session.date().format("%Y-%m-%d %H:%M")
        );
        if let Some(message) = self.session.last_error() {
            println!("{message}");
        }
        print_session_tables(&self.session);
        self.shown = numbered_entries(&self.session);
        println!(
            "{} ingredient(s) selected",
            self.session.selected_ingredients().len()
        );
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

pub(crate) async fn cmd_session<P: CompletionProvider + 'static>(
    service: Arc<AnalysisService<P>>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut repl = Repl::new(service, tx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Logging a new meal. Type 'help' for commands.");
    println!("Records are kept in memory and discarded on exit.");
    prompt()?;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                match parse_command(&line).and_then(|command| repl.handle(command)) {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => eprintln!("Error: {e:#}"),
                }
            }
            Some(event) = rx.recv() => {
                repl.apply_event(event);
            }
        }
        prompt()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearplate_core::models::{ANALYSIS_FAILED_EXPLANATION, AcneRisk};
    use clearplate_core::session::ManualIngredient;

    /// Answers meal prompts and ingredient prompts with fixed bodies.
    struct StubProvider {
        meal: Result<String, AnalysisError>,
        ingredient: Result<String, AnalysisError>,
    }

    impl CompletionProvider for StubProvider {
        async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
            if prompt.contains("single ingredient") {
                self.ingredient.clone()
            } else {
                self.meal.clone()
            }
        }
    }

    const PIZZA: &str = r#"{"meals":[{"dish":"Pizza","ingredients":[
        {"name":"Cheese","acneRisk":"high","explanation":"dairy"},
        {"name":"Tomato","acneRisk":"low","explanation":"antioxidants"}]}]}"#;

    fn repl_with(
        provider: StubProvider,
    ) -> (
        Repl<StubProvider>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Repl::new(Arc::new(AnalysisService::new(provider)), tx), rx)
    }

    fn pizza_repl() -> (
        Repl<StubProvider>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        repl_with(StubProvider {
            meal: Ok(PIZZA.to_string()),
            ingredient: Ok(r#"{"name":"Basil","acneRisk":"low","explanation":"herb"}"#.to_string()),
        })
    }

    fn run(repl: &mut Repl<StubProvider>, line: &str) -> Result<Flow> {
        repl.handle(parse_command(line)?)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command("food  Pepperoni pizza ").unwrap(),
            SessionCommand::Food("Pepperoni pizza".to_string())
        );
        assert_eq!(parse_command("unfood 2").unwrap(), SessionCommand::Unfood(2));
        assert_eq!(
            parse_command("MEAL Dinner").unwrap(),
            SessionCommand::Meal(MealType::Dinner)
        );
        assert_eq!(parse_command("at now").unwrap(), SessionCommand::At(None));
        assert!(matches!(
            parse_command("at 2024-03-10 12:30").unwrap(),
            SessionCommand::At(Some(_))
        ));
        assert_eq!(parse_command("toggle 3").unwrap(), SessionCommand::Toggle(3));
        assert_eq!(
            parse_command("add sea salt").unwrap(),
            SessionCommand::Add("sea salt".to_string())
        );
        assert_eq!(parse_command("").unwrap(), SessionCommand::Empty);
        assert_eq!(parse_command("exit").unwrap(), SessionCommand::Quit);
    }

    #[test]
    fn test_parse_breakout() {
        assert_eq!(
            parse_command("breakout severe jawline, two spots").unwrap(),
            SessionCommand::Breakout {
                severity: Severity::Severe,
                notes: Some("jawline, two spots".to_string()),
            }
        );
        assert_eq!(
            parse_command("breakout mild").unwrap(),
            SessionCommand::Breakout {
                severity: Severity::Mild,
                notes: None,
            }
        );
        assert!(parse_command("breakout awful").is_err());
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(
            parse_command("day 2024-03-10").unwrap(),
            SessionCommand::Day(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
        );
        assert_eq!(
            parse_command("day").unwrap(),
            SessionCommand::Day(Local::now().date_naive())
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("food").is_err());
        assert!(parse_command("toggle 0").is_err());
        assert!(parse_command("toggle x").is_err());
        assert!(parse_command("meal brunch").is_err());
        assert!(parse_command("delete not-a-uuid").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[tokio::test]
    async fn test_analyze_toggle_save() {
        let (mut repl, mut rx) = pizza_repl();
        run(&mut repl, "food Pizza").unwrap();
        run(&mut repl, "meal dinner").unwrap();
        run(&mut repl, "analyze").unwrap();

        let event = rx.recv().await.unwrap();
        assert!(repl.apply_event(event));
        assert_eq!(repl.session.dishes()[0].ingredients.len(), 2);

        run(&mut repl, "show").unwrap();
        run(&mut repl, "toggle 1").unwrap();
        let day = repl.session.date().date_naive();
        run(&mut repl, "save").unwrap();

        let meals = repl.store.meals_for_day(day);
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].meal_type, MealType::Dinner);
        assert_eq!(meals[0].selected_ingredients.len(), 1);
        assert_eq!(meals[0].selected_ingredients[0].name, "Cheese");
        assert!(repl.session.foods().is_empty());
    }

    #[tokio::test]
    async fn test_analysis_after_cancel_is_ignored() {
        let (mut repl, mut rx) = pizza_repl();
        run(&mut repl, "food Pizza").unwrap();
        run(&mut repl, "analyze").unwrap();
        run(&mut repl, "cancel").unwrap();

        let event = rx.recv().await.unwrap();
        assert!(!repl.apply_event(event));
        assert!(repl.session.dishes().is_empty());
    }

    #[tokio::test]
    async fn test_analysis_failure_is_reported() {
        let (mut repl, mut rx) = repl_with(StubProvider {
            meal: Ok("no idea".to_string()),
            ingredient: Ok(String::new()),
        });
        run(&mut repl, "food Mystery stew").unwrap();
        run(&mut repl, "analyze").unwrap();

        let event = rx.recv().await.unwrap();
        assert!(repl.apply_event(event));
        assert!(
            repl.session
                .last_error()
                .unwrap()
                .starts_with("Analysis failed")
        );
    }

    #[tokio::test]
    async fn test_manual_ingredient_resolves() {
        let (mut repl, mut rx) = pizza_repl();
        run(&mut repl, "add Basil").unwrap();
        assert!(repl.session.has_pending());
        run(&mut repl, "show").unwrap();
        run(&mut repl, "toggle 1").unwrap();

        let event = rx.recv().await.unwrap();
        assert!(repl.apply_event(event));
        assert!(!repl.session.has_pending());

        let selected = repl.session.selected_ingredients();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "Basil");
        assert_eq!(selected[0].acne_risk, AcneRisk::Low);
    }

    #[tokio::test]
    async fn test_manual_ingredient_failure_uses_default() {
        let (mut repl, mut rx) = repl_with(StubProvider {
            meal: Ok(PIZZA.to_string()),
            ingredient: Err(AnalysisError::Api("timeout".to_string())),
        });
        run(&mut repl, "add Saffron").unwrap();

        let event = rx.recv().await.unwrap();
        assert!(repl.apply_event(event));
        let ManualIngredient::Resolved(a) = &repl.session.manual_ingredients()[0] else {
            panic!("expected resolved ingredient");
        };
        assert_eq!(a.acne_risk, AcneRisk::Medium);
        assert_eq!(a.explanation, ANALYSIS_FAILED_EXPLANATION);
    }

    #[tokio::test]
    async fn test_duplicate_manual_ingredient_is_ignored() {
        let (mut repl, _rx) = pizza_repl();
        run(&mut repl, "add Basil").unwrap();
        assert_eq!(run(&mut repl, "add basil").unwrap(), Flow::Continue);
        assert_eq!(repl.session.manual_ingredients().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_uses_last_shown_numbering() {
        let (mut repl, _rx) = pizza_repl();
        run(&mut repl, "add Basil").unwrap();
        run(&mut repl, "add Oregano").unwrap();
        assert!(run(&mut repl, "toggle 1").is_err());

        run(&mut repl, "show").unwrap();
        run(&mut repl, "remove Basil").unwrap();
        assert!(run(&mut repl, "toggle 1").is_err());
        let oregano = &repl.session.manual_ingredients()[0];
        assert!(!repl.session.is_selected(oregano.id(), &Bucket::Manual));

        run(&mut repl, "show").unwrap();
        run(&mut repl, "toggle 1").unwrap();
        let oregano = &repl.session.manual_ingredients()[0];
        assert!(repl.session.is_selected(oregano.id(), &Bucket::Manual));
    }

    #[tokio::test]
    async fn test_toggle_out_of_range() {
        let (mut repl, _rx) = pizza_repl();
        assert!(run(&mut repl, "toggle 1").is_err());
    }

    #[tokio::test]
    async fn test_save_empty_meal_fails() {
        let (mut repl, _rx) = pizza_repl();
        assert!(run(&mut repl, "save").is_err());
        assert_eq!(repl.store.meal_count(), 0);
    }

    #[tokio::test]
    async fn test_breakout_and_delete() {
        let (mut repl, _rx) = pizza_repl();
        run(&mut repl, "breakout moderate forehead").unwrap();
        let today = Local::now().date_naive();
        let breakouts = repl.store.breakouts_for_day(today);
        assert_eq!(breakouts.len(), 1);
        assert_eq!(breakouts[0].notes.as_deref(), Some("forehead"));

        run(&mut repl, &format!("delete {}", breakouts[0].id)).unwrap();
        assert!(repl.store.breakouts_for_day(today).is_empty());
        assert!(run(&mut repl, &format!("delete {}", breakouts[0].id)).is_err());
    }

    #[tokio::test]
    async fn test_quit() {
        let (mut repl, _rx) = pizza_repl();
        assert_eq!(run(&mut repl, "quit").unwrap(), Flow::Quit);
        assert_eq!(run(&mut repl, "help").unwrap(), Flow::Continue);
    }
}
