use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

use crate::errors::PlanError;
use crate::plan::{Phase, Priority, RiskLevel, Severity, Step, StructuredPlan};
use crate::walkthrough::{Toggle, Walkthrough};

const BAR_WIDTH: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Toggle,
    Complete,
    Next,
    Back,
    GoTo(usize),
    JumpIncomplete,
    Overview,
    Regenerate,
    Quit,
    Help,
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    Quit,
    Regenerate,
}

/// Enter alone completes the current task.
pub fn parse_command(input: &str) -> Command {
    let t = input.trim().to_lowercase();
    let mut parts = t.split_whitespace();
    let head = parts.next().unwrap_or("");
    match head {
        "" | "c" | "done" => Command::Complete,
        "t" | "toggle" => Command::Toggle,
        "n" | "next" => Command::Next,
        "b" | "back" | "p" | "prev" => Command::Back,
        "g" | "go" | "goto" => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n > 0 => Command::GoTo(n),
            _ => Command::Unknown(t.clone()),
        },
        "j" | "jump" => Command::JumpIncomplete,
        "o" | "overview" => Command::Overview,
        "r" | "regen" | "regenerate" => Command::Regenerate,
        "q" | "quit" | "exit" => Command::Quit,
        "h" | "?" | "help" => Command::Help,
        _ => Command::Unknown(t.clone()),
    }
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// One line from stdin after printing `prompt`; `None` on EOF or read error.
fn prompt_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    io::stdout().flush().ok()?;
    let mut s = String::new();
    match io::stdin().read_line(&mut s) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(s),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Yes/no question defaulting to no.
pub fn confirm(question: &str) -> bool {
    prompt_line(&format!("{} {} ", question, "[y/N]".dimmed())).is_some_and(|a| is_yes(&a))
}

fn read_command() -> Option<String> {
    prompt_line(&format!("{} ", ">".bold()))
}

pub fn print_error_alert(err: &PlanError) {
    println!("\n{}", " Plan generation failed ".on_red().white().bold());
    println!("{}", err.user_message());
    println!("{}", format!("({})", err).dimmed());
}

pub fn progress_bar(percent: u32) -> String {
    let filled = (percent.min(100) as usize * BAR_WIDTH + 50) / 100;
    format!("[{}{}] {:>3}%", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled), percent)
}

fn phase_tag(phase: Phase) -> String {
    let tag = format!("[{}]", phase.label().to_uppercase());
    match phase {
        Phase::Soil => tag.yellow().bold().to_string(),
        Phase::Planting => tag.green().bold().to_string(),
        Phase::Water => tag.blue().bold().to_string(),
        Phase::Fertilizer => tag.magenta().bold().to_string(),
        Phase::Protection => tag.red().bold().to_string(),
        Phase::Harvest => tag.cyan().bold().to_string(),
    }
}

fn day_range(step: &Step) -> Option<String> {
    match (step.start_day, step.end_day) {
        (Some(s), Some(e)) if s == e => Some(format!("day {}", s)),
        (Some(s), Some(e)) => Some(format!("days {}-{}", s, e)),
        (Some(s), None) => Some(format!("from day {}", s)),
        (None, Some(e)) => Some(format!("by day {}", e)),
        (None, None) => None,
    }
}

pub fn show_plan(plan: &StructuredPlan, w: &Walkthrough) {
    let s = &plan.summary;
    println!("\n=== FARMING PLAN ===");
    println!("{}", s.objective.bold());
    println!("Key decision: {}", s.key_decision);
    let risk = match s.risk_level {
        RiskLevel::Low => "low".green(),
        RiskLevel::Medium => "medium".yellow(),
        RiskLevel::High => "high".red(),
    };
    println!(
        "Harvest in ~{} days   Expected yield: {:.0} kg   Risk: {}",
        s.estimated_harvest_days, s.expected_yield_kg, risk
    );

    if !plan.alerts.is_empty() {
        println!();
        for a in &plan.alerts {
            let label = match a.severity {
                Severity::Info => "[INFO]".cyan().bold(),
                Severity::Warning => "[WARNING]".yellow().bold(),
                Severity::Critical => "[CRITICAL]".red().bold(),
            };
            println!("{} {}: {}", label, a.title.bold(), a.message);
        }
    }

    println!();
    for (i, step) in plan.steps.iter().enumerate() {
        let mark = if w.is_step_complete(i) { "[x]".green().bold() } else { "[ ]".normal() };
        let when = day_range(step).map(|d| format!("  ({})", d)).unwrap_or_default();
        let prio = if step.priority == Priority::High { "  !".red().bold().to_string() } else { String::new() };
        println!("{} {}. {} {}{}{}", mark, i + 1, phase_tag(step.phase), step.title, when.dimmed(), prio);
    }
    println!("\n{}", progress_bar(w.progress_percent()));
}

fn render_current(plan: &StructuredPlan, w: &Walkthrough) {
    let Some(id) = w.current() else {
        return;
    };
    let (Some(step), Some(action)) = (plan.steps.get(id.step), plan.action(id)) else {
        return;
    };

    println!(
        "\n{}",
        "┏━━━━━━━━━━━━━━━━━━━━━━━━━ Current task ━━━━━━━━━━━━━━━━━━━━━━━━━┓".bold()
    );
    println!(
        "  Task {} of {}   Step {}/{}: {} {}",
        w.cursor() + 1,
        w.total(),
        id.step + 1,
        w.step_count(),
        phase_tag(step.phase),
        step.title.bold()
    );
    let done = w.is_completed(id);
    let box_mark = if done { "[x]".green().bold() } else { "[ ]".normal() };
    let task = if done { action.task.dimmed().strikethrough() } else { action.task.bold() };
    println!("\n  {} {}", box_mark, task);

    // Steps without day bounds fall back to the action's own timing text.
    let when = if action.when.is_empty() { day_range(step).unwrap_or_default() } else { action.when.clone() };
    if !when.is_empty() {
        println!("      {} {}", "When:".cyan(), when);
    }
    if !action.why.is_empty() {
        println!("      {} {}", "Why:".cyan(), action.why);
    }
    if !action.warning.is_empty() {
        println!("      {} {}", "Warning:".red().bold(), action.warning);
    }
    if !step.reason.is_empty() && id.action == 0 {
        println!("      {} {}", "Step goal:".dimmed(), step.reason.dimmed());
    }
    println!("\n  {}", progress_bar(w.progress_percent()));
    println!(
        "{}",
        "┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┛".bold()
    );
}

fn print_help() {
    println!(
        "{}",
        "Enter/c complete   t toggle   n next   b back   g N go to task N   j next open step   o overview   r regenerate   q quit"
            .dimmed()
    );
}

/// Interactive loop over one plan. Returns when the user quits or asks for a
/// new plan; the caller owns regeneration and resets `w` itself.
pub async fn run_walkthrough(plan: &StructuredPlan, w: &mut Walkthrough, auto_advance: Duration) -> WalkOutcome {
    if w.is_inert() {
        println!("{}", "No actionable steps in this plan. Please regenerate.".yellow().bold());
        return if confirm("Regenerate now?") { WalkOutcome::Regenerate } else { WalkOutcome::Quit };
    }

    show_plan(plan, w);
    print_help();
    loop {
        render_current(plan, w);
        let Some(line) = read_command() else {
            return WalkOutcome::Quit;
        };
        match parse_command(&line) {
            Command::Toggle => match w.toggle_current() {
                Toggle::Completed(Some(advance)) => {
                    println!("{}", "Done!".green().bold());
                    tokio::time::sleep(auto_advance).await;
                    w.commit_auto_advance(advance);
                }
                Toggle::Completed(None) => {
                    if w.completed_count() == w.total() {
                        println!("{}", "All tasks complete. Good harvest!".green().bold());
                    }
                }
                Toggle::Reopened => println!("{}", "Marked as not done.".yellow()),
                Toggle::Inert => {}
            },
            Command::Complete => {
                w.complete_and_advance();
                if w.completed_count() == w.total() {
                    println!("{}", "All tasks complete. Good harvest!".green().bold());
                }
            }
            Command::Next => w.go_to(w.cursor() + 1),
            Command::Back => w.go_to(w.cursor().saturating_sub(1)),
            Command::GoTo(n) => w.go_to(n - 1),
            Command::JumpIncomplete => match w.next_incomplete_step().and_then(|s| w.flat_index_of_step(s)) {
                Some(i) => w.go_to(i),
                None => println!("{}", "Every step is complete.".green()),
            },
            Command::Overview => show_plan(plan, w),
            Command::Regenerate => return WalkOutcome::Regenerate,
            Command::Quit => return WalkOutcome::Quit,
            Command::Help => print_help(),
            Command::Unknown(s) => println!("Unknown command '{}'. Type h for help.", s),
        }
    }
}
