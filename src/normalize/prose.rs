//! Line classifier for the numbered-walkthrough reply format.
//!
//! Each line is a heading, an action, a detail of the previous action, or
//! continuation text. Heading conventions recognised:
//!
//! - `1. Soil preparation` / `2) Planting` (at column 0)
//! - `Step 3: Irrigation`, `Step 3 - Irrigation`, `### Step 3`
//! - `**Fertilizer**` or `**Fertilizer:**` on its own line
//! - `## Harvest`
//!
//! Indented numbered lines and `-`, `*`, `+`, `•` bullets are actions. Once a
//! section was opened by a `Step`, bold or `#` heading, column-0 numbered lines
//! under it count as actions too.

use regex::Regex;
use std::sync::OnceLock;

use super::sanitize::{clean_text, strip_emphasis};
use crate::plan::{Action, Phase, Priority, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingStyle {
    Numbered,
    Marked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailKind {
    Why,
    When,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Heading(String, HeadingStyle),
    Action(String),
    Detail(DetailKind, String),
    Continuation(String),
    Blank,
}

struct Patterns {
    step: Regex,
    markdown: Regex,
    bold: Regex,
    numbered: Regex,
    bullet: Regex,
    detail: Regex,
}

fn patterns() -> &'static Patterns {
    static P: OnceLock<Patterns> = OnceLock::new();
    P.get_or_init(|| Patterns {
        step: Regex::new(r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*)?\s*step\s*(\d+)\s*[:.)\-]*\s*(.*)$").expect("static regex"),
        markdown: Regex::new(r"^\s*#{1,6}\s+(.+)$").expect("static regex"),
        bold: Regex::new(r"^\s*\*\*([^*]+)\*\*\s*:?\s*$").expect("static regex"),
        numbered: Regex::new(r"^(\s*)\d{1,2}[.)]\s+(.+)$").expect("static regex"),
        bullet: Regex::new(r"^\s*(?:[-*+\u{2022}]|[a-z][.)])\s+(.+)$").expect("static regex"),
        detail: Regex::new(r"(?i)^\s*(?:[-*+\u{2022}]\s+)?\**\s*(why|reason|when|timing|warning|caution)\s*\**\s*:\s*\**\s*(.+)$")
            .expect("static regex"),
    })
}

fn tidy(s: &str) -> String {
    clean_text(&strip_emphasis(s)).trim_matches(|c: char| c == ':' || c == '-' || c == ' ').to_string()
}

/// Classifies one line. `numbered_are_actions` is set while inside a section
/// opened by a marked (non-numbered) heading.
pub fn classify_line(line: &str, numbered_are_actions: bool) -> Line {
    if line.trim().is_empty() {
        return Line::Blank;
    }
    let p = patterns();

    if let Some(c) = p.step.captures(line) {
        let title = tidy(c.get(2).map_or("", |m| m.as_str()));
        let title = if title.is_empty() { format!("Step {}", &c[1]) } else { title };
        return Line::Heading(title, HeadingStyle::Marked);
    }
    if let Some(c) = p.markdown.captures(line) {
        return Line::Heading(tidy(&c[1]), HeadingStyle::Marked);
    }
    if let Some(c) = p.bold.captures(line) {
        return Line::Heading(tidy(&c[1]), HeadingStyle::Marked);
    }
    if let Some(c) = p.detail.captures(line) {
        let kind = match c[1].to_lowercase().as_str() {
            "why" | "reason" => DetailKind::Why,
            "when" | "timing" => DetailKind::When,
            _ => DetailKind::Warning,
        };
        return Line::Detail(kind, tidy(&c[2]));
    }
    if let Some(c) = p.numbered.captures(line) {
        let indented = c[1].len() >= 2;
        let text = tidy(&c[2]);
        return if indented || numbered_are_actions {
            Line::Action(text)
        } else {
            Line::Heading(text, HeadingStyle::Numbered)
        };
    }
    if let Some(c) = p.bullet.captures(line) {
        return Line::Action(tidy(&c[1]));
    }
    Line::Continuation(tidy(line))
}

struct Draft {
    title: String,
    actions: Vec<Action>,
}

fn open_draft<'a>(drafts: &'a mut [Draft], preamble: &'a mut Draft) -> &'a mut Draft {
    match drafts.last_mut() {
        Some(d) => d,
        None => preamble,
    }
}

/// Builds steps from a prose reply. Text before the first heading is kept
/// only when there are no headings at all.
pub fn parse_steps(text: &str) -> Vec<Step> {
    let mut preamble = Draft { title: String::new(), actions: Vec::new() };
    let mut drafts: Vec<Draft> = Vec::new();
    let mut numbered_are_actions = false;
    let mut joinable = false;

    for raw in text.lines() {
        let line = classify_line(raw, numbered_are_actions);
        if let Line::Heading(title, style) = line {
            drafts.push(Draft { title, actions: Vec::new() });
            numbered_are_actions = style == HeadingStyle::Marked;
            joinable = false;
            continue;
        }
        let current = open_draft(&mut drafts, &mut preamble);
        match line {
            Line::Blank | Line::Heading(..) => joinable = false,
            Line::Action(task) => {
                if !task.is_empty() {
                    current.actions.push(Action::new(task));
                    joinable = true;
                }
            }
            Line::Detail(kind, text) => match current.actions.last_mut() {
                Some(a) if !text.is_empty() => {
                    let slot = match kind {
                        DetailKind::Why => &mut a.why,
                        DetailKind::When => &mut a.when,
                        DetailKind::Warning => &mut a.warning,
                    };
                    if !slot.is_empty() {
                        slot.push(' ');
                    }
                    slot.push_str(&text);
                }
                _ => {
                    if !text.is_empty() {
                        current.actions.push(Action::new(text));
                        joinable = true;
                    }
                }
            },
            Line::Continuation(text) => {
                if text.is_empty() {
                    continue;
                }
                match current.actions.last_mut() {
                    Some(a) if joinable => {
                        a.task.push(' ');
                        a.task.push_str(&text);
                    }
                    _ => {
                        current.actions.push(Action::new(text));
                        joinable = true;
                    }
                }
            }
        }
    }

    if drafts.is_empty() {
        drafts.push(preamble);
    }

    drafts
        .into_iter()
        .filter(|d| !d.actions.is_empty())
        .enumerate()
        .map(|(i, d)| {
            let phase = Phase::infer(&d.title)
                .or_else(|| d.actions.iter().find_map(|a| Phase::infer(&a.task)))
                .unwrap_or_default();
            let title = if d.title.is_empty() { format!("Step {}", i + 1) } else { d.title };
            Step {
                title,
                phase,
                start_day: None,
                end_day: None,
                priority: Priority::default(),
                reason: String::new(),
                actions: d.actions,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_heading_conventions() {
        assert_eq!(
            classify_line("1. Soil Preparation", false),
            Line::Heading("Soil Preparation".into(), HeadingStyle::Numbered)
        );
        assert_eq!(
            classify_line("Step 2: Planting", false),
            Line::Heading("Planting".into(), HeadingStyle::Marked)
        );
        assert_eq!(
            classify_line("**Step 3 - Irrigation**", false),
            Line::Heading("Irrigation".into(), HeadingStyle::Marked)
        );
        assert_eq!(
            classify_line("**Fertilizer:**", false),
            Line::Heading("Fertilizer".into(), HeadingStyle::Marked)
        );
        assert_eq!(classify_line("## Harvest", false), Line::Heading("Harvest".into(), HeadingStyle::Marked));
        assert_eq!(classify_line("### Step 4", false), Line::Heading("Step 4".into(), HeadingStyle::Marked));
    }

    #[test]
    fn recognises_actions_details_and_continuations() {
        assert_eq!(classify_line("   - Till to 20 cm", false), Line::Action("Till to 20 cm".into()));
        assert_eq!(classify_line("\u{2022} Add compost", false), Line::Action("Add compost".into()));
        assert_eq!(classify_line("   2. Harrow twice", false), Line::Action("Harrow twice".into()));
        assert_eq!(classify_line("2. Harrow twice", true), Line::Action("Harrow twice".into()));
        assert_eq!(
            classify_line("   - **Why:** improves drainage", false),
            Line::Detail(DetailKind::Why, "improves drainage".into())
        );
        assert_eq!(
            classify_line("Warning: avoid waterlogging", false),
            Line::Detail(DetailKind::Warning, "avoid waterlogging".into())
        );
        assert_eq!(classify_line("   ", false), Line::Blank);
        assert_eq!(classify_line("and keep records", false), Line::Continuation("and keep records".into()));
    }

    #[test]
    fn numbered_walkthrough_becomes_steps() {
        let text = "Here is your maize plan:\n\n\
            1. Soil Preparation\n   - Plough the field\n   - Add compost\n     Why: builds organic matter\n\
            2. Planting\n   - Sow seed 5 cm deep\n     spaced 25 cm apart\n\
            3. Irrigation\n   - Water twice a week\n";
        let steps = parse_steps(text);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].title, "Soil Preparation");
        assert_eq!(steps[0].phase, Phase::Soil);
        assert_eq!(steps[0].actions.len(), 2);
        assert_eq!(steps[0].actions[1].why, "builds organic matter");
        assert_eq!(steps[1].actions[0].task, "Sow seed 5 cm deep spaced 25 cm apart");
        assert_eq!(steps[2].phase, Phase::Water);
        assert!(steps.iter().all(|s| s.start_day.is_none()));
    }

    #[test]
    fn bold_sections_with_numbered_actions() {
        let text = "**Soil preparation**\n1. Clear weeds\n2. Plough\n\n**Harvest**\n1. Cut at maturity\n";
        let steps = parse_steps(text);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].actions.len(), 2);
        assert_eq!(steps[1].phase, Phase::Harvest);
    }

    #[test]
    fn paragraph_under_heading_is_content_and_empty_headings_drop() {
        let text = "Step 1: Land\nClear stones from the field.\n\nThen level it.\nStep 2: Nothing here\n";
        let steps = parse_steps(text);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].actions.len(), 2);
        assert_eq!(steps[0].actions[0].task, "Clear stones from the field.");
    }

    #[test]
    fn headingless_text_forms_one_step() {
        let steps = parse_steps("- Water the seedlings\n- Check for aphids\n");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].title, "Step 1");
        assert_eq!(steps[0].actions.len(), 2);
    }

    #[test]
    fn nothing_yields_no_steps() {
        assert!(parse_steps("").is_empty());
        assert!(parse_steps("## Overview\n\n").is_empty());
    }
}
