//! Turns whatever the model replied into exactly one [`StructuredPlan`].
//!
//! The loose JSON shape never leaves this module: values are read from
//! `serde_json::Value`, sanitized and coerced into the strict plan types.
//! Replies that yield no usable step fall back to a synthesized plan, so
//! `normalize` never fails and never returns a step without actions.

use serde_json::Value;
use tracing::{debug, warn};

use crate::plan::{Action, Alert, Phase, Priority, RiskLevel, Severity, Step, StructuredPlan, Summary};
use crate::prompt::Protocol;
use crate::weather::WEATHER_UNAVAILABLE;

pub mod extract;
pub mod prose;
pub mod sanitize;

use sanitize::clean_text;

/// Days per step when the reply gives no day bounds.
pub const STEP_CADENCE_DAYS: u32 = 7;
pub const DEFAULT_HARVEST_DAYS: u32 = 90;
pub const DEFAULT_YIELD_KG_PER_HECTARE: f64 = 2500.0;
pub const MIN_EXPECTED_YIELD_KG: f64 = 100.0;
/// Day bounds beyond ten seasons are model noise and get clamped.
const MAX_PLAN_DAY: u32 = 3650;

const MIN_FRAGMENT_CHARS: usize = 15;
const MAX_SALVAGED_FRAGMENTS: usize = 6;
const MIN_SALVAGED_FRAGMENTS: usize = 3;

/// Facts the normalizer needs to fill gaps in a reply.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub crop: String,
    pub area_hectares: f64,
    pub weather_summary: String,
}

impl NormalizeContext {
    fn crop_name(&self) -> &str {
        let c = self.crop.trim();
        if c.is_empty() {
            "crop"
        } else {
            c
        }
    }
}

pub fn default_expected_yield_kg(area_hectares: f64) -> f64 {
    (area_hectares.max(0.0) * DEFAULT_YIELD_KG_PER_HECTARE).max(MIN_EXPECTED_YIELD_KG)
}

pub fn normalize(raw: &str, ctx: &NormalizeContext, protocol: Protocol) -> StructuredPlan {
    let parsed = match protocol {
        Protocol::Json => extract::extract_json_object(raw).and_then(|v| plan_from_value(&v, ctx)),
        Protocol::Prose => {
            let steps = prose::parse_steps(raw);
            (!steps.is_empty()).then(|| StructuredPlan {
                summary: synthesized_summary(ctx, &steps),
                alerts: vec![weather_alert(ctx)],
                steps,
            })
        }
    };
    match parsed {
        Some(plan) => {
            debug!(steps = plan.steps.len(), actions = plan.action_count(), "reply normalized");
            plan
        }
        None => {
            warn!(chars = raw.len(), "reply had no usable steps; synthesizing fallback plan");
            fallback_plan(raw, ctx)
        }
    }
}

fn str_field(v: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| v.get(*k))
        .find_map(|f| match f {
            Value::String(s) => Some(clean_text(s)),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_default()
}

fn num_field(v: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| v.get(*k)).find_map(|f| match f {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn day_field(v: &Value, keys: &[&str]) -> Option<u32> {
    num_field(v, keys)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| d.round().min(MAX_PLAN_DAY as f64) as u32)
}

fn action_from_value(v: &Value) -> Option<Action> {
    let action = match v {
        Value::String(s) => Action::new(clean_text(s)),
        Value::Object(_) => Action {
            task: str_field(v, &["task", "action", "title", "description"]),
            why: str_field(v, &["why", "reason"]),
            when: str_field(v, &["when", "timing"]),
            warning: str_field(v, &["warning", "caution"]),
        },
        _ => return None,
    };
    (!action.task.is_empty()).then_some(action)
}

fn step_from_value(v: &Value, position: usize) -> Option<Step> {
    let actions: Vec<Action> = ["actions", "tasks"]
        .iter()
        .find_map(|k| v.get(*k).and_then(Value::as_array))
        .map(|list| list.iter().filter_map(action_from_value).collect())
        .unwrap_or_default();
    if actions.is_empty() {
        return None;
    }

    let cadence_start = position as u32 * STEP_CADENCE_DAYS;
    let start_given = day_field(v, &["start_day", "startDay"]);
    let end_given = day_field(v, &["end_day", "endDay"]);
    let start = start_given
        .unwrap_or_else(|| end_given.map_or(cadence_start, |e| e.saturating_sub(STEP_CADENCE_DAYS)));
    let end = end_given.unwrap_or(start.saturating_add(STEP_CADENCE_DAYS)).max(start);

    let title = str_field(v, &["title", "name"]);
    Some(Step {
        title: if title.is_empty() { format!("Step {}", position + 1) } else { title },
        phase: Phase::parse_loose(&str_field(v, &["phase", "category"])).unwrap_or_default(),
        start_day: Some(start),
        end_day: Some(end),
        priority: Priority::parse_loose(&str_field(v, &["priority"])).unwrap_or_default(),
        reason: str_field(v, &["reason", "why", "rationale"]),
        actions,
    })
}

fn alert_from_value(v: &Value) -> Option<Alert> {
    let (title, message, severity) = match v {
        Value::String(s) => (String::new(), clean_text(s), None),
        Value::Object(_) => (
            str_field(v, &["title"]),
            str_field(v, &["message", "text", "description"]),
            Severity::parse_loose(&str_field(v, &["severity", "level"])),
        ),
        _ => return None,
    };
    if title.is_empty() && message.is_empty() {
        return None;
    }
    Some(Alert {
        title: if title.is_empty() { "Notice".to_string() } else { title },
        message,
        severity: severity.unwrap_or_default(),
    })
}

fn summary_from_value(v: Option<&Value>, ctx: &NormalizeContext, steps: &[Step]) -> Summary {
    let mut summary = synthesized_summary(ctx, steps);
    match v {
        Some(Value::String(s)) if !clean_text(s).is_empty() => summary.objective = clean_text(s),
        Some(obj @ Value::Object(_)) => {
            let objective = str_field(obj, &["objective", "goal"]);
            if !objective.is_empty() {
                summary.objective = objective;
            }
            let decision = str_field(obj, &["key_decision", "keyDecision"]);
            if !decision.is_empty() {
                summary.key_decision = decision;
            }
            if let Some(days) = day_field(obj, &["estimated_harvest_days", "estimatedHarvestDays"]).filter(|d| *d > 0) {
                summary.estimated_harvest_days = days;
            }
            if let Some(kg) = num_field(obj, &["expected_yield_kg", "expectedYieldKg"]).filter(|k| k.is_finite() && *k > 0.0) {
                summary.expected_yield_kg = kg;
            }
            if let Some(risk) = RiskLevel::parse_loose(&str_field(obj, &["risk_level", "riskLevel"])) {
                summary.risk_level = risk;
            }
        }
        _ => {}
    }
    summary
}

fn plan_from_value(v: &Value, ctx: &NormalizeContext) -> Option<StructuredPlan> {
    let root = if v.get("steps").is_some() {
        v
    } else {
        v.get("plan").filter(|p| p.get("steps").is_some()).unwrap_or(v)
    };
    let raw_steps = root.get("steps")?.as_array()?;

    let steps: Vec<Step> = raw_steps
        .iter()
        .filter(|s| s.is_object())
        .filter_map({
            let mut kept = 0usize;
            move |s| {
                let step = step_from_value(s, kept)?;
                kept += 1;
                Some(step)
            }
        })
        .collect();
    if steps.is_empty() {
        return None;
    }

    let alerts: Vec<Alert> = root
        .get("alerts")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(alert_from_value).collect())
        .unwrap_or_default();

    Some(StructuredPlan { summary: summary_from_value(root.get("summary"), ctx, &steps), alerts, steps })
}

fn synthesized_summary(ctx: &NormalizeContext, steps: &[Step]) -> Summary {
    Summary {
        objective: format!("Grow a healthy {} crop on {:.2} ha", ctx.crop_name(), ctx.area_hectares),
        key_decision: "Follow the step schedule and adjust timings to rainfall".to_string(),
        estimated_harvest_days: steps
            .last()
            .and_then(|s| s.end_day)
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_HARVEST_DAYS),
        expected_yield_kg: default_expected_yield_kg(ctx.area_hectares),
        risk_level: RiskLevel::Medium,
    }
}

fn weather_alert(ctx: &NormalizeContext) -> Alert {
    let summary = clean_text(&ctx.weather_summary);
    let message = if summary.is_empty() || summary == WEATHER_UNAVAILABLE {
        "Weather data unavailable. Check the local forecast before field work.".to_string()
    } else {
        format!("Current conditions: {}. Check the forecast before field work.", summary)
    };
    Alert { title: "Weather".to_string(), message, severity: Severity::Info }
}

/// Generic tasks, soil preparation through harvest, one per phase.
pub fn default_tasks(crop: &str) -> Vec<String> {
    vec![
        format!("Clear the field and loosen the soil to prepare a seedbed for {crop}."),
        format!("Plant good quality {crop} seed at the recommended spacing and depth."),
        format!("Irrigate the {crop} field regularly, keeping the soil moist but not waterlogged."),
        format!("Apply a balanced fertilizer to the {crop} according to its growth stage."),
        format!("Scout the {crop} weekly for pests and disease, and act early."),
        format!("Harvest the {crop} at maturity and dry it well before storage."),
    ]
}

/// Line fragments of a reply that read like sentences once JSON noise is gone.
fn salvage_fragments(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in raw.lines() {
        let mut s = line.trim().trim_matches(|c: char| "{}[],".contains(c) || c.is_whitespace());
        // Drop a leading `"key":` left over from broken JSON.
        if let Some(rest) = s.strip_prefix('"').and_then(|r| r.split_once("\":")).map(|(_, v)| v) {
            s = rest;
        }
        let s = s.trim_matches(|c: char| "{}[],\"".contains(c) || c.is_whitespace());
        let s = s.trim_start_matches(|c: char| c == '-' || c == '*' || c == '#' || c == '>' || c.is_whitespace());
        let cleaned = clean_text(&sanitize::strip_emphasis(s));
        if cleaned.len() >= MIN_FRAGMENT_CHARS
            && cleaned.chars().any(|c| c.is_ascii_alphabetic())
            && !out.contains(&cleaned)
        {
            out.push(cleaned);
        }
        if out.len() == MAX_SALVAGED_FRAGMENTS {
            break;
        }
    }
    out
}

fn fallback_plan(raw: &str, ctx: &NormalizeContext) -> StructuredPlan {
    let mut tasks = salvage_fragments(raw);
    if tasks.len() < MIN_SALVAGED_FRAGMENTS {
        tasks = default_tasks(ctx.crop_name());
    }
    let steps: Vec<Step> = tasks
        .into_iter()
        .enumerate()
        .map(|(i, task)| {
            let phase = Phase::ALL[i % Phase::ALL.len()];
            let start = i as u32 * STEP_CADENCE_DAYS;
            Step {
                title: phase.label().to_string(),
                phase,
                start_day: Some(start),
                end_day: Some(start + STEP_CADENCE_DAYS),
                priority: Priority::Medium,
                reason: String::new(),
                actions: vec![Action::new(task)],
            }
        })
        .collect();
    StructuredPlan {
        summary: synthesized_summary(ctx, &steps),
        alerts: vec![weather_alert(ctx)],
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(area: f64) -> NormalizeContext {
        NormalizeContext {
            crop: "Rice".into(),
            area_hectares: area,
            weather_summary: "27.3 C, Rain, humidity 88%, wind 4.0 km/h".into(),
        }
    }

    fn assert_total(plan: &StructuredPlan) {
        assert!(!plan.steps.is_empty());
        assert!(plan.steps.iter().all(|s| !s.actions.is_empty() && !s.title.is_empty()));
        assert!(plan.steps.iter().flat_map(|s| &s.actions).all(|a| !a.task.is_empty()));
    }

    #[test]
    fn any_input_produces_a_usable_plan() {
        let inputs = [
            "",
            "   ",
            "garbage ][ }{ \u{1F33E}",
            "{}",
            "{\"steps\": []}",
            "{\"steps\": [{\"title\": \"Empty\", \"actions\": [{\"task\": \"  \"}]}]}",
            "[1, 2, 3]",
            "```json\n{\"steps\": \n```",
        ];
        for input in inputs {
            for protocol in [Protocol::Json, Protocol::Prose] {
                assert_total(&normalize(input, &ctx(1.0), protocol));
            }
        }
    }

    #[test]
    fn serialized_plan_normalizes_back_unchanged() {
        let original = StructuredPlan {
            summary: Summary {
                objective: "Grow rice for market".into(),
                key_decision: "Transplant after nursery".into(),
                estimated_harvest_days: 120,
                expected_yield_kg: 9000.5,
                risk_level: RiskLevel::High,
            },
            alerts: vec![Alert { title: "Flood".into(), message: "Heavy rain expected".into(), severity: Severity::Critical }],
            steps: vec![
                Step {
                    title: "Nursery".into(),
                    phase: Phase::Planting,
                    start_day: Some(0),
                    end_day: Some(21),
                    priority: Priority::High,
                    reason: "Healthy seedlings".into(),
                    actions: vec![
                        Action { task: "Soak seed for 24 hours".into(), why: "Speeds germination".into(), when: "Day 0".into(), warning: String::new() },
                        Action::new("Sow nursery beds"),
                    ],
                },
                Step {
                    title: "Flooding".into(),
                    phase: Phase::Water,
                    start_day: Some(21),
                    end_day: Some(60),
                    priority: Priority::Medium,
                    reason: String::new(),
                    actions: vec![Action::new("Keep 5 cm standing water")],
                },
            ],
        };
        let json = original.to_json().unwrap();
        let back = normalize(&json, &ctx(3.0), Protocol::Json);
        assert_eq!(back, original);
    }

    #[test]
    fn trailing_commas_are_tolerated() {
        let raw = r#"{"steps":[{"title":"A","phase":"soil","actions":[{"task":"Till soil",},],},]}"#;
        let plan = normalize(raw, &ctx(1.0), Protocol::Json);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].title, "A");
        assert_eq!(plan.steps[0].phase, Phase::Soil);
        assert_eq!(plan.steps[0].actions.len(), 1);
        assert_eq!(plan.steps[0].actions[0].task, "Till soil");
    }

    #[test]
    fn fenced_block_is_used_and_prose_ignored() {
        let raw = "Here is a great plan for your rice paddy! It will help a lot.\n\
            ```json\n{\"steps\":[{\"title\":\"Harvest\",\"phase\":\"harvest\",\"actions\":[{\"task\":\"Cut the panicles\"}]}]}\n```\n\
            Let me know if you need anything else.";
        let plan = normalize(raw, &ctx(1.0), Protocol::Json);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].actions[0].task, "Cut the panicles");
        assert!(plan.alerts.is_empty());
    }

    #[test]
    fn absent_yield_scales_with_area_and_respects_floor() {
        let raw = r#"{"summary":{"objective":"x"},"steps":[{"actions":["Plough"]}]}"#;
        let big = normalize(raw, &ctx(4.0), Protocol::Json);
        assert_eq!(big.summary.expected_yield_kg, 4.0 * DEFAULT_YIELD_KG_PER_HECTARE);
        let tiny = normalize(raw, &ctx(0.001), Protocol::Json);
        assert_eq!(tiny.summary.expected_yield_kg, MIN_EXPECTED_YIELD_KG);
        let none = normalize(raw, &ctx(0.0), Protocol::Json);
        assert_eq!(none.summary.expected_yield_kg, MIN_EXPECTED_YIELD_KG);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let raw = r#"{"steps":[
            {"phase":"composting","priority":"whenever","actions":[{"task":"Plough"}]},
            {"title":"Second","actions":["Sow"], "end_day": 30},
            {"title":"Dropped","actions":[]}
        ],
        "alerts":[{"message":"Dry spell","severity":"extreme"}, {}]}"#;
        let plan = normalize(raw, &ctx(1.0), Protocol::Json);
        assert_eq!(plan.steps.len(), 2);
        let first = &plan.steps[0];
        assert_eq!(first.title, "Step 1");
        assert_eq!(first.phase, Phase::Planting);
        assert_eq!(first.priority, Priority::Medium);
        assert_eq!((first.start_day, first.end_day), (Some(0), Some(7)));
        assert_eq!((plan.steps[1].start_day, plan.steps[1].end_day), (Some(23), Some(30)));
        assert_eq!(plan.summary.estimated_harvest_days, 30);
        assert_eq!(plan.summary.risk_level, RiskLevel::Medium);
        assert!(plan.summary.objective.contains("Rice"));
        assert_eq!(plan.alerts.len(), 1);
        assert_eq!(plan.alerts[0].title, "Notice");
        assert_eq!(plan.alerts[0].severity, Severity::Info);
    }

    #[test]
    fn nested_plan_object_and_camel_case_are_read() {
        let raw = r#"{"plan":{"summary":{"keyDecision":"Plant early","expectedYieldKg":"1200","riskLevel":"LOW"},
            "steps":[{"title":"Go","startDay":3,"endDay":9,"actions":[{"action":"Sow now"}]}]}}"#;
        let plan = normalize(raw, &ctx(1.0), Protocol::Json);
        assert_eq!(plan.summary.key_decision, "Plant early");
        assert_eq!(plan.summary.expected_yield_kg, 1200.0);
        assert_eq!(plan.summary.risk_level, RiskLevel::Low);
        assert_eq!(plan.steps[0].start_day, Some(3));
        assert_eq!(plan.steps[0].actions[0].task, "Sow now");
    }

    #[test]
    fn text_fields_are_sanitized() {
        let raw = "{\"steps\":[{\"title\":\"`Soil`  \u{1F331} prep\",\"actions\":[{\"task\":\"Add\\n\\n compost\",\"warning\":\"```Avoid``` wet soil\"}]}]}";
        let plan = normalize(raw, &ctx(1.0), Protocol::Json);
        assert_eq!(plan.steps[0].title, "Soil prep");
        assert_eq!(plan.steps[0].actions[0].task, "Add compost");
        assert_eq!(plan.steps[0].actions[0].warning, "Avoid wet soil");
    }

    #[test]
    fn broken_json_salvages_line_fragments() {
        let raw = "{\n  \"steps\": [\n    \"task\": \"Prepare raised nursery beds\",\n    \"task\": \"Transplant seedlings at 21 days\",\n\
            \"task\": \"Maintain shallow flooding in the paddy\",\n    \"phase\": \"soil\"\n";
        let plan = normalize(raw, &ctx(1.0), Protocol::Json);
        let tasks: Vec<&str> = plan.steps.iter().map(|s| s.actions[0].task.as_str()).collect();
        assert_eq!(
            tasks,
            vec!["Prepare raised nursery beds", "Transplant seedlings at 21 days", "Maintain shallow flooding in the paddy"]
        );
        assert_eq!(plan.steps[0].phase, Phase::Soil);
        assert_eq!(plan.steps[1].phase, Phase::Planting);
        assert_eq!(plan.steps[2].phase, Phase::Water);
        assert_eq!(plan.alerts.len(), 1);
        assert!(plan.alerts[0].message.contains("Rain"));
    }

    #[test]
    fn too_few_fragments_use_default_library() {
        let plan = normalize("nope", &ctx(1.0), Protocol::Json);
        assert_eq!(plan.steps.len(), Phase::ALL.len());
        assert!(plan.steps.iter().all(|s| s.actions.len() == 1));
        assert!(plan.steps[0].actions[0].task.contains("Rice"));
        assert_eq!(plan.steps[5].phase, Phase::Harvest);
        assert_eq!(plan.summary.estimated_harvest_days, 42);
    }

    #[test]
    fn huge_day_bounds_are_clamped() {
        let raw = r#"{"steps":[{"title":"A","start_day":1e12,"actions":[{"task":"Till soil"}]},
                     {"title":"B","end_day":99999999999,"actions":["Sow maize seed"]}]}"#;
        let plan = normalize(raw, &ctx(1.0), Protocol::Json);
        assert_eq!(plan.steps[0].actions[0].task, "Till soil");
        assert_eq!(plan.steps[0].start_day, Some(MAX_PLAN_DAY));
        assert_eq!(plan.steps[0].end_day, Some(MAX_PLAN_DAY + STEP_CADENCE_DAYS));
        assert_eq!(plan.steps[1].end_day, Some(MAX_PLAN_DAY));
        assert!(plan.steps.iter().all(|s| s.end_day >= s.start_day));
    }

    #[test]
    fn fenced_reply_with_trailing_commas_after_braced_prose() {
        let raw = "Plan {draft}:\n```json\n{\"steps\":[{\"title\":\"A\",\"actions\":[{\"task\":\"Till soil\",},],},]}\n```";
        let plan = normalize(raw, &ctx(1.0), Protocol::Json);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].actions[0].task, "Till soil");
    }

    #[test]
    fn unavailable_weather_gets_generic_alert() {
        let mut c = ctx(1.0);
        c.weather_summary = WEATHER_UNAVAILABLE.to_string();
        let plan = normalize("", &c, Protocol::Json);
        assert!(plan.alerts[0].message.starts_with("Weather data unavailable"));
    }

    #[test]
    fn prose_reply_uses_line_classifier() {
        let raw = "1. Land preparation\n   - Puddle the field\n2. Transplanting\n   - Transplant 2 seedlings per hill\n";
        let plan = normalize(raw, &ctx(2.0), Protocol::Prose);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].actions[0].task, "Puddle the field");
        assert_eq!(plan.steps[1].phase, Phase::Planting);
        assert_eq!(plan.summary.estimated_harvest_days, DEFAULT_HARVEST_DAYS);
        assert_eq!(plan.alerts.len(), 1);
    }
}
