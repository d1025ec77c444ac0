use serde::{Deserialize, Serialize};

/// Canonical farming plan. Built once per generation by the normalizer and
/// never mutated afterwards; the walkthrough keeps its own state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredPlan {
    pub summary: Summary,
    pub alerts: Vec<Alert>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub objective: String,
    pub key_decision: String,
    pub estimated_harvest_days: u32,
    pub expected_yield_kg: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub title: String,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_day: Option<u32>,
    pub priority: Priority,
    pub reason: String,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub task: String,
    #[serde(default)]
    pub why: String,
    #[serde(default)]
    pub when: String,
    #[serde(default)]
    pub warning: String,
}

impl Action {
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into(), why: String::new(), when: String::new(), warning: String::new() }
    }
}

/// Key of one action inside one plan: (step index, action index within step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId {
    pub step: usize,
    pub action: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Soil,
    #[default]
    Planting,
    Water,
    Fertilizer,
    Protection,
    Harvest,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Soil,
        Phase::Planting,
        Phase::Water,
        Phase::Fertilizer,
        Phase::Protection,
        Phase::Harvest,
    ];

    /// Accepts the schema names plus the synonyms models tend to use.
    pub fn parse_loose(s: &str) -> Option<Phase> {
        let t = s.trim().to_lowercase();
        let p = match t.as_str() {
            "soil" | "soil preparation" | "land preparation" | "tillage" => Phase::Soil,
            "planting" | "sowing" | "seeding" | "transplanting" => Phase::Planting,
            "water" | "watering" | "irrigation" => Phase::Water,
            "fertilizer" | "fertiliser" | "fertilization" | "fertilisation" | "nutrients" | "nutrition" => {
                Phase::Fertilizer
            }
            "protection" | "pest" | "pests" | "pest control" | "disease" | "weeding" | "crop protection" => {
                Phase::Protection
            }
            "harvest" | "harvesting" => Phase::Harvest,
            _ => return None,
        };
        Some(p)
    }

    /// Keyword guess from free text such as a prose heading.
    pub fn infer(text: &str) -> Option<Phase> {
        let t = text.to_lowercase();
        let table: [(&[&str], Phase); 6] = [
            (&["harvest"], Phase::Harvest),
            (&["pest", "disease", "weed", "protect", "spray"], Phase::Protection),
            (&["fertili", "nutrient", "manure", "compost", "npk"], Phase::Fertilizer),
            (&["water", "irrigat", "moisture"], Phase::Water),
            (&["soil", "till", "plough", "plow", "land prep"], Phase::Soil),
            (&["plant", "sow", "seed", "transplant"], Phase::Planting),
        ];
        table
            .iter()
            .find(|(keys, _)| keys.iter().any(|k| t.contains(k)))
            .map(|(_, p)| *p)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Soil => "Soil Preparation",
            Phase::Planting => "Planting",
            Phase::Water => "Water Management",
            Phase::Fertilizer => "Fertilizer",
            Phase::Protection => "Crop Protection",
            Phase::Harvest => "Harvest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn parse_loose(s: &str) -> Option<Priority> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" | "moderate" | "normal" => Some(Priority::Medium),
            "high" | "urgent" | "critical" => Some(Priority::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    pub fn parse_loose(s: &str) -> Option<RiskLevel> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" | "moderate" => Some(RiskLevel::Medium),
            "high" | "severe" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn parse_loose(s: &str) -> Option<Severity> {
        match s.trim().to_lowercase().as_str() {
            "info" | "information" | "notice" | "low" => Some(Severity::Info),
            "warning" | "warn" | "medium" => Some(Severity::Warning),
            "critical" | "danger" | "severe" | "high" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl StructuredPlan {
    pub fn action_count(&self) -> usize {
        self.steps.iter().map(|s| s.actions.len()).sum()
    }

    /// Flattened action keys in walkthrough order: step order, then action order.
    pub fn action_ids(&self) -> Vec<ActionId> {
        self.steps
            .iter()
            .enumerate()
            .flat_map(|(si, s)| (0..s.actions.len()).map(move |ai| ActionId { step: si, action: ai }))
            .collect()
    }

    pub fn action(&self, id: ActionId) -> Option<&Action> {
        self.steps.get(id.step).and_then(|s| s.actions.get(id.action))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
