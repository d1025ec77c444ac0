use chrono::{Local, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Reply format the model is asked for.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// One strict JSON object matching the plan schema.
    #[default]
    Json,
    /// Numbered walkthrough in prose (earlier format).
    Prose,
}

/// Inputs for one generation; rebuilt every time the user asks for a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    pub crop: String,
    pub farm_area_hectares: f64,
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub weather_summary: String,
    pub request_date: NaiveDate,
}

impl PlanRequest {
    pub fn new(
        crop: &str,
        farm_area_hectares: f64,
        center_latitude: f64,
        center_longitude: f64,
        weather_summary: &str,
    ) -> Self {
        Self {
            crop: crop.trim().to_string(),
            farm_area_hectares,
            center_latitude,
            center_longitude,
            weather_summary: weather_summary.to_string(),
            request_date: Local::now().date_naive(),
        }
    }
}

fn json_schema() -> &'static str {
r#"{
  "summary": {
    "objective": string,
    "key_decision": string,
    "estimated_harvest_days": integer,
    "expected_yield_kg": number,
    "risk_level": "low" | "medium" | "high"
  },
  "alerts": [
    { "title": string, "message": string, "severity": "info" | "warning" | "critical" }
  ],
  "steps": [
    {
      "title": string,
      "phase": "soil" | "planting" | "water" | "fertilizer" | "protection" | "harvest",
      "start_day": integer,
      "end_day": integer,
      "priority": "low" | "medium" | "high",
      "reason": string,
      "actions": [
        { "task": string, "why": string, "when": string, "warning": string }
      ]
    }
  ]
}"#
}

fn field_facts(req: &PlanRequest) -> String {
    format!(
"Crop: {crop}
Farm area: {area:.2} hectares
Field centre: latitude {lat:.4}, longitude {lon:.4}
Current weather: {weather}
Today's date: {date}",
        crop = req.crop,
        area = req.farm_area_hectares,
        lat = req.center_latitude,
        lon = req.center_longitude,
        weather = req.weather_summary,
        date = req.request_date.format("%B %-d, %Y"),
    )
}

fn json_instructions() -> String {
    format!(
r#"Return EXACTLY ONE JSON object (no markdown, no prose, no code fences) that conforms to:

{schema}

Rules:
- 4 to 8 steps in chronological order, covering soil preparation through harvest.
- Every step has 1 to 4 actions. Each "task" is one short imperative sentence a farmer can tick off.
- "start_day" and "end_day" count days from today.
- Keep "why", "when" and "warning" short; use "" when there is nothing to say.
- Use plain ASCII text. No emoji. No trailing commas."#,
        schema = json_schema()
    )
}

fn prose_instructions() -> &'static str {
r#"Write a guided walkthrough as numbered steps in chronological order, from soil preparation to harvest.

Format:
1. <Step title>
   - <one short imperative action>
   - <one short imperative action>
2. <Step title>
   - ...

Use 4 to 8 steps with 1 to 4 actions each. Plain text only, no tables, no emoji."#
}

/// Renders the single prompt sent to the model. Pure apart from the date
/// already captured in `req`.
pub fn build_prompt(req: &PlanRequest, protocol: Protocol) -> String {
    let format_rules = match protocol {
        Protocol::Json => json_instructions(),
        Protocol::Prose => prose_instructions().to_string(),
    };
    format!(
"You are an experienced agronomist preparing a practical, season-long farming plan for a smallholder farmer.

Field details:
{facts}

Tailor timings and quantities to the crop, the field size and the weather. Flag weather risks as alerts.

{format_rules}",
        facts = field_facts(req),
        format_rules = format_rules,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(area: f64) -> PlanRequest {
        PlanRequest {
            crop: "Maize".into(),
            farm_area_hectares: area,
            center_latitude: 12.971_598_7,
            center_longitude: 77.594_566_3,
            weather_summary: "27.3 C, Partly cloudy, humidity 61%, wind 10.0 km/h".into(),
            request_date: NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(),
        }
    }

    #[test]
    fn states_rounded_field_facts_and_date() {
        let p = build_prompt(&request(1.23456), Protocol::Json);
        assert!(p.contains("Crop: Maize"));
        assert!(p.contains("Farm area: 1.23 hectares"));
        assert!(p.contains("latitude 12.9716, longitude 77.5946"));
        assert!(p.contains("Partly cloudy"));
        assert!(p.contains("March 7, 2026"));
    }

    #[test]
    fn json_protocol_embeds_schema() {
        let p = build_prompt(&request(2.0), Protocol::Json);
        assert!(p.contains("EXACTLY ONE JSON object"));
        assert!(p.contains("\"expected_yield_kg\": number"));
        assert!(!p.contains("<Step title>"));
    }

    #[test]
    fn prose_protocol_asks_for_numbered_walkthrough() {
        let p = build_prompt(&request(2.0), Protocol::Prose);
        assert!(p.contains("1. <Step title>"));
        assert!(!p.contains("EXACTLY ONE JSON object"));
    }

    #[test]
    fn zero_area_passes_through() {
        let p = build_prompt(&request(0.0), Protocol::Json);
        assert!(p.contains("Farm area: 0.00 hectares"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let r = request(3.5);
        assert_eq!(build_prompt(&r, Protocol::Json), build_prompt(&r, Protocol::Json));
    }
}
