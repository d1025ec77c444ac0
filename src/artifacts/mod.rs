use anyhow::Context;
use chrono::{DateTime, Utc};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use serde_json::to_string_pretty;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::plan::StructuredPlan;

pub struct SavedPaths {
    pub dir: PathBuf,
    pub prompt: Option<PathBuf>,
    pub response: Option<PathBuf>,
    pub plan: Option<PathBuf>,
}

fn run_dir(out: &Path, run: Uuid) -> PathBuf {
    out.join("runs").join(run.to_string())
}

/// Writes one generation's prompt, raw reply and normalized plan under
/// `<out>/runs/<run>/`, each gated by its flag.
pub fn save_run(
    out: &Path,
    run: Uuid,
    prompt: &str,
    raw_response: &str,
    plan: &StructuredPlan,
    save_request: bool,
    save_response: bool,
) -> anyhow::Result<SavedPaths> {
    let dir = run_dir(out, run);
    fs::create_dir_all(&dir)?;

    let mut prompt_path = None;
    let mut response_path = None;
    let mut plan_path = None;

    if save_request {
        let p = dir.join("prompt.txt");
        fs::write(&p, prompt)?;
        prompt_path = Some(p);
    }

    if save_response {
        let p = dir.join("response.txt");
        fs::write(&p, raw_response)?;
        response_path = Some(p);

        let p = dir.join("plan.json");
        fs::write(&p, to_string_pretty(plan)?)?;
        plan_path = Some(p);
    }

    debug!(dir = %dir.display(), "run artifacts written");
    Ok(SavedPaths { dir, prompt: prompt_path, response: response_path, plan: plan_path })
}

/// The confirmed selections for one field. Walkthrough progress is never part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantingPlanDocument {
    pub id: Uuid,
    pub crop: String,
    pub boundary: Vec<GeoPoint>,
    pub area_hectares: f64,
    pub center_latitude: f64,
    pub center_longitude: f64,
    /// JSON-serialized plan.
    pub plan: String,
    pub created_at: DateTime<Utc>,
}

impl PlantingPlanDocument {
    pub fn new(
        crop: &str,
        boundary: &[GeoPoint],
        area_hectares: f64,
        center: GeoPoint,
        plan: &StructuredPlan,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            crop: crop.to_string(),
            boundary: boundary.to_vec(),
            area_hectares,
            center_latitude: center.latitude,
            center_longitude: center.longitude,
            plan: plan.to_json().context("serializing plan")?,
            created_at: Utc::now(),
        })
    }
}

/// Stores the document as `<out>/plans/<id>.json` and returns the path.
pub fn save_document(out: &Path, doc: &PlantingPlanDocument) -> anyhow::Result<PathBuf> {
    let dir = out.join("plans");
    fs::create_dir_all(&dir)?;
    let p = dir.join(format!("{}.json", doc.id));
    fs::write(&p, to_string_pretty(doc)?)?;
    Ok(p)
}

pub fn print_saved_paths(saved: &SavedPaths) {
    println!("artifacts directory: {}", saved.dir.display());
    for (label, path) in [("prompt", &saved.prompt), ("response", &saved.response), ("plan", &saved.plan)] {
        match path {
            Some(p) => println!("  {label} saved at: {}", p.display()),
            None => println!("  {label} not saved (flag off)"),
        }
    }
}
