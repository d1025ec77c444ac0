use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use fs_err as fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod artifacts;
mod cli;
mod config;
mod errors;
mod geo;
mod normalize;
mod plan;
mod prompt;
mod provider;
mod ux;
mod walkthrough;
mod weather;
mod wire;

use geo::GeoPoint;
use normalize::NormalizeContext;
use plan::StructuredPlan;
use prompt::{PlanRequest, Protocol};
use provider::{http::HttpTransport, PlanClient};
use ux::WalkOutcome;
use walkthrough::Walkthrough;
use weather::WeatherClient;

struct Field {
    boundary: Vec<GeoPoint>,
    area_hectares: f64,
    center: GeoPoint,
}

/// Everything a network generation needs, built once per process.
struct Session {
    crop: String,
    protocol: Protocol,
    field: Field,
    out: PathBuf,
    models: Vec<String>,
    client: PlanClient<HttpTransport>,
    weather: WeatherClient,
    save_request: bool,
    save_response: bool,
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_field(args: &cli::Args, region_center: GeoPoint) -> anyhow::Result<Field> {
    let boundary = match &args.boundary {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            geo::parse_boundary_json(&text).with_context(|| format!("reading boundary from {}", path))?
        }
        None => args.points.iter().map(|p| geo::parse_point(p)).collect::<anyhow::Result<Vec<_>>>()?,
    };
    let area_hectares = geo::polygon_area_hectares(&boundary);
    let center = geo::centroid(&boundary).unwrap_or(region_center);
    info!(vertices = boundary.len(), area_hectares, lat = center.latitude, lon = center.longitude, "field");
    Ok(Field { boundary, area_hectares, center })
}

/// Weather, prompt, model call and normalization for one plan. `None` when
/// the call failed and the user chose not to retry.
async fn generate(session: &Session) -> anyhow::Result<Option<StructuredPlan>> {
    loop {
        let sp = ux::spinner("Checking current weather...");
        let weather_summary = session.weather.summary_or_unavailable(session.field.center).await;
        sp.finish_and_clear();

        let req = PlanRequest::new(
            &session.crop,
            session.field.area_hectares,
            session.field.center.latitude,
            session.field.center.longitude,
            &weather_summary,
        );
        let prompt_text = prompt::build_prompt(&req, session.protocol);
        debug!(prompt = %prompt_text, "plan prompt");

        let sp = ux::spinner(&format!("Generating a plan for {}...", req.crop));
        let res = session.client.generate(&prompt_text, &session.models).await;
        sp.finish_and_clear();

        match res {
            Ok(raw) => {
                let ctx = NormalizeContext {
                    crop: req.crop.clone(),
                    area_hectares: req.farm_area_hectares,
                    weather_summary: req.weather_summary.clone(),
                };
                let plan = normalize::normalize(&raw, &ctx, session.protocol);
                info!(steps = plan.steps.len(), actions = plan.action_count(), "plan ready");

                if session.save_request || session.save_response {
                    let saved = artifacts::save_run(
                        &session.out,
                        Uuid::new_v4(),
                        &prompt_text,
                        &raw,
                        &plan,
                        session.save_request,
                        session.save_response,
                    )?;
                    artifacts::print_saved_paths(&saved);
                }
                return Ok(Some(plan));
            }
            Err(e) => {
                ux::print_error_alert(&e);
                if !ux::confirm("Try again?") {
                    return Ok(None);
                }
            }
        }
    }
}

fn offline_plan(path: &str, args: &cli::Args, field: &Field) -> anyhow::Result<StructuredPlan> {
    let raw = fs::read_to_string(path)?;
    let ctx = NormalizeContext {
        crop: args.crop.trim().to_string(),
        area_hectares: field.area_hectares,
        weather_summary: weather::WEATHER_UNAVAILABLE.to_string(),
    };
    Ok(normalize::normalize(&raw, &ctx, args.protocol))
}

fn save_confirmed(out: &Path, crop: &str, field: &Field, plan: &StructuredPlan, yes: bool) -> anyhow::Result<()> {
    if !yes && !ux::confirm("Save this plan for the field?") {
        println!("Plan not saved.");
        return Ok(());
    }
    let doc = artifacts::PlantingPlanDocument::new(crop, &field.boundary, field.area_hectares, field.center, plan)?;
    let path = artifacts::save_document(out, &doc)?;
    println!("{} {}", "plan saved at:".green().bold(), path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_tracing(args.debug);

    let mut cfg = match &args.config {
        Some(path) => config::Config::load(Path::new(path))?,
        None => config::Config::default(),
    };
    if let Some(m) = &args.model {
        cfg.model = m.clone();
    }
    if let Some(o) = &args.out {
        cfg.out_dir = o.clone();
    }
    if let Some(t) = args.timeout_secs {
        cfg.timeout_secs = t;
    }
    debug!(?cfg, "effective config");

    let out = PathBuf::from(&cfg.out_dir);
    let field = read_field(&args, cfg.region_center)?;
    let auto_advance = Duration::from_millis(cfg.auto_advance_ms);

    // ===== OFFLINE: walk a saved reply =====
    if let Some(path) = &args.from_response {
        let plan = offline_plan(path, &args, &field)?;
        let mut walk = Walkthrough::new(&plan);
        while ux::run_walkthrough(&plan, &mut walk, auto_advance).await == WalkOutcome::Regenerate {
            println!("{}", "Regenerating needs the API. Run again without --from-response.".yellow());
        }
        return save_confirmed(&out, args.crop.trim(), &field, &plan, args.yes);
    }

    // ===== GENERATE =====
    let timeout = Duration::from_secs(cfg.timeout_secs);
    let transport = HttpTransport::new(&cfg.api_base, &cfg.api_version, timeout, cfg.transport_retries)?;
    let session = Session {
        crop: args.crop.trim().to_string(),
        protocol: args.protocol,
        field,
        out,
        models: provider::candidate_models(&cfg.model, &cfg.fallback_models),
        client: PlanClient::new(transport, cfg.api_key(), &cfg.api_key_env, cfg.temperature, cfg.max_tokens),
        weather: WeatherClient::new(&cfg.weather_base, cfg.forecast_days, timeout)?,
        save_request: args.save_request,
        save_response: args.save_response,
    };

    let Some(mut plan) = generate(&session).await? else {
        println!("Aborted by user.");
        return Ok(());
    };

    // ===== WALKTHROUGH =====
    let mut walk = Walkthrough::new(&plan);
    while ux::run_walkthrough(&plan, &mut walk, auto_advance).await == WalkOutcome::Regenerate {
        if let Some(fresh) = generate(&session).await? {
            plan = fresh;
            walk.reset(&plan);
        }
    }

    save_confirmed(&session.out, &session.crop, &session.field, &plan, args.yes)
}
