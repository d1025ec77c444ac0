use clap::Parser;

use crate::prompt::Protocol;

#[derive(Parser, Debug)]
#[command(name = "agroplan", version, about = "AI farming plan generator with a guided, one-task-at-a-time walkthrough")]
pub struct Args {
    /// Crop to plan for, e.g. "maize".
    #[arg(long)]
    pub crop: String,

    /// Boundary vertex as LAT,LON. Repeat for each corner of the field.
    #[arg(long = "point", value_name = "LAT,LON", allow_hyphen_values = true)]
    pub points: Vec<String>,

    /// JSON file with the boundary: [[lat, lon], ...] or [{"latitude", "longitude"}, ...].
    #[arg(long, conflicts_with = "points")]
    pub boundary: Option<String>,

    /// Primary model; configured fallbacks are tried after it.
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long, value_enum, default_value_t = Protocol::Json)]
    pub protocol: Protocol,

    /// Normalize and walk through a saved raw reply instead of calling the API.
    #[arg(long, value_name = "FILE")]
    pub from_response: Option<String>,

    /// TOML or YAML config file.
    #[arg(long)]
    pub config: Option<String>,

    /// Output directory for run artifacts and saved plans.
    #[arg(long)]
    pub out: Option<String>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, default_value_t = false)]
    pub save_request: bool,

    #[arg(long, default_value_t = false)]
    pub save_response: bool,

    /// Save the confirmed plan without asking.
    #[arg(long, default_value_t = false)]
    pub yes: bool,

    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_points_including_negative_coordinates() {
        let args = Args::try_parse_from([
            "agroplan", "--crop", "maize", "--point", "-1.28,36.81", "--point", "-1.29,36.82", "--protocol", "prose",
        ])
        .unwrap();
        assert_eq!(args.points, vec!["-1.28,36.81", "-1.29,36.82"]);
        assert_eq!(args.protocol, Protocol::Prose);
        assert!(!args.debug);
    }

    #[test]
    fn boundary_file_conflicts_with_points() {
        let res = Args::try_parse_from(["agroplan", "--crop", "x", "--point", "1,2", "--boundary", "b.json"]);
        assert!(res.is_err());
    }

    #[test]
    fn crop_is_required() {
        assert!(Args::try_parse_from(["agroplan"]).is_err());
    }
}
