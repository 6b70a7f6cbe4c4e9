use std::env;
use std::path::PathBuf;

use seedbed_generate::{EngineOptions, SeedEngine};
use seedbed_plan::load_plan;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let mut plan_path: Option<PathBuf> = None;
    let mut base_dir: Option<PathBuf> = None;
    let mut seed: Option<u64> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--plan" => plan_path = args.next().map(PathBuf::from),
            "--base-dir" => base_dir = args.next().map(PathBuf::from),
            "--seed" => seed = args.next().map(|value| value.parse()).transpose()?,
            _ => {
                if plan_path.is_none() {
                    plan_path = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let plan_path = plan_path.ok_or("missing --plan path")?;
    let validated = load_plan(&plan_path)?;
    for warning in &validated.warnings {
        eprintln!("warning [{}] {}: {}", warning.code, warning.path, warning.message);
    }

    let base_dir = base_dir
        .or_else(|| plan_path.parent().map(PathBuf::from))
        .unwrap_or_default();
    let engine = SeedEngine::new(EngineOptions {
        base_dir,
        seed,
        ..EngineOptions::default()
    });
    let report = engine.run(&validated.plan)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
