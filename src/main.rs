use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use fault_forge::core_modules::intensity::DEFAULT_CONFIG_FILE;
use fault_forge::core_modules::metadata;
use fault_forge::parallel_pipeline::ParallelPipeline;
use fault_forge::pipeline::{
    FaultCategory, FaultConfig, FaultKind, GenerationPipeline, GenerationRequest, IntensityLevel,
    OutputMode, RunCallbacks,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!(
            "Usage: fault_forge <input_dir> <output_dir> \
             [--levels low,medium,extreme] [--faults id,id,...] \
             [--categories EMI,Hardware,...] [--config path] [--seed n] \
             [--resize] [--sequential]"
        );
        return Ok(());
    }
    let input_dir = PathBuf::from(&args[1]);
    let output_dir = PathBuf::from(&args[2]);

    let mut levels = IntensityLevel::ALL.to_vec();
    let mut selected_faults: Vec<String> = FaultKind::ALL
        .iter()
        .map(|fault| fault.identifier().to_string())
        .collect();
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
    let mut seed = None;
    let mut resize = false;
    let mut sequential = false;

    let mut rest = args[3..].iter();
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--levels" => {
                let value = rest.next().context("--levels needs a value")?;
                levels = value
                    .split(',')
                    .map(|label| {
                        IntensityLevel::parse(label)
                            .with_context(|| format!("unknown level '{label}'"))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
            }
            "--faults" => {
                let value = rest.next().context("--faults needs a value")?;
                selected_faults = value.split(',').map(|id| id.to_string()).collect();
            }
            "--categories" => {
                let value = rest.next().context("--categories needs a value")?;
                let mut faults = Vec::new();
                for label in value.split(',') {
                    let category = FaultCategory::ALL
                        .iter()
                        .copied()
                        .find(|category| category.label() == label)
                        .with_context(|| format!("unknown category '{label}'"))?;
                    faults.extend(
                        FaultKind::ALL
                            .iter()
                            .filter(|fault| fault.category() == category)
                            .map(|fault| fault.identifier().to_string()),
                    );
                }
                selected_faults = faults;
            }
            "--config" => {
                config_path = PathBuf::from(rest.next().context("--config needs a value")?);
            }
            "--seed" => {
                let value = rest.next().context("--seed needs a value")?;
                seed = Some(value.parse::<u64>().context("--seed must be an integer")?);
            }
            "--resize" => resize = true,
            "--sequential" => sequential = true,
            other => bail!("unknown flag '{other}'"),
        }
    }

    // --- 2. Configuration & Request Assembly ---
    let config = FaultConfig::load(&config_path);
    let request = GenerationRequest {
        input_dir,
        output_dir: output_dir.clone(),
        levels,
        selected_faults,
        mode: OutputMode::Materialize,
        resize,
        seed,
    };
    let callbacks = RunCallbacks {
        progress: Some(Box::new(|completed, total| {
            eprint!("\r[{completed}/{total}]");
        })),
        log: Some(Box::new(|message| {
            eprintln!("\n{message}");
        })),
    };

    // --- 3. Run the Batch ---
    let output = if sequential {
        let pipeline = GenerationPipeline::new(config);
        pipeline.run(&request, &callbacks)?
    } else {
        let pipeline =
            ParallelPipeline::new(config).with_unit_deadline(Duration::from_secs(120));
        pipeline.run(&request, &callbacks).await?
    };

    // --- 4. Persist the Provenance Artifacts ---
    metadata::write_summary_json(Path::new(&output_dir), &output.summary)?;
    metadata::write_summary_csv(Path::new(&output_dir), &output.summary)?;

    eprintln!();
    println!(
        "Generation {:?}: {} records written to {}",
        output.status,
        output.summary.len(),
        output_dir.display()
    );
    Ok(())
}
