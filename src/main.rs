extern crate log;
extern crate pretty_env_logger;

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use labelmesh::config::Config;
use labelmesh::features::io::read_feature_csv;
use labelmesh::labeling::groups::{
    write_groups_csv,
    write_groups_json,
};
use labelmesh::labeling::task::run_batch;
use labelmesh::labeling::{
    LabelingOutput,
    LabelingTask,
};
use labelmesh::Result;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    config: String,
    #[arg(short, long, default_value = "labelmesh_output")]
    output_dir: String,
    #[arg(long, action)]
    write_template: bool,
    /// Feature tables (.csv) as UNLABELED LABELED pairs
    files: Vec<String>,
}

fn write_template(path: &str) -> Result<()> {
    let config = Config::default();
    let config_str = toml::to_string_pretty(&config).map_err(std::io::Error::other)?;
    if fs::metadata(path).is_ok() {
        log::error!("File already exists: {}", path);
        return Err(std::io::Error::from(std::io::ErrorKind::AlreadyExists).into());
    }
    fs::write(path, config_str)?;
    println!("Wrote default config to {}", path);
    Ok(())
}

fn write_outputs(
    config: &Config,
    out_dir: &Path,
    name: &str,
    output: &LabelingOutput,
) -> Result<()> {
    let prefix = name.replace(' ', "_");
    let (groups_json, groups_csv, table_csv) = config.output_config.resolve(out_dir, &prefix);
    if let Some(path) = groups_json {
        write_groups_json(&output.groups, &path)?;
        log::info!("Wrote {:?}", path);
    }
    if let Some(path) = groups_csv {
        write_groups_csv(&output.groups, &path)?;
        log::info!("Wrote {:?}", path);
    }
    if let (Some(path), Some(table)) = (table_csv, output.result_table.as_ref()) {
        table.write_csv(&path)?;
        log::info!("Wrote {:?}", path);
    }
    Ok(())
}

fn run(args: Args) -> Result<bool> {
    if args.write_template {
        write_template(&args.config)?;
        return Ok(true);
    }

    let config = Config::from_toml(&args.config)?;
    let isotope_table = config.isotope_table()?;

    if args.files.is_empty() || args.files.len() % 2 != 0 {
        log::error!(
            "Expected UNLABELED LABELED pairs of feature tables, got {} files",
            args.files.len()
        );
        return Ok(false);
    }

    let out_dir = Path::new(&args.output_dir);
    if !out_dir.exists() {
        fs::create_dir_all(out_dir)?;
    }

    let mut tasks = Vec::new();
    for pair in args.files.chunks(2) {
        log::info!("Reading unlabeled: {}, labeled: {}", pair[0], pair[1]);
        let unlabeled = read_feature_csv(&pair[0])?;
        let labeled = read_feature_csv(&pair[1])?;
        tasks.push(LabelingTask::new(
            unlabeled,
            labeled,
            config.labeling_config.clone(),
            isotope_table.clone(),
        ));
    }

    let mut all_ok = true;
    for (name, out) in run_batch(tasks) {
        match out {
            Ok(output) => {
                println!("{}: {} labeled clusters", name, output.groups.len());
                if let Err(e) = write_outputs(&config, out_dir, &name, &output) {
                    log::error!("Error writing results for '{}': {}", name, e);
                    all_ok = false;
                }
            },
            Err(e) => {
                log::error!("Error processing '{}': {}", name, e);
                all_ok = false;
            },
        }
    }
    Ok(all_ok)
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        },
    }
}
