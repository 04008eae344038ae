use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use statismo_core::builders::{PCAModelBuilder, PosteriorModelBuilder, ReducedVarianceModelBuilder};
use statismo_core::constraints::PointValue;
use statismo_core::data::DataManager;
use statismo_core::linalg::EigenMethod;
use statismo_core::record::ModelRecord;
use statismo_core::representer::{Representer, VectorRepresenter};

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::BuildPca {
            samples,
            noise_variance,
            method,
            scores,
            output,
        } => build_pca(&samples, noise_variance, &method, scores, &output),
        Commands::Condition {
            model,
            constraint,
            noise_variance,
            output,
        } => condition(&model, &constraint, noise_variance, &output),
        Commands::Reduce {
            model,
            variance,
            components,
            output,
        } => reduce(&model, variance, components, &output),
        Commands::Info { model } => print_info(&model),
    }
}

fn load_samples(dir: &Path) -> Result<Vec<Vec<f64>>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read samples directory {}", dir.display()))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    paths.sort_by_key(|e| e.path());

    let mut samples = Vec::new();
    for entry in paths {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read sample file {}", path.display()))?;
        let values: Vec<f64> = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>().with_context(|| format!("invalid number in {}", path.display())))
            .collect::<Result<_>>()?;
        if !values.is_empty() {
            samples.push(values);
        }
    }
    if samples.is_empty() {
        bail!("no sample files found in {}", dir.display());
    }
    Ok(samples)
}

fn build_pca(samples_dir: &Path, noise_variance: f64, method: &str, scores: bool, output: &Path) -> Result<()> {
    let samples = load_samples(samples_dir)?;
    let dim = samples[0].len();

    let method = match method {
        "jacobi" => EigenMethod::JacobiSvd,
        "self-adjoint" => EigenMethod::SelfAdjointEigen,
        other => bail!("unknown method '{other}', expected 'jacobi' or 'self-adjoint'"),
    };

    let mut manager = DataManager::new(VectorRepresenter::new(dim));
    for (i, sample) in samples.iter().enumerate() {
        manager.add_dataset(sample, format!("sample-{i}"))?;
    }

    let model = PCAModelBuilder::new(method, scores).build_new_model(&manager, noise_variance)?;

    info!(components = model.num_components(), "Fitted PCA model");

    let record = ModelRecord::from_model(&model);
    record.save_to_file(output)?;
    Ok(())
}

fn parse_constraints(entries: &[String]) -> Result<Vec<PointValue<usize>>> {
    entries
        .iter()
        .map(|entry| {
            let (point, value) = entry
                .split_once('=')
                .with_context(|| format!("constraint '{entry}' is not in 'point=value' form"))?;
            let point: usize = point.parse().with_context(|| format!("invalid point index in '{entry}'"))?;
            let value: f64 = value.parse().with_context(|| format!("invalid value in '{entry}'"))?;
            Ok(PointValue::new(point, vec![value]))
        })
        .collect()
}

fn condition(model_path: &Path, constraints: &[String], noise_variance: f64, output: &Path) -> Result<()> {
    let record = ModelRecord::load_from_file(model_path)?;
    let representer = VectorRepresenter::new(record.mean.len());
    let prior = record.to_model(representer)?;

    let point_values = parse_constraints(constraints)?;
    let dim = prior.representer().dimensions();
    let with_covariance = statismo_core::constraints::trivial_uniform(&point_values, noise_variance, dim);

    let posterior = PosteriorModelBuilder::new().build_new_model_from_model(&prior, &with_covariance)?;

    info!(components = posterior.num_components(), "Conditioned model");

    ModelRecord::from_model(&posterior).save_to_file(output)?;
    Ok(())
}

fn reduce(model_path: &Path, variance: Option<f64>, components: Option<usize>, output: &Path) -> Result<()> {
    let record = ModelRecord::load_from_file(model_path)?;
    let representer = VectorRepresenter::new(record.mean.len());
    let model = record.to_model(representer)?;

    let builder = ReducedVarianceModelBuilder::new();
    let reduced = match (variance, components) {
        (Some(v), None) => builder.build_new_model_with_variance(&model, v),
        (None, Some(k)) => builder.build_new_model_with_number_of_components(&model, k),
        _ => bail!("exactly one of --variance or --components must be supplied"),
    }?;

    info!(components = reduced.num_components(), "Reduced model");

    ModelRecord::from_model(&reduced).save_to_file(output)?;
    Ok(())
}

fn print_info(model_path: &Path) -> Result<()> {
    let record = ModelRecord::load_from_file(model_path)?;

    println!("version: {}", record.version);
    println!(
        "representer: {} ({})",
        record.representer_identifier, record.representer_version
    );
    println!("components: {}", record.pca_variance.len());
    println!("noise variance: {}", record.noise_variance);
    println!(
        "scores: {}",
        record
            .scores
            .as_ref()
            .map(|s| format!("{}x{}", s.rows, s.cols))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("builder chain:");
    for entry in &record.builder_info {
        println!("  - {}", entry.builder_name);
        for (k, v) in &entry.parameters {
            println!("      {k} = {v}");
        }
    }

    Ok(())
}
