use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use imagegen_client::{service_from_config, AppError, BatchParams, Config, GenerateParams};

#[derive(Parser, Debug)]
#[command(name = "imagectl", about = "CLI for the image generation backend", version)]
struct Cli {
    /// Override IMAGEGEN_URL
    #[arg(global = true, long)]
    url: Option<String>,

    /// Override MAX_CONCURRENT
    #[arg(global = true, long)]
    max_concurrent: Option<usize>,

    /// Print compact JSON instead of pretty-printed output
    #[arg(global = true, long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate one image per prompt; prompts run through the request queue
    Generate {
        /// One or more prompts
        #[arg(required = true, value_name = "PROMPT")]
        prompts: Vec<String>,
        #[command(flatten)]
        options: GenerationOptions,
        /// Write results to this file instead of stdout
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Generate several prompts in a single backend batch call
    Batch {
        /// Prompt text (repeatable)
        #[arg(long = "prompt", required = true, value_name = "TEXT")]
        prompts: Vec<String>,
        #[command(flatten)]
        options: GenerationOptions,
        /// Write the result to this file instead of stdout
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Show backend model information
    Info,
    /// Ask the backend to reload its model
    Reload,
}

#[derive(Args, Debug, Clone)]
struct GenerationOptions {
    /// Negative prompt text
    #[arg(long, value_name = "TEXT")]
    negative_prompt: Option<String>,
    /// Width
    #[arg(long)]
    width: Option<u32>,
    /// Height
    #[arg(long)]
    height: Option<u32>,
    /// Inference steps
    #[arg(long, alias = "steps")]
    num_inference_steps: Option<u32>,
    /// Guidance scale
    #[arg(long, alias = "cfg")]
    guidance_scale: Option<f64>,
    /// Seed
    #[arg(long)]
    seed: Option<i64>,
}

impl GenerationOptions {
    fn for_prompt(&self, prompt: &str) -> GenerateParams {
        GenerateParams {
            prompt: prompt.to_string(),
            negative_prompt: self.negative_prompt.clone(),
            width: self.width,
            height: self.height,
            num_inference_steps: self.num_inference_steps,
            guidance_scale: self.guidance_scale,
            seed: self.seed,
        }
    }

    fn for_batch(&self, prompts: Vec<String>) -> BatchParams {
        BatchParams {
            prompts,
            negative_prompt: self.negative_prompt.clone(),
            width: self.width,
            height: self.height,
            num_inference_steps: self.num_inference_steps,
            guidance_scale: self.guidance_scale,
            seed: self.seed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    // Load env and parse CLI
    Config::dotenv_load();
    let cli = Cli::parse();

    let mut conf = Config::new()?;
    if let Some(url) = cli.url {
        conf.imagegen_url = url;
    }
    if let Some(n) = cli.max_concurrent {
        conf.max_concurrent = n;
    }
    let service = service_from_config(&conf);

    match cli.command {
        Commands::Generate { prompts, options, out } => {
            // Submit everything up front so the queue can overlap requests.
            let mut tasks = Vec::with_capacity(prompts.len());
            for prompt in &prompts {
                let service = service.clone();
                let params = options.for_prompt(prompt);
                tasks.push(tokio::spawn(async move { service.generate(&params).await }));
            }

            let mut results = Vec::with_capacity(tasks.len());
            let mut failures = 0;
            for (prompt, task) in prompts.iter().zip(tasks) {
                match task.await? {
                    Ok(v) => results.push(v),
                    Err(e) => {
                        failures += 1;
                        eprintln!("Error for prompt {:?}: {}", prompt, e);
                        results.push(serde_json::json!({ "prompt": prompt, "error": e.to_string() }));
                    }
                }
            }

            let body = if results.len() == 1 { results.remove(0) } else { Value::Array(results) };
            emit(&body, cli.json, out.as_ref()).await?;
            if failures > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Batch { prompts, options, out } => {
            let params = options.for_batch(prompts);
            let v = service.batch(&params).await.map_err(report)?;
            emit(&v, cli.json, out.as_ref()).await
        }
        Commands::Info => {
            let v = service.info().await.map_err(report)?;
            emit(&v, cli.json, None).await
        }
        Commands::Reload => {
            let v = service.reload().await.map_err(report)?;
            emit(&v, cli.json, None).await
        }
    }
}

fn report(e: AppError) -> AppError {
    eprintln!("Error: {}", e);
    e
}

async fn emit(v: &Value, compact: bool, out: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let text = if compact { serde_json::to_string(v)? } else { serde_json::to_string_pretty(v)? };
    match out {
        Some(path) => {
            tokio::fs::write(path, text.as_bytes()).await?;
            println!("Saved {} ({} bytes)", path.display(), text.len());
        }
        None => println!("{}", text),
    }
    Ok(())
}
