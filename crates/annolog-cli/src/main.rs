//! `annolog` command-line tool

use anyhow::{bail, Context, Result};
use annolog_artifact::{DirStore, MediaPath, Run};
use annolog_media::{media_registry, ImageLoader, ImageMeta, ImagePayload, MediaConfig};
use annolog_types::ColumnSchema;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn cli() -> Command {
    Command::new("annolog")
        .version(annolog_media::VERSION)
        .about("Annotated image logging tools")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML media configuration"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("normalize")
                .about("Normalize an image file into a run directory and print its payload")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Image file to normalize"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory backing the run's media store"),
                )
                .arg(
                    Arg::new("key")
                        .long("key")
                        .default_value("images")
                        .help("Column key the image is logged under"),
                )
                .arg(
                    Arg::new("step")
                        .long("step")
                        .default_value("0")
                        .value_parser(value_parser!(u64))
                        .help("Step the image is logged at"),
                )
                .arg(Arg::new("caption").long("caption").help("Caption to attach")),
        )
        .subcommand(
            Command::new("schema")
                .about("Fold the image payloads of a column into one type descriptor")
                .arg(
                    Arg::new("store")
                        .long("store")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory the payloads' media paths resolve against"),
                )
                .arg(
                    Arg::new("payloads")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf))
                        .help("Image payload JSON files, in step order"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<MediaConfig> {
    let Some(path) = path else {
        return Ok(MediaConfig::new());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    MediaConfig::from_toml_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn normalize(
    config: MediaConfig,
    input: &Path,
    out: &Path,
    key: &str,
    step: u64,
    caption: Option<&str>,
) -> Result<Value> {
    let media_dir: MediaPath = config
        .media_root
        .parse()
        .with_context(|| format!("media_root {:?}", config.media_root))?;
    let loader = ImageLoader::new(config)?;
    let meta = caption.map_or_else(ImageMeta::new, |c| ImageMeta::new().with_caption(c));
    let image = loader
        .load_with(input, meta)
        .with_context(|| format!("loading {}", input.display()))?;
    let run = Run::new("local", Arc::new(DirStore::new(out))).with_media_dir(media_dir);
    let payload = image.to_payload(&run.step(key, step))?;
    tracing::info!("logged {} as {}", input.display(), payload.path);
    Ok(serde_json::to_value(payload)?)
}

fn schema(config: MediaConfig, store: &Path, payloads: &[PathBuf]) -> Result<ColumnSchema> {
    let loader = ImageLoader::new(config)?;
    let registry = media_registry()?;
    let store = DirStore::new(store);
    let mut column = ColumnSchema::new("column");

    for (step, path) in (0u64..).zip(payloads) {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let payload: ImagePayload =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        let image = loader
            .reconstruct(&payload, &store)
            .with_context(|| format!("reconstructing {}", path.display()))?;
        column.observe(step, registry.infer(&image)?)?;
    }
    Ok(column)
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches.get_one::<PathBuf>("config"))?;
    match matches.subcommand() {
        Some(("normalize", args)) => {
            let input = args.get_one::<PathBuf>("input").context("missing input")?;
            let out = args.get_one::<PathBuf>("out").context("missing --out")?;
            let key = args.get_one::<String>("key").context("missing --key")?;
            let step = *args.get_one::<u64>("step").context("missing --step")?;
            let caption = args.get_one::<String>("caption").map(String::as_str);
            let payload = normalize(config, input, out, key, step, caption)?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Some(("schema", args)) => {
            let store = args.get_one::<PathBuf>("store").context("missing --store")?;
            let payloads: Vec<PathBuf> = args
                .get_many::<PathBuf>("payloads")
                .context("missing payloads")?
                .cloned()
                .collect();
            let column = schema(config, store, &payloads)?;
            for (step, conflict) in column.conflicts() {
                tracing::warn!("step {step}: {conflict:?}");
            }
            println!("{}", serde_json::to_string_pretty(&column.current().to_json())?);
        }
        _ => bail!("unknown command"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));
    run(&matches)
}
