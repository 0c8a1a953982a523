use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bert_model::{BertModel, Encoder, EncoderInput, Pooling, Tokenizer, embedding};
use bert_weights::{
    LoadReport, LoaderConfig, WeightLoader, catalog, config_bert, load_from_file, load_hf_config, model_source,
};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{error, info, warn};

fn model_arg() -> Arg {
    Arg::new("MODEL")
        .help("Pretrained model name, see `bert list`")
        .required(true)
        .index(1)
}

fn list_subcommand() -> Command {
    Command::new("list").about("List the pretrained models in the catalog")
}

fn config_subcommand() -> Command {
    Command::new("config")
        .about("Print the configuration of a pretrained model as JSON")
        .arg(model_arg())
}

fn fetch_subcommand() -> Command {
    Command::new("fetch")
        .about("Download a model's checkpoint and vocabulary into the cache")
        .arg(model_arg())
}

fn inspect_subcommand() -> Command {
    Command::new("inspect")
        .about("Load a model with pretrained weights and report how the checkpoint matched")
        .arg(model_arg().required(false).required_unless_present("config"))
        .arg(
            Arg::new("checkpoint")
                .short('c')
                .long("checkpoint")
                .value_name("FILE")
                .help("Local safetensors checkpoint to load instead of the cached download"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("HuggingFace config.json describing a checkpoint outside the catalog")
                .requires("checkpoint"),
        )
}

fn similarity_subcommand() -> Command {
    Command::new("similarity")
        .about("Embed two or three texts with a shared encoder and compare them")
        .arg(model_arg())
        .arg(
            Arg::new("TEXT")
                .help("Anchor and positive text, optionally followed by a negative text")
                .required(true)
                .num_args(2..=3)
                .index(2),
        )
        .arg(
            Arg::new("vocab")
                .short('v')
                .long("vocab")
                .value_name("FILE")
                .help("WordPiece vocabulary file, (default) = the model's cached vocab.txt"),
        )
        .arg(
            Arg::new("checkpoint")
                .short('c')
                .long("checkpoint")
                .value_name("FILE")
                .help("Local safetensors checkpoint to load instead of the cached download"),
        )
        .arg(
            Arg::new("tokens")
                .short('n')
                .long("tokens")
                .value_name("INT")
                .help("Sequence length after padding/truncation, default 64")
                .default_value("64")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("margin")
                .short('m')
                .long("margin")
                .value_name("FLOAT")
                .help("Triplet loss margin, default 1.0")
                .default_value("1.0")
                .value_parser(clap::value_parser!(f32)),
        )
        .arg(
            Arg::new("pooling")
                .short('p')
                .long("pooling")
                .value_name("STRING")
                .help("Pooling: cls|mean [default: mean]")
                .default_value("mean"),
        )
}

fn loader_config(matches: &ArgMatches) -> LoaderConfig {
    LoaderConfig::builder()
        .cache_dir(matches.get_one::<String>("cache-dir").map(PathBuf::from))
        .offline(Some(matches.get_flag("offline")))
        .build()
}

fn model_name(matches: &ArgMatches) -> Result<&str> {
    matches
        .get_one::<String>("MODEL")
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("MODEL is required"))
}

/// Loads pretrained weights, from a local file when `--checkpoint` is given.
fn load_model(loader: &WeightLoader, name: &str, matches: &ArgMatches) -> Result<(BertModel, LoadReport)> {
    let loaded = match matches.get_one::<String>("checkpoint") {
        Some(path) => load_from_file(Path::new(path), config_bert(name)?)?,
        None => loader.load(name)?,
    };
    Ok((loaded.model, loaded.report))
}

fn run_list_command() -> Result<()> {
    for entry in catalog() {
        let config = &entry.config;
        println!(
            "{:<22} embedding={:<5} layers={:<3} heads={:<3} vocab={}",
            entry.name, config.embedding_size, config.n_layers, config.n_heads, config.vocab_size
        );
    }
    Ok(())
}

fn run_config_command(matches: &ArgMatches) -> Result<()> {
    let config = config_bert(model_name(matches)?)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn run_fetch_command(loader: &WeightLoader, matches: &ArgMatches) -> Result<()> {
    let name = model_name(matches)?;

    let checkpoint = loader.fetch_checkpoint(name)?;
    let vocab = loader.fetch_vocab(name)?;

    println!("{}", checkpoint.display());
    println!("{}", vocab.display());
    Ok(())
}

fn run_inspect_command(loader: &WeightLoader, matches: &ArgMatches) -> Result<()> {
    let (name, model, report) = match matches.get_one::<String>("config") {
        Some(config_path) => {
            let checkpoint = matches
                .get_one::<String>("checkpoint")
                .ok_or_else(|| anyhow::anyhow!("--config requires --checkpoint"))?;
            let loaded = load_from_file(Path::new(checkpoint), load_hf_config(Path::new(config_path))?)?;
            let name = matches.get_one::<String>("MODEL").map_or(checkpoint.as_str(), String::as_str);
            (name, loaded.model, loaded.report)
        }
        None => {
            let name = model_name(matches)?;
            let (model, report) = load_model(loader, name, matches)?;
            (name, model, report)
        }
    };
    let params = model.parameters();

    println!("model:      {name}");
    println!("parameters: {} tensors, {} values", params.len(), params.num_elements());
    println!("loaded:     {}", report.loaded);
    println!("missing:    {}", report.missing_parameters.len());
    println!("unused:     {}", report.unused_checkpoint.len());
    for unused in &report.unused_checkpoint {
        println!("  - {unused}");
    }

    if !report.is_complete() {
        warn!("Checkpoint does not cover every parameter of {name}");
    }
    Ok(())
}

fn run_similarity_command(loader: &WeightLoader, matches: &ArgMatches) -> Result<()> {
    let name = model_name(matches)?;
    let texts = matches
        .get_many::<String>("TEXT")
        .map(|values| values.map(String::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    let n_tokens = matches.get_one::<usize>("tokens").copied().unwrap_or(64);
    let margin = matches.get_one::<f32>("margin").copied().unwrap_or(1.0);
    let pooling = matches
        .get_one::<String>("pooling")
        .map(|value| Pooling::try_from(value.as_str()))
        .transpose()?
        .unwrap_or_default();

    let vocab_path = match matches.get_one::<String>("vocab") {
        Some(path) => PathBuf::from(path),
        None => loader.fetch_vocab(name)?,
    };
    let tokenizer = Tokenizer::from_file(&vocab_path, model_source(name)?.lowercase)?;

    let (model, report) = load_model(loader, name, matches)?;
    if tokenizer.vocab_size() != model.get_config().vocab_size {
        warn!(
            "Vocabulary has {} tokens but {name} expects {}",
            tokenizer.vocab_size(),
            model.get_config().vocab_size
        );
    }
    if !report.is_complete() {
        warn!("Running with {} parameters left at their initial values", report.missing_parameters.len());
    }

    let inputs = texts
        .iter()
        .map(|text| tokenizer.encode(text, n_tokens))
        .collect::<Result<Vec<EncoderInput>>>()
        .context("Failed to tokenize input")?;

    info!("Embedding {} texts with {name} ({pooling:?} pooling)", inputs.len());

    match inputs.as_slice() {
        [anchor, positive] => {
            let a = embedding::embed(&model, anchor, pooling)?;
            let p = embedding::embed(&model, positive, pooling)?;
            println!("cosine similarity: {:.6}", embedding::cosine_similarity(&a, &p));
        }
        [anchor, positive, negative] => {
            let score = embedding::score_triplet(&model, anchor, positive, negative, pooling, margin)?;
            println!("positive similarity: {:.6}", score.positive_similarity);
            println!("negative similarity: {:.6}", score.negative_similarity);
            println!("triplet loss:        {:.6}", score.loss);
        }
        _ => anyhow::bail!("Expected two or three texts, got {}", inputs.len()),
    }

    Ok(())
}

fn execute_commands() -> Result<()> {
    // Initialize logger with clean format (no timestamp/module prefix)
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "{}", record.args())
        })
        .init();

    let matches = Command::new("bert")
        .about("BERT CLI: pretrained encoder weights, embeddings and similarity")
        .arg(
            Arg::new("cache-dir")
                .long("cache-dir")
                .value_name("DIR")
                .help("Checkpoint cache directory, (default) = $BERT_SPINE_CACHE or ~/.cache/bert-spine")
                .global(true),
        )
        .arg(
            Arg::new("offline")
                .long("offline")
                .help("Only use cached files, never download")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(list_subcommand())
        .subcommand(config_subcommand())
        .subcommand(fetch_subcommand())
        .subcommand(inspect_subcommand())
        .subcommand(similarity_subcommand())
        .get_matches();

    let loader = WeightLoader::new(&loader_config(&matches));

    match matches.subcommand() {
        Some(("list", _)) => run_list_command(),
        Some(("config", matches)) => run_config_command(matches),
        Some(("fetch", matches)) => run_fetch_command(&loader, matches),
        Some(("inspect", matches)) => run_inspect_command(&loader, matches),
        Some(("similarity", matches)) => run_similarity_command(&loader, matches),
        _ => anyhow::bail!("No subcommand specified. Use -h to print help information."),
    }
}

fn main() {
    if let Err(e) = execute_commands() {
        error!("Error: {e:#}");
        std::process::exit(1);
    }
}
