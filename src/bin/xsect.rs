use anyhow::{bail, Context};
use xsect::{ConfigOverrides, Engine, EngineConfig, OutputMode, Profile};

fn parse_arg(flag: &str) -> Option<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|arg| arg == flag)
}

fn parse_profile(value: Option<String>) -> anyhow::Result<Option<Profile>> {
    Ok(match value.as_deref() {
        None => None,
        Some("balanced") => Some(Profile::Balanced),
        Some("high-throughput") => Some(Profile::HighThroughput),
        Some("memory-saver") => Some(Profile::MemorySaver),
        Some("huge-inputs") => Some(Profile::HugeInputs),
        Some(other) => bail!("unknown profile: {other}"),
    })
}

fn parse_mode(value: Option<String>) -> anyhow::Result<Option<OutputMode>> {
    Ok(match value.as_deref() {
        None => None,
        Some("single-file") => Some(OutputMode::SingleFile),
        Some("sharded") => Some(OutputMode::Sharded),
        Some(other) => bail!("unknown output mode: {other}"),
    })
}

const USAGE: &str = "Usage: xsect --left <path> --right <path> --out <path> \
    [--root <dir>] [--config <xsect.toml>] [--profile <name>] \
    [--partitions <n>] [--chunk-size <bytes>] [--mode single-file|sharded] \
    [--scratch-dir <dir>] [--json]";

fn main() -> anyhow::Result<()> {
    if has_flag("--help") || has_flag("-h") {
        println!("{USAGE}");
        return Ok(());
    }

    tracing_subscriber::fmt::init();

    let left = parse_arg("--left").with_context(|| USAGE)?;
    let right = parse_arg("--right").with_context(|| USAGE)?;
    let output = parse_arg("--out").with_context(|| USAGE)?;
    let root = parse_arg("--root").unwrap_or_else(|| ".".to_string());

    let overrides = ConfigOverrides {
        profile: parse_profile(parse_arg("--profile"))?,
        partition_count: parse_arg("--partitions")
            .map(|v| v.parse().context("--partitions expects an integer"))
            .transpose()?,
        chunk_size: parse_arg("--chunk-size")
            .map(|v| v.parse().context("--chunk-size expects a byte count"))
            .transpose()?,
        output_mode: parse_mode(parse_arg("--mode"))?,
        max_partition_values: parse_arg("--max-partition-values")
            .map(|v| v.parse().context("--max-partition-values expects an integer"))
            .transpose()?,
        max_repartition_depth: None,
        scratch_dir: parse_arg("--scratch-dir"),
    };

    let config = EngineConfig::load(parse_arg("--config").as_deref(), overrides)?;
    let engine = Engine::local(root, config)?;
    let report = engine.intersect(&left, &right, &output)?;

    if has_flag("--json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} common values ({} bytes) across {} partitions -> {}",
            report.records,
            report.bytes,
            report.partition_count,
            report.artifact_paths.join(", ")
        );
    }
    Ok(())
}
