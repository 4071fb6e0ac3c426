use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use hsmdump::attr::AttributeView;
use hsmdump::config::Config;

#[derive(Parser)]
#[command(name = "hsmdump", version, about = "Inspect how DMF dual-residency files are dumped")]
struct Cli {
    /// Configuration file (defaults to ./hsmdump.* if present)
    #[arg(long, env = "HSMDUMP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a raw SGI_DMI_DMFATTR value
    Decode {
        /// Value as a hex string
        #[arg(long, conflicts_with = "file")]
        hex: Option<String>,

        /// File holding the raw value
        file: Option<PathBuf>,

        /// Also show the offline replacement for a file of this size
        #[arg(long)]
        size: Option<i64>,
    },

    /// Run the dump-time HSM calls against files on a mounted XFS filesystem
    #[cfg(target_os = "linux")]
    Check {
        /// Mount point of the filesystem
        mount: PathBuf,

        /// Files to check
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.validate()?;
    init_logging(&config);

    match cli.command {
        Command::Decode { hex, file, size } => decode(hex, file, size),
        #[cfg(target_os = "linux")]
        Command::Check { mount, paths } => check::run(&config, &mount, &paths),
    }
}

fn read_value(hex: Option<String>, file: Option<PathBuf>) -> Result<Vec<u8>> {
    match (hex, file) {
        (Some(hex), _) => hex::decode(hex.trim()).context("Invalid hex value"),
        (None, Some(path)) => read_file(&path),
        (None, None) => bail!("Either --hex or a file must be given"),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn decode(hex: Option<String>, file: Option<PathBuf>, size: Option<i64>) -> Result<()> {
    let raw = read_value(hex, file)?;
    let view = AttributeView::decode(&raw)?;

    let mut report = json!({ "length": raw.len(), "attribute": view });
    if let Some(size) = size {
        let replacement = view.offline_replacement(size);
        report["replacement"] = json!({
            "attribute": replacement,
            "hex": hex::encode(replacement.encode()),
        });
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(target_os = "linux")]
mod check {
    use std::os::unix::fs::MetadataExt;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use serde_json::{Value, json};
    use tracing::warn;

    use hsmdump::attr::DMF_ATTR_NAME;
    use hsmdump::config::Config;
    use hsmdump::hsm::{
        AttrNamespace, Classification, FileContext, FilesystemContext, Getbmapx, btobb,
    };
    use hsmdump::xfs::XfsBackend;

    pub fn run(config: &Config, mount: &Path, paths: &[PathBuf]) -> Result<()> {
        let backend = Arc::new(XfsBackend::open(mount)?);
        let fs = FilesystemContext::init(mount, config.hsm.api_version, backend.clone())?;
        let mut file = fs.allocate_file_context();

        for path in paths {
            let ino = std::fs::symlink_metadata(path)
                .with_context(|| format!("Failed to stat {}", path.display()))?
                .ino();
            let stat = backend.bulkstat_single(ino)?;
            let report = report(&fs, &mut file, path, stat);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Ok(())
    }

    fn report(
        fs: &FilesystemContext,
        file: &mut FileContext,
        path: &Path,
        mut stat: hsmdump::hsm::Bstat,
    ) -> Value {
        let classification = match file.classify(&stat) {
            Classification::Candidate { .. } => "candidate".to_string(),
            Classification::Rejected(reason) => reason.to_string(),
        };

        let space = fs.estimate_file_space(&stat);
        let offset = fs.estimate_file_offset(&stat, 0);

        let dmevmask_before = stat.dmevmask;
        file.project_metadata(&mut stat);

        let filter = match file.filter_existing_attribute(
            DMF_ATTR_NAME,
            file.raw_attr().len() as u32,
            AttrNamespace::Root,
        ) {
            Ok(filter) => format!("{:?}", filter),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "attributes would not be dumped");
                err.to_string()
            }
        };
        let replacement = file
            .add_new_attribute(0, AttrNamespace::Root)
            .map(|attr| hex::encode(attr.value));

        let mut map = [Getbmapx::header(2, 1), Getbmapx::new(0, 0, btobb(stat.size))];
        let extents = match file.project_extents(&mut map) {
            Ok(()) => json!({ "entries": map[0].entries, "extent": map[1] }),
            Err(err) => json!(err.to_string()),
        };

        json!({
            "path": path,
            "ino": stat.ino,
            "size": stat.size,
            "classification": classification,
            "space_estimate": space,
            "offset_estimate": offset,
            "dmevmask": { "before": dmevmask_before, "after": stat.dmevmask },
            "dmf_attribute": filter,
            "replacement": replacement,
            "extents": extents,
        })
    }
}
