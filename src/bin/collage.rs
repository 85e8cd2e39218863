use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "collage", version)]
struct Cli {
    /// Log debug events to stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flatten a collage into a PNG.
    Render(RenderArgs),
    /// Transform a single leaf layer into a PNG.
    Preview(PreviewArgs),
    /// Check a collage file for structural errors.
    Validate(ValidateArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input collage JSON; leaf blob handles are paths relative to it.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Worker threads for leaf transforms (default: one per core).
    #[arg(long)]
    threads: Option<usize>,

    /// Transform leaves on the calling thread.
    #[arg(long)]
    sequential: bool,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Input collage JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Leaf layer id.
    #[arg(long)]
    layer: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input collage JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Preview(args) => cmd_preview(args),
        Command::Validate(args) => cmd_validate(args),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn read_collage_json(path: &Path) -> anyhow::Result<collage::Collage> {
    let f = File::open(path).with_context(|| format!("open collage '{}'", path.display()))?;
    let r = BufReader::new(f);
    let mut c: collage::Collage =
        serde_json::from_reader(r).with_context(|| "parse collage JSON")?;
    c.normalize();
    c.validate()?;
    Ok(c)
}

fn blob_root(in_path: &Path) -> collage::DirBlobStore {
    collage::DirBlobStore::new(in_path.parent().unwrap_or_else(|| Path::new(".")))
}

fn write_png(out: &Path, raster: &collage::Raster) -> anyhow::Result<Vec<u8>> {
    let png = collage::encode_png(raster)?;
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(out, &png).with_context(|| format!("write png '{}'", out.display()))?;
    Ok(png)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let c = read_collage_json(&args.in_path)?;
    let blobs = blob_root(&args.in_path);
    let compositor = collage::Compositor::new(collage::CompositorOpts {
        parallel: !args.sequential,
        threads: args.threads,
        ..collage::CompositorOpts::default()
    })?;

    let outcome = compositor.render_collage(&c, &blobs, &collage::CancelFlag::new())?;
    for failure in &outcome.skipped {
        eprintln!("skipped {}: {}", failure.layer, failure.error);
    }

    let png = write_png(&args.out, &outcome.raster)?;
    eprintln!(
        "wrote {} ({}x{}, {} layers painted)",
        args.out.display(),
        outcome.raster.width,
        outcome.raster.height,
        outcome.painted
    );
    println!("sha256 {}", collage::sha256_hex(&png));
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let c = read_collage_json(&args.in_path)?;
    let blobs = blob_root(&args.in_path);
    let id = collage::LayerId(args.layer);
    let leaf = c
        .layer(id)?
        .as_leaf()
        .ok_or(collage::CollageError::UnsupportedForGroup(id))?;
    let raster = leaf.transformed(&blobs)?;
    write_png(&args.out, &raster)?;
    eprintln!(
        "wrote {} ({}x{})",
        args.out.display(),
        raster.width,
        raster.height
    );
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let c = read_collage_json(&args.in_path)?;
    println!(
        "ok: {} '{}' {}x{} [{}], {} layers, {} leaves",
        c.id,
        c.name,
        c.canvas.width,
        c.canvas.height,
        c.status,
        c.layer_ids().len(),
        c.leaves().len()
    );
    Ok(())
}
