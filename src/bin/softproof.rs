use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use softproof::profile::{DirectoryFetcher, SOURCE_PROFILE_ID, SyntheticFetcher, deprecated_ids};
use softproof::{
    BuiltinProfile, ExportOpts, ExportPipeline, ExportRequest, ExportStatus, IccProfile,
    ProfileSource, ProofScheduler, ProofState, RasterSurface, Rect, SchedulerOpts,
};

#[derive(Parser, Debug)]
#[command(name = "softproof", version)]
struct Cli {
    /// Read built-in profiles from this directory instead of generating them.
    #[arg(long, global = true)]
    profiles: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate print on an RGB PNG.
    Proof(ProofArgs),
    /// Separate an RGB PNG for production.
    Export(ExportArgs),
    /// List built-in profiles, optionally writing them to disk.
    Catalog(CatalogArgs),
    /// Describe an ICC profile.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct ProofArgs {
    /// Input PNG.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Output profile id (built-in or retired id).
    #[arg(long, default_value = "offset-standard")]
    profile: String,

    /// Use this ICC file as the output profile instead.
    #[arg(long)]
    profile_file: Option<PathBuf>,

    /// Highlight out-of-gamut pixels.
    #[arg(long, default_value_t = false)]
    gamut_warning: bool,

    /// Longest side of the raster handed to the engine.
    #[arg(long, default_value_t = 1024)]
    max_dim: u32,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input PNG.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Physical document width in millimetres.
    #[arg(long)]
    width_mm: f64,

    /// Physical document height in millimetres.
    #[arg(long)]
    height_mm: f64,

    /// Output profile id.
    #[arg(long, default_value = "offset-standard")]
    profile: String,

    /// Crop `x0,y0,x1,y1` in input pixels.
    #[arg(long, value_parser = parse_rect)]
    crop: Option<Rect>,

    /// Raw interleaved device bytes.
    #[arg(long)]
    out: PathBuf,

    /// Proofed preview PNG.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Neither output side exceeds this.
    #[arg(long, default_value_t = 8000)]
    max_pixel_dim: u32,
}

#[derive(Parser, Debug)]
struct CatalogArgs {
    /// Write every built-in profile into this directory.
    #[arg(long)]
    write: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// ICC file, or a built-in profile id.
    target: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let source = match &cli.profiles {
        Some(dir) => ProfileSource::new(DirectoryFetcher::new(dir)),
        None => ProfileSource::new(SyntheticFetcher::new()),
    };
    match cli.cmd {
        Command::Proof(args) => cmd_proof(args, source),
        Command::Export(args) => cmd_export(args, source),
        Command::Catalog(args) => cmd_catalog(args),
        Command::Inspect(args) => cmd_inspect(args, &source),
    }
}

fn cmd_proof(args: ProofArgs, source: ProfileSource) -> anyhow::Result<()> {
    let raster = read_png(&args.in_path)?;
    // One surface unit per input pixel; the physical size does not matter for previews.
    let (w, h) = raster.dimensions();
    let surface = RasterSurface::document(raster, f64::from(w), f64::from(h));

    let opts = SchedulerOpts {
        preview_max_dim: args.max_dim,
        ..SchedulerOpts::default()
    };
    let timeout = opts.request_timeout * 2;
    let mut sched = ProofScheduler::spawn(source, opts)?;
    if let Some(path) = &args.profile_file {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read profile '{}'", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".to_string());
        sched.set_custom_profile("custom", name, bytes);
        sched.set_output_profile("custom");
    } else {
        sched.set_output_profile(softproof::profile::migrate_deprecated(&args.profile));
    }
    sched.set_show_gamut_warning(args.gamut_warning, Instant::now());
    sched.set_enabled(true);

    let started = Instant::now();
    loop {
        let report = sched.poll(Instant::now(), &surface);
        if report.applied.is_some() {
            break;
        }
        if sched.state() == ProofState::Error {
            anyhow::bail!(
                "proof failed: {}",
                sched.last_error().unwrap_or("unknown error")
            );
        }
        if started.elapsed() > timeout {
            anyhow::bail!("proof did not complete within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    let pixels = sched
        .overlay()
        .pixels()
        .context("overlay is empty after a result was applied")?;
    write_png(&args.out, pixels)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs, source: ProfileSource) -> anyhow::Result<()> {
    let raster = read_png(&args.in_path)?;
    let surface = RasterSurface::document(raster, args.width_mm, args.height_mm);
    let opts = ExportOpts {
        max_pixel_dim: args.max_pixel_dim,
        ..ExportOpts::default()
    };
    let mut pipeline = ExportPipeline::spawn(source, opts)?;

    let mut req = ExportRequest::new(
        SOURCE_PROFILE_ID,
        softproof::profile::migrate_deprecated(&args.profile),
    );
    if let Some(crop) = args.crop {
        req = req.with_crop(crop);
    }
    let job = pipeline.export_separated(&surface, &req)?;
    let resolution = job.resolution();
    let out = pipeline.wait(job)?;

    if let ExportStatus::Degraded { role, reason } = &out.status {
        eprintln!("warning: {role} profile unavailable ({reason}); output is NOT color managed");
    }
    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &out.separated)
        .with_context(|| format!("write separation '{}'", args.out.display()))?;
    if let Some(path) = &args.preview {
        write_png(path, &out.proofed_preview)?;
    }

    eprintln!(
        "wrote {} ({}x{}, {} channels, {} dpi)",
        args.out.display(),
        out.width,
        out.height,
        out.channels,
        resolution.dpi
    );
    Ok(())
}

fn cmd_catalog(args: CatalogArgs) -> anyhow::Result<()> {
    for p in BuiltinProfile::ALL {
        let bytes = p.synthesize();
        println!(
            "{:<16} {:016x}  {}",
            p.id(),
            softproof::icc::fingerprint(&bytes),
            p.label()
        );
    }
    for (old, new) in deprecated_ids() {
        println!("{old:<16} -> {new}");
    }
    if let Some(dir) = args.write {
        let written = DirectoryFetcher::new(&dir)
            .populate()
            .with_context(|| format!("write catalog to '{}'", dir.display()))?;
        eprintln!("wrote {} profiles to {}", written.len(), dir.display());
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs, source: &ProfileSource) -> anyhow::Result<()> {
    let path = Path::new(&args.target);
    let bytes = if path.is_file() {
        std::fs::read(path).with_context(|| format!("read profile '{}'", path.display()))?
    } else {
        source.resolve(&args.target)?.to_engine_bytes()
    };
    let profile = IccProfile::parse(&bytes)
        .with_context(|| format!("parse profile '{}'", args.target))?;

    let h = &profile.header;
    let (major, minor) = h.version_pair();
    println!("description: {}", profile.description().unwrap_or("-"));
    println!("version:     {major}.{minor}");
    println!("class:       {:?}", h.class);
    println!("color space: {:?}", h.color_space);
    println!("pcs:         {:?}", h.pcs);
    println!("fingerprint: {:016x}", softproof::icc::fingerprint(&bytes));
    let w = profile.media_white();
    println!("white:       {:.4} {:.4} {:.4}", w[0], w[1], w[2]);
    let tags: Vec<String> = profile.tag_signatures().map(|s| s.to_string()).collect();
    println!("tags:        {}", tags.join(" "));
    Ok(())
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let v: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{p}': {e}")))
        .collect::<Result<_, _>>()?;
    match v.as_slice() {
        [x0, y0, x1, y1] => Ok(Rect::new(*x0, *y0, *x1, *y1)),
        _ => Err("expected x0,y0,x1,y1".to_string()),
    }
}

fn read_png(path: &Path) -> anyhow::Result<image::RgbaImage> {
    Ok(image::open(path)
        .with_context(|| format!("read image '{}'", path.display()))?
        .to_rgba8())
}

fn write_png(path: &Path, img: &image::RgbaImage) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    img.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", path.display()))
}
