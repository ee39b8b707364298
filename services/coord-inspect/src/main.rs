//! Coordinate inspector.
//!
//! Resolves the coordinates of a Zarr hierarchy and prints them, or applies
//! label/position selections to one array and prints the resulting storage
//! indices (and optionally the selected data).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use coord_index::{
    ArrayView, CoordinateMap, CoordinateResolver, CoordinateStore, ResolverConfig, Selection,
    TimeAxisRule, ZarrCoordinateStore,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimeRuleArg {
    /// Only the dimension named by --time-dimension
    Named,
    /// Any dimension with CF `<unit> since <reference>` units
    Units,
}

#[derive(Parser, Debug)]
#[command(name = "coord-inspect")]
#[command(about = "Inspect and select coordinates of a Zarr hierarchy")]
struct Args {
    /// Root directory of the Zarr store
    #[arg(env = "COORD_STORE")]
    store: PathBuf,

    /// Group whose arrays are resolved
    #[arg(short, long, default_value = "/")]
    group: String,

    /// Array to select on (resolves only its coordinates)
    #[arg(short, long)]
    array: Option<String>,

    /// Label selection, `dim=value`, `dim=start..stop` or `dim=a,b,c`
    #[arg(long = "sel", value_name = "DIM=EXPR")]
    sel: Vec<String>,

    /// Position selection, same syntax with integer offsets
    #[arg(long = "isel", value_name = "DIM=EXPR")]
    isel: Vec<String>,

    /// Read and print the selected data
    #[arg(long, requires = "array")]
    read: bool,

    /// Which dimensions are decoded as CF time
    #[arg(long, value_enum)]
    time_rule: Option<TimeRuleArg>,

    /// Dimension name for the `named` time rule
    #[arg(long)]
    time_dimension: Option<String>,

    /// Offset east of UTC, in minutes, for zone-less times
    #[arg(long, allow_hyphen_values = true)]
    naive_offset_minutes: Option<i32>,

    /// Maximum concurrent coordinate fetches
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Log level
    #[arg(long, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::from_env();

        match self.time_rule {
            Some(TimeRuleArg::Units) => config.time_rule = TimeAxisRule::CfUnits,
            Some(TimeRuleArg::Named) => config.time_rule = TimeAxisRule::default(),
            None => {}
        }
        if let Some(name) = &self.time_dimension {
            config.time_rule = TimeAxisRule::NamedDimension { name: name.clone() };
        }
        if let Some(minutes) = self.naive_offset_minutes {
            config.naive_time_offset_minutes = minutes;
        }
        if let Some(n) = self.max_concurrent {
            config.max_concurrent_fetches = n;
        }
        config
    }
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Split `dim=expr` into the dimension and its parsed predicate.
fn parse_assignment(raw: &str) -> Result<(String, Selection<String>)> {
    let (dim, expr) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected DIM=EXPR, got '{}'", raw))?;
    let dim = dim.trim();
    if dim.is_empty() {
        bail!("missing dimension name in '{}'", raw);
    }
    Ok((dim.to_string(), expr.parse()?))
}

fn parse_position(raw: &str) -> Result<(String, Selection<usize>)> {
    let (dim, predicate) = parse_assignment(raw)?;
    let predicate = predicate
        .try_map(|s| s.parse::<usize>())
        .with_context(|| format!("positions in '{}' must be non-negative integers", raw))?;
    Ok((dim, predicate))
}

fn summarize_coordinates(coords: &CoordinateMap) -> Result<Value> {
    let mut out = Vec::with_capacity(coords.len());
    for (key, axis) in coords.iter() {
        out.push(json!({
            "key": key,
            "kind": axis.kind(),
            "len": axis.len(),
            "first": axis.val_human(0)?,
            "last": axis.len().checked_sub(1).map(|i| axis.val_human(i)).transpose()?.flatten(),
        }));
    }
    Ok(Value::Array(out))
}

fn summarize_view(view: &ArrayView) -> Result<Value> {
    let mut dims = Vec::new();
    for ((name, axis), zindex) in view.axes().zip(view.zindices()) {
        dims.push(json!({
            "dimension": name,
            "kind": axis.kind(),
            "zindex": zindex.to_string(),
            "values": axis.vals_human()?,
        }));
    }
    Ok(json!({
        "array": view.path(),
        "empty": view.is_empty_selection(),
        "selected": view.selected_len(),
        "dimensions": dims,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args);

    let config = args.resolver_config();
    let store = Arc::new(
        ZarrCoordinateStore::filesystem(&args.store)
            .with_context(|| format!("opening store {}", args.store.display()))?,
    );
    let resolver = CoordinateResolver::new(Arc::clone(&store), config)?;

    let Some(path) = args.array.as_deref() else {
        let coords = resolver.resolve(&args.group).await?;
        info!(group = %args.group, coordinates = coords.len(), "Resolved group");
        println!("{}", serde_json::to_string_pretty(&summarize_coordinates(&coords)?)?);
        return Ok(());
    };

    let descriptor = store
        .describe(path)
        .await?
        .ok_or_else(|| anyhow!("no array at '{}'", path))?;
    let coords = resolver.resolve_array(path).await?;

    let mut view = ArrayView::new(&descriptor, &coords)?;
    for raw in &args.sel {
        let (dim, predicate) = parse_assignment(raw)?;
        view = view.sel(&dim, &predicate)?;
    }
    for raw in &args.isel {
        let (dim, predicate) = parse_position(raw)?;
        view = view.isel(&dim, &predicate)?;
    }

    let mut output = summarize_view(&view)?;
    if args.read {
        let region = store.read_selection(path, &view.zindices()).await?;
        output["data"] = match region {
            Some(region) => json!({
                "shape": region.squeezed_shape(),
                "values": region.data,
            }),
            None => Value::Null,
        };
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
