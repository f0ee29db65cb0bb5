//! # Record Worker
//!
//! Attaches to a record view described by a JSON [`SegmentHandle`] and fills
//! a range of its records with `index * scale`. The layout must be a single
//! numeric field. Used by the cross-process tests and the demo.

use clap::Parser;
use common::config::ConfigLoader;
use shm_records::{
    FieldKind, FieldValue, LogLevel, Record, RecordView, SegmentHandle, ShmConfig, ShmError,
    init_tracing,
};
use std::path::PathBuf;
use std::process;
use tracing::{debug, error, info};

/// Writes scaled indices into a shared record view
#[derive(Parser, Debug)]
#[command(name = "record_worker")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Fill a range of shared records with index * scale")]
struct Args {
    /// Segment handle as JSON ({"name", "length", "layout"}).
    #[arg(long, value_name = "JSON")]
    handle: String,

    /// First record index to write.
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// One past the last record index to write (default: view length).
    #[arg(long)]
    end: Option<usize>,

    /// Multiplier applied to each index.
    #[arg(long, default_value_t = 2)]
    scale: i64,

    /// TOML file with shm settings (shm_dir, name_prefix, file_mode, ...).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Shared memory directory, overriding the config file
    /// (default: $SHM_RECORDS_DIR or /dev/shm).
    #[arg(long, value_name = "DIR")]
    shm_dir: Option<PathBuf>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogLevel::Error, args.json);
            error!("record_worker config: {e}");
            process::exit(1);
        }
    };

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.log_level
    };
    init_tracing(level, args.json);

    if let Err(e) = run(&args, &config) {
        error!("record_worker failed: {e}");
        process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<ShmConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ShmConfig::load(path)?,
        None => ShmConfig {
            log_level: LogLevel::Warn,
            ..ShmConfig::from_env()
        },
    };
    if let Some(dir) = &args.shm_dir {
        config.shm_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run(args: &Args, config: &ShmConfig) -> Result<(), ShmError> {
    let handle = SegmentHandle::from_json(&args.handle)?;

    let kind = single_numeric_field(&handle)?;
    let mut view = RecordView::attach_handle_in(config, &handle)?;
    let end = args.end.unwrap_or(view.len());
    info!(
        "Worker pid {} writing records {}..{} of {}",
        process::id(),
        args.start,
        end,
        view.name()
    );

    let written = fill(&mut view, kind, args.start..end, args.scale);
    // Always detach, even when a write failed part way.
    let detached = view.teardown();
    written?;
    detached?;

    debug!("Worker pid {} done", process::id());
    Ok(())
}

fn fill(
    view: &mut RecordView,
    kind: FieldKind,
    records: std::ops::Range<usize>,
    scale: i64,
) -> Result<(), ShmError> {
    for index in records {
        let scaled = (index as i64).wrapping_mul(scale);
        view.set_at(index, &Record::single(scaled_value(kind, scaled)))?;
    }
    Ok(())
}

fn single_numeric_field(handle: &SegmentHandle) -> Result<FieldKind, ShmError> {
    match handle.layout.fields() {
        [
            kind @ (FieldKind::I8
            | FieldKind::U8
            | FieldKind::I16
            | FieldKind::U16
            | FieldKind::I32
            | FieldKind::U32
            | FieldKind::I64
            | FieldKind::U64
            | FieldKind::F32
            | FieldKind::F64),
        ] => Ok(*kind),
        _ => Err(ShmError::InvalidLayout {
            reason: format!(
                "worker needs a single numeric field, got '{}'",
                handle.layout.format()
            ),
        }),
    }
}

/// Truncating conversion into the field's type
fn scaled_value(kind: FieldKind, value: i64) -> FieldValue {
    match kind {
        FieldKind::I8 => FieldValue::I8(value as i8),
        FieldKind::U8 => FieldValue::U8(value as u8),
        FieldKind::I16 => FieldValue::I16(value as i16),
        FieldKind::U16 => FieldValue::U16(value as u16),
        FieldKind::I32 => FieldValue::I32(value as i32),
        FieldKind::U32 => FieldValue::U32(value as u32),
        FieldKind::U64 => FieldValue::U64(value as u64),
        FieldKind::F32 => FieldValue::F32(value as f32),
        FieldKind::F64 => FieldValue::F64(value as f64),
        _ => FieldValue::I64(value),
    }
}
