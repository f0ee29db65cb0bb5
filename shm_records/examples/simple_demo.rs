//! Share a list of floats with child processes that each increment a slice.
//!
//! Run with `cargo run --example simple_demo`. The parent re-executes itself
//! with `--child <handle-json> <start> <end>` for every worker.

use shm_records::{RecordView, Scalar, SegmentHandle, ShmResult, init_tracing};
use std::process::Command;

const VALUES: usize = 9;
const WORKERS: usize = 3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(shm_records::LogLevel::Info, false);

    let args: Vec<String> = std::env::args().collect();
    if args.len() == 5 && args[1] == "--child" {
        let start = args[3].parse()?;
        let end = args[4].parse()?;
        child(&args[2], start, end)?;
        return Ok(());
    }

    let mut view = RecordView::create(VALUES, Scalar::<f64>::new())?;
    for i in 0..VALUES {
        view.set_at(i, &(1.1 * i as f64))?;
    }
    println!("before: {:?}", snapshot(&view)?);

    let handle = view.export_handle()?.to_json()?;
    let exe = std::env::current_exe()?;
    let children = (0..WORKERS)
        .map(|worker| {
            let start = VALUES * worker / WORKERS;
            let end = VALUES * (worker + 1) / WORKERS;
            Command::new(&exe)
                .args(["--child", &handle, &start.to_string(), &end.to_string()])
                .spawn()
        })
        .collect::<Result<Vec<_>, _>>()?;

    for mut child in children {
        let status = child.wait()?;
        if !status.success() {
            eprintln!("worker exited with {status}");
        }
    }

    println!("after:  {:?}", snapshot(&view)?);
    view.teardown()?;
    Ok(())
}

fn child(handle: &str, start: usize, end: usize) -> ShmResult<()> {
    let handle = SegmentHandle::from_json(handle)?;
    let mut view = RecordView::attach_handle_with(
        &shm_records::ShmConfig::from_env(),
        &handle,
        Scalar::<f64>::new(),
    )?;

    // Zero-copy: increment in place through a borrowed byte range.
    {
        let mut bytes = view.borrow_mut(start..end)?;
        for chunk in bytes.chunks_exact_mut(8) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            let value = f64::from_ne_bytes(raw) + 1.0;
            chunk.copy_from_slice(&value.to_ne_bytes());
        }
    }

    view.teardown()
}

fn snapshot(view: &RecordView<Scalar<f64>>) -> ShmResult<Vec<f64>> {
    view.iter()?.map(|entry| entry.map(|(_, value)| value)).collect()
}
