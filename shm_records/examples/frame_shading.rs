//! Shade a small frame buffer from a normal map, one row band per thread.
//!
//! Shows a user-defined [`RecordCodec`] (`RgbCodec`) next to a parsed
//! layout (`"ddd"` normals). Every shading thread attaches its own view of
//! the frame through the exported handle. Run with
//! `cargo run --example frame_shading`.

use shm_records::{
    ByteOrder, FieldKind, RecordCodec, RecordLayout, RecordView, SegmentHandle, ShmConfig,
    ShmError, ShmResult, init_tracing,
};

const WIDTH: usize = 32;
const HEIGHT: usize = 12;
const BANDS: usize = 4;

/// One pixel, three unsigned bytes
#[derive(Debug, Clone, Copy, PartialEq)]
struct Rgb([u8; 3]);

struct RgbCodec;

impl RecordCodec for RgbCodec {
    type Value = Rgb;

    fn layout(&self) -> RecordLayout {
        RecordLayout::new(ByteOrder::Native, vec![FieldKind::U8; 3]).expect("three byte fields")
    }

    fn byte_width(&self) -> usize {
        3
    }

    fn pack(&self, value: &Rgb, dst: &mut [u8]) -> ShmResult<()> {
        if dst.len() != 3 {
            return Err(ShmError::InvalidSize { size: dst.len() });
        }
        dst.copy_from_slice(&value.0);
        Ok(())
    }

    fn unpack(&self, src: &[u8]) -> ShmResult<Rgb> {
        let bytes: [u8; 3] = src
            .try_into()
            .map_err(|_| ShmError::InvalidSize { size: src.len() })?;
        Ok(Rgb(bytes))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(shm_records::LogLevel::Warn, false);

    let mut normals = RecordView::create(WIDTH * HEIGHT, RecordLayout::parse("ddd")?)?;
    for y in 0..HEIGHT {
        let tilt = std::f64::consts::FRAC_PI_2 + (y as f64 - HEIGHT as f64 / 2.0) * 0.1;
        for x in 0..WIDTH {
            let angle = x as f64 * std::f64::consts::PI / 20.0;
            let normal = [
                angle.cos() * tilt.cos(),
                angle.sin() * tilt.cos(),
                -tilt.sin().abs(),
            ];
            normals.set_at(y * WIDTH + x, &normal.into_iter().map(Into::into).collect())?;
        }
    }

    let mut frame = RecordView::create(WIDTH * HEIGHT, RgbCodec)?;
    let handle = frame.export_handle()?;
    std::thread::scope(|s| -> ShmResult<()> {
        let workers: Vec<_> = (0..BANDS)
            .map(|band| {
                let (normals, handle) = (&normals, &handle);
                s.spawn(move || shade_rows(normals, handle, band))
            })
            .collect();
        for worker in workers {
            worker.join().expect("shading thread panicked")?;
        }
        Ok(())
    })?;

    print!("{}", render(&frame)?);
    frame.teardown()?;
    normals.teardown()?;
    Ok(())
}

fn shade_rows(normals: &RecordView, handle: &SegmentHandle, band: usize) -> ShmResult<()> {
    let mut frame = RecordView::attach_handle_with(&ShmConfig::from_env(), handle, RgbCodec)?;
    let light = [0.3f64, 0.5, -0.8];
    for y in HEIGHT * band / BANDS..HEIGHT * (band + 1) / BANDS {
        for x in 0..WIDTH {
            let index = y * WIDTH + x;
            let normal = normals.get_at(index)?;
            let components: Vec<f64> = normal
                .values()
                .iter()
                .filter_map(|value| value.as_f64())
                .collect();
            let intensity: f64 = components.iter().zip(light).map(|(n, l)| n * l).sum();
            let level = (intensity.clamp(0.0, 1.0) * 255.0) as u8;
            frame.set_at(index, &Rgb([level, level / 2, 255 - level]))?;
        }
    }
    frame.teardown()
}

fn render(frame: &RecordView<RgbCodec>) -> ShmResult<String> {
    let mut out = String::new();
    for entry in frame.iter()? {
        let (index, Rgb([r, g, b])) = entry?;
        out.push_str(&format!("\x1b[48;2;{r};{g};{b}m  "));
        if index % WIDTH == WIDTH - 1 {
            out.push_str("\x1b[0m\n");
        }
    }
    Ok(out)
}
