//! Fixed big-endian layout of a trajectory file.
//!
//! ```text
//! header (72 bytes)
//!   i32 particle_count_left   i32 particle_count_right
//!   f32 initial_speed  f32 speed_loss
//!   f32 speed_delta_top  f32 speed_delta_sides  f32 speed_delta_bottom
//!   f32 g  f32 box_width  f32 box_height
//!   f32 barrier_pos_x  f32 barrier_width  f32 hole_pos_y  f32 hole_height
//!   f32 particle_radius
//!   i32 fps  i32 duration (minutes)  i32 seed
//! frame (particle_count * 36 + 8 bytes), repeated
//!   i64 time (microseconds)
//!   per particle: i32 id, f64 x, f64 y, f64 vx, f64 vy
//! ```

use std::io::Write;
use std::sync::Arc;

use crate::core::{ExperimentSettings, ExperimentState, Particle};
use crate::error::{Error, Result};

/// Size of the settings header in bytes.
pub const HEADER_SIZE: u64 = 72;
/// Size of the per-frame time stamp in bytes.
pub const TIME_SIZE: u64 = 8;
/// Size of one serialized particle in bytes.
pub const PARTICLE_SIZE: u64 = 36;

/// Byte length of one frame for `particle_count` particles.
#[inline]
pub fn chunk_size(particle_count: usize) -> u64 {
    particle_count as u64 * PARTICLE_SIZE + TIME_SIZE
}

/// Byte offset of frame `index`.
#[inline]
pub fn frame_offset(index: u64, chunk_size: u64) -> u64 {
    HEADER_SIZE + index * chunk_size
}

/// Number of whole frames in a file of `file_len` bytes.
#[inline]
pub fn frame_count(file_len: u64, chunk_size: u64) -> u64 {
    file_len.saturating_sub(HEADER_SIZE) / chunk_size
}

fn to_i32(name: &str, v: u32) -> Result<i32> {
    i32::try_from(v).map_err(|_| Error::InvalidParam(format!("{name} does not fit in i32")))
}

/// Serialize the settings header.
pub fn write_header<W: Write>(w: &mut W, s: &ExperimentSettings) -> Result<()> {
    let mut buf = Vec::with_capacity(HEADER_SIZE as usize);
    buf.extend_from_slice(&to_i32("particle_count_left", s.particle_count_left())?.to_be_bytes());
    buf.extend_from_slice(&to_i32("particle_count_right", s.particle_count_right())?.to_be_bytes());
    for v in [
        s.initial_speed(),
        s.speed_loss(),
        s.speed_delta_top(),
        s.speed_delta_sides(),
        s.speed_delta_bottom(),
        s.g(),
        s.box_width(),
        s.box_height(),
        s.barrier_pos_x(),
        s.barrier_width(),
        s.hole_pos_y(),
        s.hole_height(),
        s.particle_radius(),
    ] {
        buf.extend_from_slice(&v.to_be_bytes());
    }
    buf.extend_from_slice(&to_i32("fps", s.fps())?.to_be_bytes());
    buf.extend_from_slice(&to_i32("duration", s.duration())?.to_be_bytes());
    buf.extend_from_slice(&s.seed().to_be_bytes());
    debug_assert_eq!(buf.len() as u64, HEADER_SIZE);
    w.write_all(&buf)?;
    Ok(())
}

/// Serialize one frame.
pub fn write_frame<W: Write>(w: &mut W, state: &ExperimentState) -> Result<()> {
    let mut buf = Vec::with_capacity(chunk_size(state.particles().len()) as usize);
    let time = i64::try_from(state.time())
        .map_err(|_| Error::Format(format!("time {} overflows i64", state.time())))?;
    buf.extend_from_slice(&time.to_be_bytes());
    for p in state.particles() {
        buf.extend_from_slice(&p.id.to_be_bytes());
        for c in p.r.iter().chain(p.v.iter()) {
            buf.extend_from_slice(&c.to_be_bytes());
        }
    }
    w.write_all(&buf)?;
    Ok(())
}

/// Parse the 72-byte settings header.
///
/// Errors:
/// - `Error::Format` for a short buffer or negative counts, rates or durations.
pub fn read_header(bytes: &[u8]) -> Result<ExperimentSettings> {
    if (bytes.len() as u64) < HEADER_SIZE {
        return Err(Error::Format(format!(
            "header needs {HEADER_SIZE} bytes, got {}",
            bytes.len()
        )));
    }
    let mut cur = BeCursor::new(bytes);
    let left = non_negative("particle_count_left", cur.i32())?;
    let right = non_negative("particle_count_right", cur.i32())?;
    let initial_speed = cur.f32();
    let speed_loss = cur.f32();
    let delta_top = cur.f32();
    let delta_sides = cur.f32();
    let delta_bottom = cur.f32();
    let g = cur.f32();
    let box_width = cur.f32();
    let box_height = cur.f32();
    let barrier_pos_x = cur.f32();
    let barrier_width = cur.f32();
    let hole_pos_y = cur.f32();
    let hole_height = cur.f32();
    let particle_radius = cur.f32();
    let fps = non_negative("fps", cur.i32())?;
    let duration = non_negative("duration", cur.i32())?;
    let seed = cur.i32();

    Ok(ExperimentSettings::builder()
        .particle_count(left, right)
        .initial_speed(initial_speed)
        .speed_loss(speed_loss)
        .speed_delta(delta_top, delta_sides, delta_bottom)
        .g(g)
        .box_size(box_width, box_height)
        .barrier(barrier_pos_x, barrier_width)
        .hole(hole_pos_y, hole_height)
        .particle_radius(particle_radius)
        .fps(fps)
        .duration(duration)
        .seed(seed)
        .build())
}

/// Decode one frame from exactly `chunk_size(settings.particle_count())` bytes.
pub fn read_frame(bytes: &[u8], settings: &Arc<ExperimentSettings>) -> Result<ExperimentState> {
    let n = settings.particle_count();
    if (bytes.len() as u64) < chunk_size(n) {
        return Err(Error::Format(format!(
            "frame needs {} bytes, got {}",
            chunk_size(n),
            bytes.len()
        )));
    }
    let mut cur = BeCursor::new(bytes);
    let time = cur.i64();
    let time = u64::try_from(time)
        .map_err(|_| Error::Format(format!("negative frame time {time}")))?;
    let particles = (0..n)
        .map(|_| {
            let id = cur.i32();
            let r = [cur.f64(), cur.f64()];
            let v = [cur.f64(), cur.f64()];
            Particle::new(id, r, v)
        })
        .collect();
    Ok(ExperimentState::new(time, particles, Arc::clone(settings)))
}

fn non_negative(name: &str, v: i32) -> Result<u32> {
    u32::try_from(v).map_err(|_| Error::Format(format!("{name} is negative ({v})")))
}

/// Big-endian reader over a buffer whose length the caller has already checked.
struct BeCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BeCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn i32(&mut self) -> i32 {
        i32::from_be_bytes(self.take())
    }

    fn i64(&mut self) -> i64 {
        i64::from_be_bytes(self.take())
    }

    fn f32(&mut self) -> f32 {
        f32::from_be_bytes(self.take())
    }

    fn f64(&mut self) -> f64 {
        f64::from_be_bytes(self.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_layout() {
        assert_eq!(chunk_size(100), 3608);
        assert_eq!(chunk_size(0), 8);
        assert_eq!(frame_offset(0, 3608), 72);
        assert_eq!(frame_offset(2, 3608), 72 + 7216);
        assert_eq!(frame_count(72 + 3608 * 5 + 100, 3608), 5);
        assert_eq!(frame_count(10, 3608), 0);
    }

    #[test]
    fn header_is_72_bytes_and_big_endian() -> Result<()> {
        let s = ExperimentSettings::builder().particle_count(1, 2).seed(-1).build();
        let mut buf = Vec::new();
        write_header(&mut buf, &s)?;
        assert_eq!(buf.len(), 72);
        assert_eq!(&buf[0..4], &[0, 0, 0, 1]);
        assert_eq!(&buf[4..8], &[0, 0, 0, 2]);
        assert_eq!(&buf[8..12], &1.0f32.to_be_bytes());
        assert_eq!(&buf[68..72], &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(read_header(&buf)?, s);
        Ok(())
    }

    #[test]
    fn short_or_negative_header_rejected() {
        assert!(matches!(read_header(&[0u8; 10]), Err(Error::Format(_))));
        let mut buf = vec![0u8; 72];
        buf[0..4].copy_from_slice(&(-3i32).to_be_bytes());
        let err = read_header(&buf).unwrap_err();
        assert!(err.to_string().contains("particle_count_left"));
    }

    #[test]
    fn frame_bytes_are_bit_exact() -> Result<()> {
        let settings = Arc::new(ExperimentSettings::builder().particle_count(1, 0).build());
        let p = Particle::new(0, [0.1, f64::MIN_POSITIVE], [-0.0, 1.0 / 3.0]);
        let state = ExperimentState::new(33_333, vec![p], Arc::clone(&settings));
        let mut buf = Vec::new();
        write_frame(&mut buf, &state)?;
        assert_eq!(buf.len() as u64, chunk_size(1));
        let back = read_frame(&buf, &settings)?;
        assert_eq!(back.time(), 33_333);
        let q = back.particles()[0];
        assert_eq!(q.r[1].to_bits(), p.r[1].to_bits());
        assert_eq!(q.v[0].to_bits(), (-0.0f64).to_bits());
        assert_eq!(q.v[1].to_bits(), p.v[1].to_bits());
        Ok(())
    }
}
