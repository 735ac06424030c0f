use std::io::Cursor;

use boxsim::analysis::population_series;
use boxsim::core::{ExperimentSettings, Simulator};
use boxsim::error::Error;
use boxsim::io::{format, open_trajectory, run_simulation, TrajectoryReader, TrajectoryWriter};

fn short_run() -> ExperimentSettings {
    ExperimentSettings::builder()
        .particle_count(12, 8)
        .box_size(10.0, 10.0)
        .barrier(5.0, 1.0)
        .hole(5.0, 2.0)
        .particle_radius(0.25)
        .initial_speed(1.5)
        .g(-4.0)
        .fps(5)
        .duration(1)
        .seed(-99)
        .build()
}

/// A file written to disk decodes back to the settings and the exact sampled states.
#[test]
fn file_round_trip_is_bit_exact() -> boxsim::error::Result<()> {
    let settings = short_run();
    settings.validate()?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("run.bin");

    let summary = run_simulation(settings.clone(), &path)?;
    assert_eq!(summary.frames, 300);

    let mut reader = open_trajectory(&path)?;
    assert_eq!(reader.settings(), &settings);
    assert_eq!(reader.frame_count(), 300);
    assert_eq!(reader.chunk_size(), 8 + 20 * 36);
    let len = std::fs::metadata(&path)?.len();
    assert_eq!(len, format::HEADER_SIZE + 300 * reader.chunk_size());

    // Replay the run in memory and compare each sampled state.
    let sim = Simulator::new(settings.clone());
    let mut state = sim.initial_distribution_seeded()?;
    for index in 0..300 {
        let due = settings.frame_time_us(index);
        while state.time() < due {
            state = sim.step_until(&state, due);
        }
        let decoded = reader.frame(index)?;
        assert_eq!(decoded.time(), due);
        assert_eq!(decoded.particles(), state.particles(), "frame {index}");
    }
    Ok(())
}

/// Two runs with the same settings produce identical files.
#[test]
fn identical_settings_give_identical_bytes() -> boxsim::error::Result<()> {
    let mut a = Vec::new();
    let mut b = Vec::new();
    TrajectoryWriter::new(short_run()).write_to(&mut a)?;
    TrajectoryWriter::new(short_run()).write_to(&mut b)?;
    assert_eq!(a, b);

    let mut c = Vec::new();
    TrajectoryWriter::new(short_run().to_builder().seed(7).build()).write_to(&mut c)?;
    assert_ne!(a, c);
    Ok(())
}

/// Frame times increase strictly with the index, and ids stay constant.
#[test]
fn frames_are_ordered_in_time() -> boxsim::error::Result<()> {
    let mut buf = Vec::new();
    TrajectoryWriter::new(short_run()).write_to(&mut buf)?;
    let mut reader = TrajectoryReader::from_reader(Cursor::new(buf))?;

    let first = reader.frame(0)?;
    assert_eq!(first.time(), 0);
    let ids: Vec<i32> = first.particles().iter().map(|p| p.id).collect();

    let mut prev = first.time();
    for frame in reader.frames(1, 1) {
        let frame = frame?;
        assert!(frame.time() > prev);
        prev = frame.time();
        let now: Vec<i32> = frame.particles().iter().map(|p| p.id).collect();
        assert_eq!(now, ids);
    }
    Ok(())
}

/// Reading past the end reports the index and the frame count.
#[test]
fn out_of_range_frame() -> boxsim::error::Result<()> {
    let mut buf = Vec::new();
    TrajectoryWriter::new(short_run()).write_to(&mut buf)?;
    let mut reader = TrajectoryReader::from_reader(Cursor::new(buf))?;
    match reader.frame(300) {
        Err(Error::FrameIndex { index, frame_count }) => {
            assert_eq!(index, 300);
            assert_eq!(frame_count, 300);
        }
        other => panic!("expected an index error, got {other:?}"),
    }
    Ok(())
}

/// Files cut short keep every complete frame readable.
#[test]
fn truncated_file_keeps_complete_frames() -> boxsim::error::Result<()> {
    let mut buf = Vec::new();
    TrajectoryWriter::new(short_run()).write_to(&mut buf)?;
    let chunk = format::chunk_size(20) as usize;
    buf.truncate(format::HEADER_SIZE as usize + 10 * chunk + chunk / 2);

    let mut reader = TrajectoryReader::from_reader(Cursor::new(buf))?;
    assert_eq!(reader.frame_count(), 10);
    assert_eq!(reader.frame(9)?.time(), short_run().frame_time_us(9));
    assert!(reader.frame(10).is_err());
    Ok(())
}

/// Missing files surface as I/O errors, tiny files as format errors.
#[test]
fn unreadable_inputs() -> boxsim::error::Result<()> {
    let dir = tempfile::tempdir()?;
    let missing = open_trajectory(dir.path().join("nope.bin"));
    assert!(matches!(missing, Err(Error::Io(_))));

    let short = dir.path().join("short.bin");
    std::fs::write(&short, [0u8; 10])?;
    assert!(matches!(open_trajectory(&short), Err(Error::Format(_))));
    Ok(())
}

/// Population counts sampled from a file cover every particle outside the channel.
#[test]
fn population_series_from_file() -> boxsim::error::Result<()> {
    let mut buf = Vec::new();
    TrajectoryWriter::new(short_run()).write_to(&mut buf)?;
    let mut reader = TrajectoryReader::from_reader(Cursor::new(buf))?;
    let series = population_series(&mut reader, 30)?;
    assert_eq!(series.len(), 30);
    assert_eq!(series[0].time, 0.0);
    assert_eq!(series[0].counts.left(), 12);
    assert_eq!(series[0].counts.right(), 8);
    for sample in &series {
        assert!(sample.counts.left() + sample.counts.right() <= 20);
    }
    Ok(())
}

/// The reference experiment: 100 particles, 30 fps, one minute.
#[test]
fn reference_experiment_layout() -> boxsim::error::Result<()> {
    let settings = ExperimentSettings::default();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("reference.bin");
    run_simulation(settings, &path)?;

    let mut reader = open_trajectory(&path)?;
    assert_eq!(reader.chunk_size(), 3608);
    assert_eq!(reader.frame_count(), 1800);
    assert_eq!(reader.frame(0)?.time(), 0);
    assert!(reader.frame(53)?.time() < reader.frame(56)?.time());
    assert!(reader.frame(1800).is_err());
    Ok(())
}
