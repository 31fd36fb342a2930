// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the viewer loop against scripted surfaces and sources

use depth_roi::backends::replay::save_frame_png;
use depth_roi::backends::{DepthSource, OptionRange, SensorOption, SourceDescriptor};
use depth_roi::session::{self, RunLimits};
use depth_roi::{
    AppResult, Config, DepthFrame, DisplayFrame, DisplaySurface, ReplaySource, Roi, SourceError,
    SourceResult,
};
use std::collections::VecDeque;
use std::path::PathBuf;

/// Surface that answers region requests and key polls from a script
#[derive(Default)]
struct ScriptedSurface {
    selections: VecDeque<Option<Roi>>,
    /// Keys delivered after the frame with the given counter
    keys: Vec<(u64, char)>,
    pending: VecDeque<char>,
    presented: Vec<u64>,
    regions_shown: Vec<Option<Roi>>,
    selection_requests: usize,
    quit_after: Option<u64>,
    /// Behave like a surface without region selection
    no_selection: bool,
}

impl DisplaySurface for ScriptedSurface {
    fn present(&mut self, frame: &DisplayFrame, _status: &str) -> AppResult<()> {
        self.presented.push(frame.frame_counter);
        self.regions_shown.push(frame.region);
        self.pending.extend(
            self.keys
                .iter()
                .filter(|(at, _)| *at == frame.frame_counter)
                .map(|(_, key)| *key),
        );
        Ok(())
    }

    fn poll_key(&mut self) -> AppResult<Option<char>> {
        Ok(self.pending.pop_front())
    }

    fn select_region(&mut self, _frame: &DisplayFrame) -> AppResult<Option<Roi>> {
        self.selection_requests += 1;
        Ok(self.selections.pop_front().flatten())
    }

    fn can_select_region(&self) -> bool {
        !self.no_selection
    }

    fn should_quit(&self) -> bool {
        self.quit_after
            .is_some_and(|n| self.presented.len() as u64 >= n)
    }
}

/// Source that fails on a fixed pattern
struct FlakySource {
    descriptor: SourceDescriptor,
    calls: u32,
    fail_every: u32,
}

impl FlakySource {
    fn new(fail_every: u32) -> Self {
        Self {
            descriptor: SourceDescriptor {
                name: "Flaky".to_string(),
                path: "test".to_string(),
                width: 32,
                height: 32,
                fps: 0,
            },
            calls: 0,
            fail_every,
        }
    }
}

impl DepthSource for FlakySource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn depth_units_per_meter(&self) -> f64 {
        1000.0
    }

    fn supports(&self, _option: SensorOption) -> bool {
        false
    }

    fn get_option(&self, _option: SensorOption) -> Option<f32> {
        None
    }

    fn set_option(&mut self, option: SensorOption, _value: f32) -> SourceResult<()> {
        Err(SourceError::OptionFailed(option.to_string()))
    }

    fn option_range(&self, _option: SensorOption) -> Option<OptionRange> {
        None
    }

    fn wait_for_frame(&mut self) -> SourceResult<DepthFrame> {
        self.calls += 1;
        if self.fail_every != 0 && self.calls % self.fail_every == 0 {
            return Err(SourceError::Timeout);
        }
        Ok(DepthFrame::filled(32, 32, 8000))
    }
}

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.snapshot.enabled = false;
    config.display.burn_labels = false;
    config
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "depth-roi-session-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn memory_source(frames: usize) -> ReplaySource {
    let frames = (0..frames)
        .map(|i| DepthFrame::filled(64, 48, 9000).with_sequence(i as u32))
        .collect();
    ReplaySource::from_frames(frames).unwrap()
}

#[test]
fn test_region_selected_once() {
    let mut source = memory_source(2);
    let mut surface = ScriptedSurface {
        selections: VecDeque::from([
            Some(Roi::new(4, 4, 20, 16)),
            Some(Roi::new(0, 0, 8, 8)),
        ]),
        ..Default::default()
    };

    let summary = session::run(
        &mut source,
        &mut surface,
        &quiet_config(),
        RunLimits { max_frames: Some(6) },
    )
    .unwrap();

    assert_eq!(surface.selection_requests, 1);
    assert_eq!(summary.region, Some(Roi::new(4, 4, 20, 16)));
    assert!(
        surface
            .regions_shown
            .iter()
            .all(|r| *r == Some(Roi::new(4, 4, 20, 16)))
    );
}

#[test]
fn test_empty_selection_is_retried_next_frame() {
    let mut source = memory_source(1);
    let mut surface = ScriptedSurface {
        selections: VecDeque::from([None, Some(Roi::new(10, 10, 0, 5)), Some(Roi::new(2, 2, 30, 30))]),
        ..Default::default()
    };

    let summary = session::run(
        &mut source,
        &mut surface,
        &quiet_config(),
        RunLimits { max_frames: Some(5) },
    )
    .unwrap();

    assert_eq!(surface.selection_requests, 3);
    assert_eq!(surface.regions_shown[..2], [None, None]);
    assert_eq!(surface.regions_shown[2], Some(Roi::new(2, 2, 30, 30)));
    assert_eq!(summary.region, Some(Roi::new(2, 2, 30, 30)));
}

#[test]
fn test_preset_region_skips_selection() {
    let mut source = memory_source(1);
    let mut surface = ScriptedSurface::default();
    let mut config = quiet_config();
    config.roi = Some(Roi::new(8, 8, 16, 16));

    let summary = session::run(&mut source, &mut surface, &config, RunLimits { max_frames: Some(3) })
        .unwrap();

    assert_eq!(surface.selection_requests, 0);
    assert_eq!(summary.region, Some(Roi::new(8, 8, 16, 16)));
}

#[test]
fn test_surface_without_selection_is_never_asked() {
    let mut source = memory_source(1);
    let mut surface = ScriptedSurface {
        no_selection: true,
        selections: VecDeque::from([Some(Roi::new(4, 4, 20, 16))]),
        ..Default::default()
    };

    let summary = session::run(
        &mut source,
        &mut surface,
        &quiet_config(),
        RunLimits { max_frames: Some(3) },
    )
    .unwrap();

    assert_eq!(surface.selection_requests, 0);
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.region, None);
    assert!(surface.regions_shown.iter().all(Option::is_none));
}

#[test]
fn test_preset_region_outside_frame_detects_nothing() {
    let mut source = memory_source(1);
    let mut surface = ScriptedSurface::default();
    let mut config = quiet_config();
    config.roi = Some(Roi::new(700, 500, 10, 10));

    let summary = session::run(&mut source, &mut surface, &config, RunLimits { max_frames: Some(3) })
        .unwrap();

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.region, None);
    assert_eq!(summary.candidates_seen, 0);
    assert_eq!(surface.selection_requests, 0);
}

#[test]
fn test_scaling_keys_round_trip() {
    let mut source = memory_source(1);
    let mut surface = ScriptedSurface {
        keys: vec![(1, '+'), (2, '-')],
        ..Default::default()
    };

    let summary = session::run(
        &mut source,
        &mut surface,
        &quiet_config(),
        RunLimits { max_frames: Some(3) },
    )
    .unwrap();
    assert_eq!(summary.final_scaling, 5.0);

    let mut surface = ScriptedSurface {
        keys: vec![(1, '+'), (2, '+'), (2, 'x')],
        ..Default::default()
    };
    let summary = session::run(
        &mut source,
        &mut surface,
        &quiet_config(),
        RunLimits { max_frames: Some(3) },
    )
    .unwrap();
    assert_eq!(summary.final_scaling, 7.0);
}

#[test]
fn test_frame_counter_and_quit() {
    let mut source = memory_source(3);
    let mut surface = ScriptedSurface {
        quit_after: Some(4),
        ..Default::default()
    };

    let summary =
        session::run(&mut source, &mut surface, &quiet_config(), RunLimits::default()).unwrap();

    assert_eq!(surface.presented, vec![1, 2, 3, 4]);
    assert_eq!(summary.frames, 4);
}

#[test]
fn test_snapshot_written_at_configured_frame() {
    let dir = temp_dir("snapshot");
    let path = dir.join("snap.png");

    let mut config = quiet_config();
    config.snapshot.enabled = true;
    config.snapshot.frame = 3;
    config.snapshot.path = path.clone();

    let mut source = memory_source(1);
    let mut surface = ScriptedSurface::default();
    let summary =
        session::run(&mut source, &mut surface, &config, RunLimits { max_frames: Some(5) }).unwrap();

    assert!(summary.snapshot_written);
    let image = image::open(&path).unwrap();
    assert_eq!((image.width(), image.height()), (64, 48));

    // Never reached
    let late = dir.join("late.png");
    config.snapshot.frame = 100;
    config.snapshot.path = late.clone();
    let mut surface = ScriptedSurface::default();
    let summary =
        session::run(&mut source, &mut surface, &config, RunLimits { max_frames: Some(5) }).unwrap();
    assert!(!summary.snapshot_written);
    assert!(!late.exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_snapshot_failure_is_not_fatal() {
    let dir = temp_dir("snapshot-fail");
    // A directory where the file should go
    let path = dir.join("blocked.png");
    std::fs::create_dir_all(&path).unwrap();

    let mut config = quiet_config();
    config.snapshot.enabled = true;
    config.snapshot.frame = 1;
    config.snapshot.path = path;

    let mut source = memory_source(1);
    let mut surface = ScriptedSurface::default();
    let summary =
        session::run(&mut source, &mut surface, &config, RunLimits { max_frames: Some(2) }).unwrap();

    assert!(!summary.snapshot_written);
    assert_eq!(summary.frames, 2);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_occasional_acquisition_errors_are_skipped() {
    let mut source = FlakySource::new(3);
    let mut surface = ScriptedSurface::default();

    let summary =
        session::run(&mut source, &mut surface, &quiet_config(), RunLimits { max_frames: Some(6) })
            .unwrap();

    assert_eq!(summary.frames, 6);
    assert_eq!(summary.acquisition_errors, 2);
}

#[test]
fn test_persistent_acquisition_errors_end_the_run() {
    let mut source = FlakySource::new(1);
    let mut surface = ScriptedSurface::default();
    let mut config = quiet_config();
    config.source.max_consecutive_errors = 3;

    let result = session::run(&mut source, &mut surface, &config, RunLimits { max_frames: Some(6) });

    assert!(result.is_err());
    assert_eq!(source.calls, 3);
    assert!(surface.presented.is_empty());
}

#[test]
fn test_replay_directory_end_to_end() {
    let dir = temp_dir("replay");

    // Raw depth: table at 57500 units, one 15x15 object at 8500 units
    for (i, shift) in [0u32, 2].iter().enumerate() {
        let mut frame = DepthFrame::filled(640, 480, 57500);
        frame.fill_rect(Roi::new(124 + shift, 124, 15, 15), 8500);
        save_frame_png(&frame, &dir.join(format!("{:04}.png", i))).unwrap();
    }

    let mut config = quiet_config();
    config.source.replay_dir = Some(dir.clone());
    config.roi = Some(Roi::new(100, 100, 64, 64));
    config.display.initial_scaling = 2.0;

    let mut source = ReplaySource::open(&dir, &config.source)
        .unwrap()
        .without_pacing();
    let mut surface = ScriptedSurface::default();
    let summary =
        session::run(&mut source, &mut surface, &config, RunLimits { max_frames: Some(4) }).unwrap();

    assert_eq!(summary.frames, 4);
    assert_eq!(summary.candidates_seen, 4);
    assert_eq!(summary.region, Some(Roi::new(100, 100, 64, 64)));

    let _ = std::fs::remove_dir_all(&dir);
}
