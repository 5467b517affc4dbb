use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chromalink_lib::sensor::{decision_index, Verdict};
use chromalink_lib::{ColorPipeline, MixedColor, PipelineConfig};

fn recording_pipeline(config: PipelineConfig) -> (ColorPipeline, Arc<Mutex<Vec<i32>>>) {
    let applied = Arc::new(Mutex::new(Vec::new()));
    let sink_log = applied.clone();
    let pipeline = ColorPipeline::new(config, move |color: MixedColor| sink_log.lock().unwrap().push(color.index()))
        .expect("valid config");
    (pipeline, applied)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn scenario_a_red_and_blue_confirm_purple_on_third_tick() {
    let (mut pipeline, applied) = recording_pipeline(PipelineConfig::default());
    let queue = pipeline.line_queue();
    let t0 = Instant::now();

    let mut outcomes = Vec::new();
    for tick in 0..3u64 {
        queue.push("0,200,10,10,150".into());
        queue.push("1,10,10,200,150".into());
        outcomes.push(pipeline.tick_at(t0 + ms(16 * tick)));
    }

    assert!(outcomes.iter().all(|o| o.decided == Some(MixedColor::Purple)));
    assert_eq!(outcomes[0].verdict, Verdict::Pending { candidate: Some(MixedColor::Purple), count: 1 });
    assert_eq!(outcomes[1].applied, None);
    assert_eq!(outcomes[2].verdict, Verdict::Confirmed(Some(MixedColor::Purple)));
    assert_eq!(outcomes[2].applied, Some(MixedColor::Purple));
    assert_eq!(*applied.lock().unwrap(), vec![3]);
    assert_eq!(pipeline.metrics().decisions_confirmed, 1);

    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.slots[0].base_color_name, "red");
    assert_eq!(snapshot.slots[1].base_color_name, "blue");
    assert_eq!(snapshot.slots[0].final_color_name, "purple");
    assert_eq!(snapshot.seq, 3);
}

#[test]
fn scenario_b_four_field_line_is_yellow_on_channel_zero() {
    let (mut pipeline, applied) = recording_pipeline(PipelineConfig { stable_frames: 1, ..PipelineConfig::default() });
    pipeline.line_queue().push("222,250,45,79".into());
    let outcome = pipeline.tick_at(Instant::now());

    assert_eq!(outcome.decided, Some(MixedColor::Yellow));
    let snapshot = pipeline.snapshot();
    let slot = &snapshot.slots[0];
    assert!(slot.has_data);
    assert_eq!((slot.r, slot.g, slot.b, slot.c), (222, 250, 45, 79));
    assert_eq!(slot.base_color_name, "yellow");
    assert_eq!(*applied.lock().unwrap(), vec![2]);
}

#[test]
fn scenario_c_silent_channel_goes_stale_from_elapsed_time_alone() {
    let (mut pipeline, _) = recording_pipeline(PipelineConfig::default());
    let t0 = Instant::now();
    pipeline.line_queue().push("0,200,10,10,150".into());

    assert_eq!(pipeline.tick_at(t0).decided, Some(MixedColor::Red));
    assert_eq!(pipeline.tick_at(t0 + ms(700)).decided, Some(MixedColor::Red));
    let stale = pipeline.tick_at(t0 + ms(701));
    assert_eq!(stale.decided, None);
    assert_eq!(decision_index(stale.decided), -1);
    assert!(!pipeline.snapshot().slots[0].has_data);
}

#[test]
fn malformed_lines_do_not_touch_channel_state() {
    let (mut pipeline, _) = recording_pipeline(PipelineConfig::default());
    let queue = pipeline.line_queue();
    let t0 = Instant::now();
    queue.push("0,10,10,200,150".into());
    pipeline.tick_at(t0);

    for bad in ["0,200,10", "0,200,10,10,150,1", "0,red,10,10,150", "", "0;200;10;10;150"] {
        queue.push(bad.into());
    }
    // Any of these stored as channel 0 would replace the blue reading
    pipeline.tick_at(t0 + ms(10));
    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.slots[0].base_color_name, "blue");
    assert_eq!(snapshot.slots[0].b, 200);
    assert_eq!(pipeline.metrics().malformed_lines, 5);
    assert_eq!(pipeline.metrics().lines_parsed, 1);
}

#[test]
fn never_fed_channels_stay_empty() {
    let (mut pipeline, applied) = recording_pipeline(PipelineConfig::default());
    let t0 = Instant::now();
    for tick in 0..50u64 {
        let outcome = pipeline.tick_at(t0 + ms(100 * tick));
        assert_eq!(outcome.decided, None);
    }
    assert_eq!(pipeline.snapshot().active_slots(), 0);
    assert!(applied.lock().unwrap().is_empty());
}

#[test]
fn out_of_range_channels_are_dropped_and_slots_forced_empty() {
    let config = PipelineConfig { channel_count: 2, stable_frames: 1, ..PipelineConfig::default() };
    let (mut pipeline, _) = recording_pipeline(config);
    let queue = pipeline.line_queue();
    queue.push("2,10,10,200,150".into());
    queue.push("3,200,10,10,150".into());
    let outcome = pipeline.tick_at(Instant::now());

    assert_eq!(outcome.decided, None);
    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.slots.len(), 4);
    assert!(snapshot.slots.iter().all(|s| !s.has_data));
    assert_eq!(pipeline.metrics().out_of_range_samples, 2);
}

#[test]
fn same_tick_updates_are_last_write_wins() {
    let (mut pipeline, _) = recording_pipeline(PipelineConfig { stable_frames: 1, ..PipelineConfig::default() });
    let queue = pipeline.line_queue();
    queue.push("0,200,10,10,150".into());
    queue.push("0,10,10,200,150".into());
    assert_eq!(pipeline.tick_at(Instant::now()).decided, Some(MixedColor::Blue));
}

#[test]
fn three_primaries_are_undecided() {
    let (mut pipeline, applied) = recording_pipeline(PipelineConfig { stable_frames: 1, ..PipelineConfig::default() });
    let queue = pipeline.line_queue();
    queue.push("0,200,10,10,150".into());
    queue.push("1,10,10,200,150".into());
    queue.push("2,222,250,45,79".into());
    assert_eq!(pipeline.tick_at(Instant::now()).decided, None);
    assert!(applied.lock().unwrap().is_empty());
}

#[test]
fn cooldown_and_change_detection_gate_the_sink() {
    let config = PipelineConfig { stable_frames: 1, cooldown_ms: 120, ..PipelineConfig::default() };
    let (mut pipeline, applied) = recording_pipeline(config);
    let queue = pipeline.line_queue();
    let t0 = Instant::now();

    queue.push("0,200,10,10,150".into());
    assert_eq!(pipeline.tick_at(t0).applied, Some(MixedColor::Red));
    // New color inside the cooldown window: suppressed
    queue.push("0,10,10,200,150".into());
    assert_eq!(pipeline.tick_at(t0 + ms(50)).applied, None);
    assert_eq!(pipeline.tick_at(t0 + ms(119)).applied, None);
    // Same decision once the cooldown has elapsed: fires
    assert_eq!(pipeline.tick_at(t0 + ms(120)).applied, Some(MixedColor::Blue));
    // Already applied: suppressed however long it persists
    queue.push("0,10,10,200,150".into());
    assert_eq!(pipeline.tick_at(t0 + ms(500)).applied, None);

    assert_eq!(*applied.lock().unwrap(), vec![0, 1]);
}

#[test]
fn undecided_keeps_previously_applied_color() {
    let (mut pipeline, applied) = recording_pipeline(PipelineConfig { stable_frames: 2, ..PipelineConfig::default() });
    let queue = pipeline.line_queue();
    let t0 = Instant::now();

    for tick in 0..2u64 {
        queue.push("0,222,250,45,79".into());
        pipeline.tick_at(t0 + ms(10 * tick));
    }
    assert_eq!(pipeline.last_applied(), Some(MixedColor::Yellow));

    // Let the channel go stale and stay undecided for many ticks
    for tick in 0..10u64 {
        let outcome = pipeline.tick_at(t0 + ms(1000 + 50 * tick));
        assert_eq!(outcome.decided, None);
    }
    assert_eq!(pipeline.last_applied(), Some(MixedColor::Yellow));
    assert_eq!(pipeline.snapshot().applied, Some(MixedColor::Yellow));
    assert_eq!(*applied.lock().unwrap(), vec![2]);
}

#[test]
fn snapshot_subscribers_see_each_tick() {
    let (mut pipeline, _) = recording_pipeline(PipelineConfig::default());
    let mut rx = pipeline.subscribe_snapshot();
    let metrics_rx = pipeline.subscribe_metrics();
    pipeline.line_queue().push("1,10,10,200,150".into());
    pipeline.tick_at(Instant::now());

    assert!(rx.has_changed().unwrap());
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.seq, 1);
    assert_eq!(snapshot.decided, Some(MixedColor::Blue));
    assert_eq!(metrics_rx.borrow().ticks, 1);
}
