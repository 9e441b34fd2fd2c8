use super::*;

#[test]
fn test_stop_flag() {
    let tc = TimeControl::new(None, None);
    tc.start();
    assert!(!tc.is_stopped());
    tc.stop();
    assert!(tc.is_stopped());
    assert!(tc.check_time());
}

#[test]
fn test_stop_flag_shared_across_clones() {
    let tc = TimeControl::new(None, None);
    tc.start();
    let other = tc.clone();
    other.stop();
    assert!(tc.is_stopped());
}

#[test]
fn test_hard_cutoff_expires() {
    let tc = TimeControl::new(None, Some(Duration::from_millis(1)));
    tc.start();
    std::thread::sleep(Duration::from_millis(5));
    assert!(tc.check_time());
    assert!(tc.is_stopped());
}

#[test]
fn test_no_cutoff_never_expires() {
    let tc = TimeControl::new(None, None);
    tc.start();
    assert!(!tc.check_time());
}

#[test]
fn test_check_interval() {
    let tc = TimeControl::default();
    assert!(tc.should_check_time(0));
    assert!(tc.should_check_time(4096));
    assert!(!tc.should_check_time(4097));
}

#[test]
fn test_target_extension() {
    let tc = TimeControl::new(
        Some(Duration::from_millis(50)),
        Some(Duration::from_millis(400)),
    );
    tc.start();
    assert!(!tc.target_exceeded());
    tc.extend_target();
    tc.extend_target();
    tc.extend_target();
    // 50 -> 100 -> 200 -> 400, clamped at the cutoff
    tc.extend_target();
    assert!(!tc.target_exceeded());
}

#[test]
fn test_from_go_movetime() {
    let params = GoParams {
        movetime: Some(250),
        ..Default::default()
    };
    let limits = SearchLimits::from_go(&params, Color::White, 10);
    assert_eq!(limits.depth, u8::MAX);
    assert_eq!(limits.time_control.cutoff, Some(Duration::from_millis(240)));
    assert_eq!(limits.time_control.target_ms.load(Ordering::Relaxed), 0);
}

#[test]
fn test_from_go_clock_allocation() {
    // 60s + 1s increment, 30 moves assumed: target well under the clock.
    let params = GoParams {
        wtime: Some(60_000),
        winc: Some(1_000),
        ..Default::default()
    };
    let limits = SearchLimits::from_go(&params, Color::White, 0);
    let target = limits.time_control.target_ms.load(Ordering::Relaxed);
    let cutoff = limits.time_control.cutoff.unwrap();
    assert!(target > 0);
    assert!(target < 30_000);
    assert!(cutoff <= Duration::from_millis(60_000 * 2 / 3));
    assert!(cutoff >= Duration::from_millis(target));
}

#[test]
fn test_from_go_movestogo() {
    // With 4 moves to the time control, each move gets a bigger slice.
    let few = SearchLimits::from_go(
        &GoParams {
            btime: Some(20_000),
            movestogo: Some(4),
            ..Default::default()
        },
        Color::Black,
        0,
    );
    let many = SearchLimits::from_go(
        &GoParams {
            btime: Some(20_000),
            movestogo: Some(40),
            ..Default::default()
        },
        Color::Black,
        0,
    );
    assert!(
        few.time_control.target_ms.load(Ordering::Relaxed)
            > many.time_control.target_ms.load(Ordering::Relaxed)
    );
}

#[test]
fn test_from_go_infinite() {
    let params = GoParams {
        infinite: true,
        wtime: Some(1_000),
        ..Default::default()
    };
    let limits = SearchLimits::from_go(&params, Color::White, 0);
    assert!(limits.time_control.cutoff.is_none());
    tc_never_stops(&limits.time_control);
}

fn tc_never_stops(tc: &TimeControl) {
    tc.start();
    assert!(!tc.check_time());
}

#[test]
fn test_from_go_depth_only() {
    let params = GoParams {
        depth: Some(9),
        ..Default::default()
    };
    let limits = SearchLimits::from_go(&params, Color::White, 0);
    assert_eq!(limits.depth, 9);
    assert!(limits.time_control.cutoff.is_none());
}
