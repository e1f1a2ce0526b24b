use std::time::Duration;

use cz_core::{Color, SearchLimits, SearchOptions};

use crate::clock::{expected_half_moves_till_eog, Clock, SearchInfo, Trend, MINIMUM_DEPTH};

fn clock_with(limits: SearchLimits, options: &SearchOptions) -> Clock {
    let clock = Clock::new(options);
    clock.set_limits(limits);
    clock
}

fn deep_info() -> SearchInfo {
    SearchInfo {
        depth: MINIMUM_DEPTH,
        trend: Trend::Same,
        trend_degree: 0.0,
    }
}

#[test]
fn expected_half_moves_uses_rational_constants() {
    // m < 20: m + 10
    assert_eq!(expected_half_moves_till_eog(10), 20);
    // 20 <= m <= 60: round(0.375 m) + 22
    assert_eq!(expected_half_moves_till_eog(40), 37);
    // m > 60: round(1.25 m) - 30
    assert_eq!(expected_half_moves_till_eog(80), 70);
}

#[test]
fn move_time_overrides_everything() {
    let options = SearchOptions::default();
    let limits = SearchLimits {
        white_time_ms: Some(60_000),
        move_time_ms: Some(1_000),
        ..SearchLimits::default()
    };
    let clock = clock_with(limits, &options);
    clock.start_deadline(Color::White, 40, 0);
    assert_eq!(clock.deadline_ms(), Some(900));
}

#[test]
fn infinite_search_has_no_deadline() {
    let options = SearchOptions::default();
    let clock = clock_with(SearchLimits::infinite(), &options);
    clock.start_deadline(Color::White, 40, 0);
    assert_eq!(clock.deadline_ms(), None);
    assert!(!clock.has_expired());
    assert_eq!(clock.time_to_deadline(), None);
}

#[test]
fn no_time_control_falls_back_to_five_seconds() {
    let options = SearchOptions::default();
    let clock = clock_with(SearchLimits::default(), &options);
    clock.start_deadline(Color::White, 40, 0);
    assert_eq!(clock.deadline_ms(), Some(5_000));
}

#[test]
fn shallow_search_gets_the_whole_budget() {
    let options = SearchOptions::default();
    let limits = SearchLimits {
        black_time_ms: Some(60_000),
        ..SearchLimits::default()
    };
    let clock = clock_with(limits, &options);
    clock.start_deadline(Color::Black, 40, 0);
    // Below the minimum depth: maximum = time - overhead.
    assert_eq!(clock.deadline_ms(), Some(59_900));
}

#[test]
fn deep_search_moves_to_the_ideal_deadline() {
    let options = SearchOptions::default();
    let limits = SearchLimits {
        white_time_ms: Some(60_000),
        ..SearchLimits::default()
    };
    let clock = clock_with(limits, &options);
    clock.start_deadline(Color::White, 62, 0);
    clock.update_deadline(deep_info(), true);
    // material 62 -> round(1.25*62)-30 = 48 half-moves; 60000/48 = 1250.
    assert_eq!(clock.deadline_ms(), Some(1_250));
}

#[test]
fn increment_joins_the_ideal_budget() {
    let options = SearchOptions::default();
    let limits = SearchLimits {
        white_time_ms: Some(60_000),
        white_increment_ms: Some(2_000),
        ..SearchLimits::default()
    };
    let clock = clock_with(limits, &options);
    clock.start_deadline(Color::White, 62, 0);
    clock.update_deadline(deep_info(), true);
    assert_eq!(clock.deadline_ms(), Some(3_250));
}

#[test]
fn deadline_stays_within_bounds() {
    let options = SearchOptions::default();
    for time in [200i64, 1_000, 10_000, 120_000] {
        for material in [10, 40, 80] {
            let limits = SearchLimits {
                white_time_ms: Some(time),
                ..SearchLimits::default()
            };
            let clock = clock_with(limits, &options);
            clock.start_deadline(Color::White, material, 0);
            clock.update_deadline(deep_info(), true);
            let deadline = clock.deadline_ms().unwrap();
            assert!(deadline >= 0);
            assert!(deadline <= time - options.move_overhead_ms);
        }
    }
}

#[test]
fn deadline_clamps_to_zero_when_time_is_below_overhead() {
    let options = SearchOptions::default();
    let limits = SearchLimits {
        white_time_ms: Some(50),
        ..SearchLimits::default()
    };
    let clock = clock_with(limits, &options);
    clock.start_deadline(Color::White, 40, 0);
    assert_eq!(clock.deadline_ms(), Some(0));
    assert!(clock.has_expired());
}

#[test]
fn low_time_deadline_expires_promptly() {
    let options = SearchOptions::default();
    let limits = SearchLimits {
        white_time_ms: Some(200),
        white_increment_ms: Some(0),
        ..SearchLimits::default()
    };
    let clock = clock_with(limits, &options);
    clock.start_deadline(Color::White, 30, 0);
    assert_eq!(clock.deadline_ms(), Some(100));
    assert!(!clock.has_expired());

    std::thread::sleep(Duration::from_millis(130));
    assert!(clock.has_expired());
    assert!(clock.wait_deadline(Duration::from_millis(5)));
}

#[test]
fn trend_factor_accumulates_and_halves() {
    let options = SearchOptions::default();
    let limits = SearchLimits {
        white_time_ms: Some(10_000),
        ..SearchLimits::default()
    };
    let clock = clock_with(limits, &options);
    clock.start_deadline(Color::White, 40, 0);
    assert_eq!(clock.trend_factor_ms(), 0);

    // Worsening eval banks a quarter of the remaining budget.
    clock.update_deadline(
        SearchInfo {
            depth: 5,
            trend: Trend::Worse,
            trend_degree: 1.0,
        },
        true,
    );
    assert_eq!(clock.trend_factor_ms(), 2_475);

    // Improving eval pays it back geometrically.
    clock.update_deadline(
        SearchInfo {
            depth: 5,
            trend: Trend::Better,
            trend_degree: 0.0,
        },
        true,
    );
    assert_eq!(clock.trend_factor_ms(), 1_237);

    // Disabled by default: the deadline ignores the accumulated factor.
    // material 40 -> 37 half-moves; round(10000/37) = 270.
    assert_eq!(clock.deadline_ms(), Some(270));
}

#[test]
fn trend_factor_joins_the_deadline_when_enabled() {
    let mut options = SearchOptions::default();
    options.enable_trend_factor = true;
    let limits = SearchLimits {
        white_time_ms: Some(10_000),
        ..SearchLimits::default()
    };
    let clock = clock_with(limits, &options);
    clock.start_deadline(Color::White, 40, 0);
    clock.update_deadline(
        SearchInfo {
            depth: 5,
            trend: Trend::Worse,
            trend_degree: 1.0,
        },
        true,
    );
    // ideal 270 + banked 2475, still capped by maximum.
    assert_eq!(clock.deadline_ms(), Some(2_745));
}

#[test]
fn sine_easing_is_selectable() {
    let mut options = SearchOptions::default();
    options.set("EasingCurve", "sine").unwrap();
    let limits = SearchLimits {
        white_time_ms: Some(60_000),
        ..SearchLimits::default()
    };
    let clock = clock_with(limits, &options);
    clock.start_deadline(Color::White, 62, 0);
    clock.update_deadline(deep_info(), true);
    // The sine curve maps the raw budget into [0, 1] before rounding.
    assert!(clock.deadline_ms().unwrap() <= 1);
}

#[test]
fn deactivate_clears_the_deadline() {
    let options = SearchOptions::default();
    let limits = SearchLimits {
        white_time_ms: Some(50),
        ..SearchLimits::default()
    };
    let clock = clock_with(limits, &options);
    clock.start_deadline(Color::White, 40, 0);
    assert!(clock.has_expired());
    clock.deactivate();
    assert!(!clock.has_expired());
}

#[test]
fn move_overhead_helpers() {
    let options = SearchOptions::default();
    let limits = SearchLimits {
        white_time_ms: Some(150),
        ..SearchLimits::default()
    };
    let clock = clock_with(limits, &options);
    clock.start_deadline(Color::White, 40, 0);
    // 50ms to the deadline is inside the 100ms overhead margin.
    assert!(clock.less_than_move_overhead());
    assert!(!clock.past_move_overhead());
}
