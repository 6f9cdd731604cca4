mod common;

use common::*;
use sensor_dashboard_sync::application::{HistoryMode, StateUrlSync, UrlCodec, UrlReconciliation};
use sensor_dashboard_sync::domain::{
    events::TimerKind,
    sensor_data::TimeRange,
    view_state::{SensorSelection, ViewState},
};
use std::time::Duration;

struct Fixture {
    sync: StateUrlSync,
    url: FakeUrl,
    timers: FakeTimers,
}

fn default_range() -> TimeRange {
    TimeRange::last_days(now(), 7)
}

fn fixture(query: &str) -> Fixture {
    let url = FakeUrl::with_query(query);
    let timers = FakeTimers::default();
    let mut sync = StateUrlSync::new(
        Box::new(url.clone()),
        Box::new(timers.clone()),
        UrlCodec::from_offset_minutes(Some(0)).unwrap(),
        Duration::from_millis(200),
        default_range(),
    );
    sync.load_initial(default_range());
    Fixture { sync, url, timers }
}

/// Lets the startup write settle so the next notification is reconciled.
fn settled(query: &str) -> Fixture {
    let mut fx = fixture(query);
    if fx.sync.is_guarded() {
        let token = fx.timers.last();
        fx.sync.on_timer(token);
    }
    fx
}

#[test]
fn startup_normalizes_the_address_with_replace() {
    let fx = fixture("");
    insta::assert_snapshot!(fx.url.query(), @"start=2024-06-01T12:00&end=2024-06-08T12:00");
    assert_eq!(fx.url.last_mode(), Some(HistoryMode::Replace));
    assert_eq!(fx.sync.view().range, default_range());
}

#[test]
fn canonical_startup_address_is_left_alone() {
    let fx = fixture("sensors=sensor-01,sensor-02&start=2024-05-01T00:00&end=2024-05-02T06:30");
    assert_eq!(fx.url.write_count(), 0);
    assert!(!fx.sync.is_guarded());
    assert_eq!(fx.sync.view().selected.len(), 2);
    assert_eq!(fx.sync.view().range.start().to_wire(), "2024-05-01T00:00:00.000Z");
}

#[test]
fn startup_drops_duplicate_ids_and_keeps_default_for_bad_range() {
    let fx = fixture("?sensors=a,a,b&start=yesterday");
    insta::assert_snapshot!(fx.url.query(), @"sensors=a,b&start=2024-06-01T12:00&end=2024-06-08T12:00");
}

#[test]
fn user_mutation_pushes_and_guards() {
    let mut fx = settled("");
    assert!(fx.sync.select(id("sensor-01")));

    insta::assert_snapshot!(fx.url.query(), @"sensors=sensor-01&start=2024-06-01T12:00&end=2024-06-08T12:00");
    assert_eq!(fx.url.last_mode(), Some(HistoryMode::Push));
    assert!(fx.sync.is_guarded());

    let (token, delay) = *fx.timers.scheduled.borrow().last().unwrap();
    assert_eq!(token.kind, TimerKind::UrlGuard);
    assert_eq!(delay, Duration::from_millis(200));
}

#[test]
fn echo_of_own_write_confirms_and_is_never_external() {
    let mut fx = settled("");
    fx.sync.select(id("sensor-01"));
    let token = fx.timers.last();
    let written = fx.url.query();

    assert_eq!(fx.sync.on_url_changed(&format!("?{written}")), UrlReconciliation::SelfWrite);
    assert!(!fx.sync.is_guarded());
    assert!(!fx.timers.is_pending(token));
}

#[test]
fn notifications_inside_the_window_are_ignored() {
    let mut fx = settled("");
    fx.sync.select(id("sensor-01"));
    let before = fx.sync.view().clone();

    let outcome = fx.sync.on_url_changed(&format!("sensors=other&{DEFAULT_RANGE_QUERY}"));

    assert_eq!(outcome, UrlReconciliation::SelfWrite);
    assert_eq!(fx.sync.view(), &before);
    assert!(fx.sync.is_guarded());
}

#[test]
fn only_the_latest_settle_timer_clears_the_guard() {
    let mut fx = settled("");
    fx.sync.select(id("a"));
    let first = fx.timers.last();
    fx.sync.select(id("b"));
    let second = fx.timers.last();

    assert_ne!(first, second);
    assert!(!fx.timers.is_pending(first));

    fx.sync.on_timer(first);
    assert!(fx.sync.is_guarded());
    fx.sync.on_timer(second);
    assert_eq!(fx.sync.pending_epoch(), None);
}

#[test]
fn external_navigation_replaces_the_view() {
    let mut fx = settled("sensors=a");
    let query = fx.url.navigate("sensors=b,c&start=2024-06-05T00:00&end=2024-06-06T00:00");

    match fx.sync.on_url_changed(&query) {
        UrlReconciliation::External { previous } => {
            assert_eq!(previous.selected, SensorSelection::from_ids([id("a")]));
        }
        other => panic!("expected external navigation, got {other:?}"),
    }
    assert_eq!(fx.sync.view().selected, SensorSelection::from_ids([id("b"), id("c")]));
    assert_eq!(fx.sync.view().range.end().to_wire(), "2024-06-06T00:00:00.000Z");
}

#[test]
fn navigation_without_range_keeps_the_current_one() {
    let mut fx = settled("sensors=a&start=2024-06-05T00:00&end=2024-06-06T00:00");
    let range = fx.sync.view().range;

    let outcome = fx.sync.on_url_changed("sensors=a,b");

    assert!(matches!(outcome, UrlReconciliation::External { .. }));
    assert_eq!(fx.sync.view().range, range);
}

#[test]
fn reconciliation_compares_by_value() {
    let mut fx = settled(&format!("sensors=a&{DEFAULT_RANGE_QUERY}"));
    let reordered = "end=2024-06-08T12:00&sensors=a&start=2024-06-01T12:00";
    assert_eq!(fx.sync.on_url_changed(reordered), UrlReconciliation::Unchanged);
}

#[test]
fn unchanged_mutations_do_not_write() {
    let mut fx = settled("sensors=a");
    let writes = fx.url.write_count();

    assert!(!fx.sync.select(id("a")));
    assert!(!fx.sync.deselect(&id("zzz")));
    assert!(!fx.sync.set_range(fx.sync.view().range));
    assert_eq!(fx.url.write_count(), writes);
}

#[test]
fn reset_clears_selection_and_restores_range() {
    let mut fx = settled("sensors=a,b&start=2024-01-01T00:00&end=2024-01-02T00:00");
    assert!(fx.sync.reset(default_range()));

    assert_eq!(fx.sync.view(), &ViewState::empty(default_range()));
    assert_eq!(fx.url.query(), DEFAULT_RANGE_QUERY);
    assert_eq!(fx.sync.shareable_url(), format!("https://dash.example/?{DEFAULT_RANGE_QUERY}"));
}
