use crate::application::dashboard::DashboardSnapshot;
use crate::domain::connection::ConnectionStatus;
use leptos::*;
use once_cell::sync::OnceCell;

/// Reactive mirror of the latest published snapshot
pub struct Globals {
    pub snapshot: RwSignal<Option<DashboardSnapshot>>,
    pub connection: RwSignal<ConnectionStatus>,
    pub error_message: RwSignal<Option<String>>,
    pub reading_count: RwSignal<usize>,
    pub loading: RwSignal<bool>,
    pub live: RwSignal<bool>,
}

static GLOBALS: OnceCell<Globals> = OnceCell::new();

pub fn globals() -> &'static Globals {
    GLOBALS.get_or_init(|| Globals {
        snapshot: create_rw_signal(None),
        connection: create_rw_signal(ConnectionStatus::disconnected()),
        error_message: create_rw_signal(None),
        reading_count: create_rw_signal(0),
        loading: create_rw_signal(false),
        live: create_rw_signal(false),
    })
}

crate::global_signals! {
    pub snapshot_signal => snapshot: Option<DashboardSnapshot>,
    pub connection_status => connection: ConnectionStatus,
    pub error_message => error_message: Option<String>,
    pub reading_count => reading_count: usize,
    pub is_loading => loading: bool,
    pub is_live => live: bool,
}

/// Pushes `snapshot` into the signals; unchanged scalars are not re-set.
pub fn publish(snapshot: &DashboardSnapshot) {
    if connection_status().get_untracked() != snapshot.connection {
        connection_status().set(snapshot.connection);
    }
    if error_message().get_untracked() != snapshot.error {
        error_message().set(snapshot.error.clone());
    }
    if reading_count().get_untracked() != snapshot.series.len() {
        reading_count().set(snapshot.series.len());
    }
    if is_loading().get_untracked() != snapshot.loading {
        is_loading().set(snapshot.loading);
    }
    if is_live().get_untracked() != snapshot.live {
        is_live().set(snapshot.live);
    }
    snapshot_signal().set(Some(snapshot.clone()));
}
