//! Install, update and remove flows through the client facade

mod common;

use common::*;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use pkgcenter_lib::core::events::{CatalogEvent, ClientEvent};
use pkgcenter_lib::core::{PackageState, PkgCenterError};
use pkgcenter_lib::package_managers::{
    ArchFilter, ExitStatus, Filter, Progress, TransactionKind, TransactionStatus,
};

#[tokio::test]
async fn test_install_uses_foreign_fallback_exactly_once() {
    let t = TestClient::new();
    t.backend.add_available("steam;1.0.0.79;i686-multilib;multilib", "Steam");
    let steam = t.client.find_by_component_id("com.valvesoftware.Steam").unwrap();

    let exit = t
        .client
        .install(&steam, &no_progress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(exit, ExitStatus::Success);
    let filters = t.backend.resolve_filters();
    assert_eq!(filters.len(), 2);
    assert_eq!(filters[0].arch, ArchFilter::Native);
    assert_eq!(filters[1].arch, ArchFilter::Foreign);
    let transactions = t.backend.transactions();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].1[0].as_str(), "steam;1.0.0.79;i686-multilib;multilib");
    assert_eq!(steam.state(), PackageState::Installed);
}

#[tokio::test]
async fn test_progress_callbacks_may_borrow_caller_state() {
    let t = TestClient::new();
    t.backend.add_available("gedit;46.0;noarch;extra", "");
    t.backend.add_installed("firefox;121.0;noarch;installed", "");
    t.backend.set_updates(&["firefox;122.0;noarch;extra"]);
    t.client.installed_packages().await.unwrap();
    t.client.refresh_updates().await.unwrap();
    let gedit = t.client.find_by_component_id("org.gnome.Gedit").unwrap();
    let firefox = t.client.find_by_component_id("org.mozilla.firefox").unwrap();

    let reports = parking_lot::Mutex::new(Vec::new());
    let progress = |p: Progress| reports.lock().push(p.status);
    let token = CancellationToken::new();

    t.client.install(&gedit, &progress, &token).await.unwrap();
    t.client.update(&firefox, &progress, &token).await.unwrap();
    t.client.remove(&gedit, &progress, &token).await.unwrap();

    let reports = reports.into_inner();
    assert_eq!(reports.len(), 9);
    assert_eq!(reports[1], TransactionStatus::Installing);
    assert_eq!(reports[4], TransactionStatus::Updating);
    assert_eq!(reports[7], TransactionStatus::Removing);
}

#[tokio::test]
async fn test_install_multi_package_component() {
    let t = TestClient::new();
    t.backend.add_available("libreoffice-writer;24.2;noarch;extra", "");
    t.backend.add_available("libreoffice-calc;24.2;noarch;extra", "");
    let office = t.client.find_by_component_id("org.libreoffice.LibreOffice").unwrap();

    t.client
        .install(&office, &no_progress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(t.backend.transactions()[0].1.len(), 2);
    assert_eq!(t.backend.installed_names().len(), 2);
}

#[tokio::test]
async fn test_failed_install_releases_task_and_propagates() {
    let t = TestClient::new();
    t.backend.add_available("firefox;122.0;noarch;extra", "");
    t.backend.set_fail_transactions(true);
    let firefox = t.client.find_by_component_id("org.mozilla.firefox").unwrap();
    let mut events = t.client.subscribe();

    let err = t
        .client
        .install(&firefox, &no_progress, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PkgCenterError::Backend { .. }));
    assert!(!t.client.has_tasks());
    assert!(drain(&mut events).contains(&ClientEvent::TasksFinished));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_reaches_backend_and_releases_task() {
    let t = TestClient::new();
    t.backend.add_available("firefox;122.0;noarch;extra", "");
    t.backend.set_latency(Duration::from_secs(30));
    let firefox = t.client.find_by_component_id("org.mozilla.firefox").unwrap();
    let token = CancellationToken::new();

    let install = t.client.install(&firefox, &no_progress, &token);
    let cancel = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(t.client.has_tasks());
        assert_eq!(firefox.state(), PackageState::Installing);
        token.cancel();
    };
    let (result, ()) = tokio::join!(install, cancel);

    assert!(result.unwrap_err().is_cancelled());
    assert!(!t.client.has_tasks());
    assert_eq!(firefox.state(), PackageState::NotInstalled);
    assert!(t.backend.transactions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_operation_on_busy_record_is_refused() {
    let t = TestClient::new();
    t.backend.add_available("firefox;122.0;noarch;extra", "");
    t.backend.set_latency(Duration::from_secs(5));
    let firefox = t.client.find_by_component_id("org.mozilla.firefox").unwrap();
    let token = CancellationToken::new();

    let first = t.client.install(&firefox, &no_progress, &token);
    let second = async {
        tokio::task::yield_now().await;
        t.client.remove(&firefox, &no_progress, &token).await
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.is_ok());
    assert!(matches!(second, Err(PkgCenterError::OperationInProgress(_))));
    assert!(!t.client.has_tasks());
}

#[tokio::test]
async fn test_update_flow_clears_changes_and_refreshes() {
    let t = TestClient::new();
    t.backend.add_installed("firefox;121.0;noarch;installed", "");
    t.backend
        .set_updates(&["firefox;122.0;noarch;extra", "linux-firmware;20240312;noarch;core"]);
    t.client.installed_packages().await.unwrap();
    assert_eq!(t.client.refresh_updates().await.unwrap(), 2);

    let firefox = t.client.find_by_component_id("org.mozilla.firefox").unwrap();
    assert_eq!(firefox.state(), PackageState::UpdateAvailable);
    assert_eq!(firefox.latest_version().as_deref(), Some("122.0"));
    assert_eq!(firefox.change_information().details()[0].update_text, "Update for firefox");

    t.client
        .update(&firefox, &no_progress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(firefox.state(), PackageState::Installed);
    assert_eq!(t.client.update_count(), 1);
    assert_eq!(t.inhibitor.acquired(), 1);
    assert_eq!(t.inhibitor.active(), 0);
    assert_eq!(
        t.backend.transactions()[0].0,
        TransactionKind::Update,
        "update must use the pending ids, not re-resolve"
    );
    assert!(t.backend.resolve_filters().is_empty());
}

#[tokio::test]
async fn test_os_updates_record_applies_unowned_updates() {
    let t = TestClient::new();
    t.backend.set_updates(&["linux-firmware;20240312;noarch;core", "bash;5.2.26;x86_64;core"]);
    t.client.refresh_updates().await.unwrap();

    let os = t.client.os_updates();
    assert_eq!(os.state(), PackageState::UpdateAvailable);
    assert_eq!(os.pending_update_ids().len(), 2);

    t.client
        .update(&os, &no_progress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(os.state(), PackageState::Installed);
    assert_eq!(t.client.update_count(), 0);
}

#[tokio::test]
async fn test_update_without_pending_changes_is_a_noop() {
    let t = TestClient::new();
    let gedit = t.client.find_by_component_id("org.gnome.Gedit").unwrap();
    let exit = t
        .client
        .update(&gedit, &no_progress, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(exit, ExitStatus::Success);
    assert_eq!(t.backend.calls().update.load(Ordering::SeqCst), 0);
    assert_eq!(t.inhibitor.acquired(), 0);
}

#[tokio::test]
async fn test_remove_re_resolves_and_refreshes() {
    let t = TestClient::new();
    t.backend.add_installed("gedit;46.0;noarch;installed", "");
    t.client.installed_packages().await.unwrap();
    // Installed version drifted outside the client
    t.backend.add_installed("gedit;46.1;noarch;installed", "");
    let gedit = t.client.find_by_component_id("org.gnome.Gedit").unwrap();

    t.client
        .remove(&gedit, &no_progress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(t.backend.resolve_filters(), vec![Filter::installed_newest()]);
    assert_eq!(t.backend.transactions()[0].1[0].version(), "46.1");
    assert_eq!(gedit.state(), PackageState::NotInstalled);
    assert_eq!(t.backend.calls().get_updates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_driver_detection_emits_catalog_event() {
    let t = TestClient::new();
    t.add_nvidia_gpu();
    let mut catalog = t.client.subscribe_catalog();

    t.client.detect_drivers().await;

    assert_eq!(
        drain(&mut catalog),
        vec![CatalogEvent::Added {
            name: "nvidia-driver-550".into(),
            component_id: "com.nvidia.driver".into(),
        }]
    );
    // A second scan finds the same record and changes nothing
    t.client.detect_drivers().await;
    assert!(drain(&mut catalog).is_empty());
}
