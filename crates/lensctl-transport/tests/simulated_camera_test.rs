// Integration tests for `SimulatedCamera` through the `DeviceTransport` trait.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use bytes::Bytes;
use pretty_assertions::assert_eq;

use lensctl_transport::simulated::{Call, SimulatedCamera};
use lensctl_transport::{
    ContextHandle, DeviceEvent, DeviceHandle, DeviceTransport, Error, FileKind, RawValue,
    StatusCode,
};

const CAPTURE_FOLDER: &str = "/store_00010001/DCIM/100CANON";

// ── Helpers ─────────────────────────────────────────────────────────

async fn open(camera: &SimulatedCamera) -> (ContextHandle, DeviceHandle) {
    let ctx = camera.context_create().await.unwrap();
    let dev = camera.device_create().await.unwrap();
    camera.device_init(ctx, dev).await.unwrap();
    (ctx, dev)
}

async fn close(camera: &SimulatedCamera, ctx: ContextHandle, dev: DeviceHandle) {
    camera.device_exit(ctx, dev).await.unwrap();
    camera.device_release(dev).await.unwrap();
    camera.context_release(ctx).await.unwrap();
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn capture_download_delete_roundtrip() {
    let camera = SimulatedCamera::default();
    let (ctx, dev) = open(&camera).await;

    let file = camera.capture_still(ctx, dev).await.unwrap();
    assert_eq!(file.folder, CAPTURE_FOLDER);
    assert_eq!(file.name, "capt0000.jpg");

    let data = camera
        .file_get(ctx, dev, &file.folder, &file.name, FileKind::Normal)
        .await
        .unwrap();
    assert!(!data.is_empty());

    camera
        .file_delete(ctx, dev, &file.folder, &file.name)
        .await
        .unwrap();
    let names: Vec<String> = camera
        .list_files(ctx, dev, CAPTURE_FOLDER)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert!(!names.contains(&file.name));

    close(&camera, ctx, dev).await;
    assert_eq!(camera.live_contexts(), 0);
    assert_eq!(camera.live_devices(), 0);
}

#[tokio::test]
async fn uninitialized_and_released_handles_are_rejected() {
    let camera = SimulatedCamera::default();
    let ctx = camera.context_create().await.unwrap();
    let dev = camera.device_create().await.unwrap();

    let err = camera.capture_still(ctx, dev).await.unwrap_err();
    assert_eq!(err.code(), StatusCode::GENERIC);

    camera.device_release(dev).await.unwrap();
    let err = camera.capture_preview(ctx, dev).await.unwrap_err();
    assert!(matches!(err, Error::StaleHandle { .. }));
    assert_eq!(err.operation(), "capture_preview");

    camera.context_release(ctx).await.unwrap();
    assert!(camera.context_release(ctx).await.is_err());
}

// ── Configuration ───────────────────────────────────────────────────

#[tokio::test]
async fn widget_edits_reach_the_device_only_on_commit() {
    let camera = SimulatedCamera::default();
    let (ctx, dev) = open(&camera).await;

    let iso = camera.config_get_single(ctx, dev, "iso").await.unwrap();
    camera
        .widget_set_value(iso, &RawValue::Text("400".into()))
        .unwrap();
    assert_eq!(camera.setting("iso"), Some(RawValue::Text("100".into())));

    camera.config_commit(ctx, dev, "iso", iso).await.unwrap();
    assert_eq!(camera.setting("iso"), Some(RawValue::Text("400".into())));

    camera.widget_release(iso).unwrap();
    assert_eq!(camera.live_widget_trees(), 0);
    close(&camera, ctx, dev).await;
}

#[tokio::test]
async fn root_tree_walks_sections_and_rejects_mismatched_values() {
    let camera = SimulatedCamera::default();
    let (ctx, dev) = open(&camera).await;

    let root = camera.config_get_root(ctx, dev).await.unwrap();
    assert_eq!(camera.widget_name(root).unwrap(), "main");
    let sections = camera.widget_children(root).unwrap();
    assert!(sections > 0);
    let first = camera.widget_child(root, 0).unwrap();
    assert!(camera.widget_type(first).unwrap().is_container());
    assert!(camera.widget_child(root, sections).is_err());

    let serial = camera
        .config_get_single(ctx, dev, "serialnumber")
        .await
        .unwrap();
    assert!(camera.widget_readonly(serial).unwrap());
    let err = camera
        .widget_set_value(serial, &RawValue::Int(7))
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::BAD_PARAMETERS);
    let err = camera
        .config_commit(ctx, dev, "serialnumber", serial)
        .await
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::NOT_SUPPORTED);

    camera.widget_release(serial).unwrap();
    camera.widget_release(root).unwrap();
    assert_eq!(camera.live_widget_trees(), 0);
    close(&camera, ctx, dev).await;
}

// ── Events & faults ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn scheduled_events_arrive_on_the_tokio_clock() {
    let camera = SimulatedCamera::default();
    let (ctx, dev) = open(&camera).await;
    let path = format!("{CAPTURE_FOLDER}/IMG_0100.JPG");
    assert!(camera.schedule_file_added(
        Duration::from_secs(3),
        &path,
        Bytes::from_static(b"jpeg")
    ));

    let event = camera
        .wait_for_event(ctx, dev, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(event, DeviceEvent::Timeout);

    let event = camera
        .wait_for_event(ctx, dev, Duration::from_secs(5))
        .await
        .unwrap();
    match event {
        DeviceEvent::FileAdded(file) => assert_eq!(file.to_string(), path),
        other => panic!("expected FileAdded, got {other:?}"),
    }
    close(&camera, ctx, dev).await;
}

#[tokio::test]
async fn injected_faults_are_reported_and_journaled() {
    let camera = SimulatedCamera::default();
    let (ctx, dev) = open(&camera).await;
    camera.clear_journal();

    camera.inject(|f| f.capture_still = Some(StatusCode::CAMERA_BUSY));
    let err = camera.capture_still(ctx, dev).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(camera.journal(), vec![Call::CaptureStill]);

    camera.clear_faults();
    camera.capture_still(ctx, dev).await.unwrap();
    close(&camera, ctx, dev).await;
}
