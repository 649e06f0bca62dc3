//! Tar-to-VHD conversion integration tests.
//!
//! The guest converter is replaced by a process that echoes its input, so
//! the target file ends up holding exactly the bytes streamed in.

use hostvm::test_utils::{EchoProcess, RecordingControlPlane, test_vm, test_vm_with_process};
use hostvm::{Error, GuestOs, HostingVm, tar_to_vhd};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

const TEN_MIB: usize = 10 * 1024 * 1024;

fn converter_vm() -> (HostingVm, Arc<EchoProcess>) {
    let process = Arc::new(EchoProcess::new());
    let vm = test_vm_with_process(
        GuestOs::Linux,
        Arc::new(RecordingControlPlane::new()),
        process.clone(),
    );
    (vm, process)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_converts_ten_mib_stream() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("layer.vhd");
    let (vm, process) = converter_vm();
    let input = pattern(TEN_MIB);

    let written = tar_to_vhd(Some(&vm), &target, Cursor::new(input.clone()))
        .await
        .unwrap();

    assert_eq!(written, TEN_MIB as u64);
    let on_disk = std::fs::read(&target).unwrap();
    assert_eq!(on_disk.len(), TEN_MIB);
    assert!(on_disk == input);
    assert_eq!(process.last_args(), vec!["tar2vhd".to_string()]);
    assert_eq!(process.closes(), 1);
}

#[tokio::test]
async fn test_uses_configured_converter() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("layer.vhd");
    let process = Arc::new(EchoProcess::new());
    let vm = HostingVm::builder(GuestOs::Linux)
        .control_plane(Arc::new(RecordingControlPlane::new()))
        .guest_process(process.clone())
        .converter_args(["/bin/tar2vhd", "--fixed"])
        .build()
        .unwrap();

    tar_to_vhd(Some(&vm), &target, Cursor::new(b"tar".to_vec()))
        .await
        .unwrap();

    assert_eq!(
        process.last_args(),
        vec!["/bin/tar2vhd".to_string(), "--fixed".to_string()]
    );
}

#[tokio::test]
async fn test_without_vm_fails_before_creating_file() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("layer.vhd");

    let err = tar_to_vhd(None, &target, Cursor::new(pattern(16)))
        .await
        .unwrap_err();

    assert!(err.is_caller_error());
    assert!(!target.exists());
}

#[tokio::test]
async fn test_start_failure_leaves_target_behind() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("layer.vhd");
    let (vm, process) = converter_vm();
    process.fail_start(true);

    let err = tar_to_vhd(Some(&vm), &target, Cursor::new(pattern(16)))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::GuestProcess(_)));
    assert!(target.exists());
    assert_eq!(std::fs::metadata(&target).unwrap().len(), 0);
    assert_eq!(process.closes(), 0);
}

#[tokio::test]
async fn test_nonzero_exit_is_reported_and_process_closed() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("layer.vhd");
    let (vm, process) = converter_vm();
    process.exit_code(2);

    let err = tar_to_vhd(Some(&vm), &target, Cursor::new(pattern(1024)))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::GuestProcess(ref msg) if msg.contains("code 2")));
    assert_eq!(process.closes(), 1);
}

#[tokio::test]
async fn test_vm_without_launcher_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("layer.vhd");
    let vm = test_vm(GuestOs::Linux, Arc::new(RecordingControlPlane::new()));

    let err = tar_to_vhd(Some(&vm), &target, Cursor::new(pattern(16)))
        .await
        .unwrap_err();

    assert!(err.is_not_supported());
}

#[tokio::test]
async fn test_stopped_vm_refuses_conversion() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("layer.vhd");
    let (vm, process) = converter_vm();
    vm.terminate().await;

    let err = tar_to_vhd(Some(&vm), &target, Cursor::new(pattern(16)))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotRunning(_)));
    assert_eq!(process.starts(), 0);
}
