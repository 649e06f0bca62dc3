//! SCSI slot integration tests.

use hostvm::schema::{HostedSettings, RequestType, ResourceType};
use hostvm::test_utils::{RecordingControlPlane, request_of};
use hostvm::{Error, GuestOs, HostingVm, LUNS_PER_CONTROLLER, ScsiSlot};
use std::sync::Arc;
use std::time::Duration;

fn windows_vm(controllers: u8) -> (HostingVm, Arc<RecordingControlPlane>) {
    let control_plane = Arc::new(RecordingControlPlane::new());
    let vm = HostingVm::builder(GuestOs::Windows)
        .id("uvm-scsi")
        .scsi_controllers(controllers)
        .control_plane(control_plane.clone())
        .build()
        .expect("valid config");
    (vm, control_plane)
}

#[tokio::test]
async fn test_slots_are_first_free() {
    let (vm, _) = windows_vm(1);

    let a = vm.attach_scsi(r"C:\a.vhdx", r"C:\c\1\m0", false).await.unwrap();
    let b = vm.attach_scsi(r"C:\b.vhdx", r"C:\c\1\m1", true).await.unwrap();
    assert_eq!(a, ScsiSlot::new(0, 0));
    assert_eq!(b, ScsiSlot::new(0, 1));

    vm.detach_scsi(r"C:\a.vhdx").await.unwrap();
    let c = vm.attach_scsi(r"C:\c.vhdx", r"C:\c\1\m2", false).await.unwrap();
    assert_eq!(c, ScsiSlot::new(0, 0));
    assert_eq!(vm.scsi_slot(r"C:\b.vhdx").await.unwrap(), b);
    assert_eq!(vm.scsi_slots_in_use().await, 2);
}

#[tokio::test]
async fn test_add_request_names_the_slot() {
    let (vm, control_plane) = windows_vm(1);
    vm.attach_scsi(r"C:\a.vhdx", r"C:\c\1\m0", true).await.unwrap();

    let requests = control_plane.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].resource_uri,
        "virtualmachine/devices/scsi/0/attachments/0"
    );
    assert_eq!(
        requests[0].hosted_settings,
        Some(HostedSettings::MappedVirtualDisk {
            container_path: r"C:\c\1\m0".into(),
            lun: 0,
            controller: 0,
            read_only: true,
        })
    );
}

#[tokio::test]
async fn test_same_disk_twice_is_rejected() {
    let (vm, control_plane) = windows_vm(1);
    vm.attach_scsi(r"C:\a.vhdx", r"C:\m0", false).await.unwrap();

    let err = vm.attach_scsi(r"C:\a.vhdx", r"C:\m1", false).await.unwrap_err();

    assert!(matches!(err, Error::AlreadyAttached { .. }));
    assert_eq!(control_plane.requests().len(), 1);
    assert_eq!(vm.scsi_slots_in_use().await, 1);
}

#[tokio::test]
async fn test_exhausted_controllers() {
    let (vm, control_plane) = windows_vm(1);
    for lun in 0..LUNS_PER_CONTROLLER {
        vm.attach_scsi(format!(r"C:\disk{lun}.vhdx"), r"C:\m", false)
            .await
            .unwrap();
    }

    let err = vm.attach_scsi(r"C:\extra.vhdx", r"C:\m", false).await.unwrap_err();

    assert!(matches!(err, Error::NoAvailableSlot { .. }));
    assert_eq!(
        control_plane.requests().len(),
        usize::from(LUNS_PER_CONTROLLER)
    );
}

#[tokio::test]
async fn test_second_controller_used_after_first_fills() {
    let (vm, _) = windows_vm(2);
    for lun in 0..LUNS_PER_CONTROLLER {
        vm.attach_scsi(format!(r"C:\disk{lun}.vhdx"), r"C:\m", false)
            .await
            .unwrap();
    }

    let slot = vm.attach_scsi(r"C:\extra.vhdx", r"C:\m", false).await.unwrap();

    assert_eq!(slot, ScsiSlot::new(1, 0));
}

#[tokio::test]
async fn test_failed_add_frees_slot() {
    let (vm, control_plane) = windows_vm(1);
    control_plane.fail_times(
        1,
        request_of(ResourceType::MappedVirtualDisk, RequestType::Add),
    );

    assert!(vm.attach_scsi(r"C:\a.vhdx", r"C:\m0", false).await.is_err());
    assert_eq!(vm.scsi_slots_in_use().await, 0);
    assert!(vm.scsi_slot(r"C:\a.vhdx").await.unwrap_err().is_not_found());

    let slot = vm.attach_scsi(r"C:\a.vhdx", r"C:\m0", false).await.unwrap();
    assert_eq!(slot, ScsiSlot::new(0, 0));
}

#[tokio::test]
async fn test_failed_remove_keeps_slot() {
    let (vm, control_plane) = windows_vm(1);
    vm.attach_scsi(r"C:\a.vhdx", r"C:\m0", false).await.unwrap();
    control_plane.fail_times(
        1,
        request_of(ResourceType::MappedVirtualDisk, RequestType::Remove),
    );

    assert!(vm.detach_scsi(r"C:\a.vhdx").await.is_err());
    assert_eq!(vm.scsi_slots_in_use().await, 1);

    vm.detach_scsi(r"C:\a.vhdx").await.unwrap();
    assert_eq!(vm.scsi_slots_in_use().await, 0);
}

#[tokio::test]
async fn test_detach_unknown_disk() {
    let (vm, control_plane) = windows_vm(1);

    assert!(vm.detach_scsi(r"C:\nope.vhdx").await.unwrap_err().is_not_found());
    assert!(control_plane.requests().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_attach_queued_behind_terminate_is_refused() {
    let control_plane = Arc::new(RecordingControlPlane::with_delay(Duration::from_millis(100)));
    let vm = Arc::new(
        HostingVm::builder(GuestOs::Windows)
            .control_plane(control_plane.clone())
            .build()
            .expect("valid config"),
    );

    let first = tokio::spawn({
        let vm = vm.clone();
        async move { vm.attach_scsi(r"C:\a.vhdx", r"C:\m0", false).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let terminate = tokio::spawn({
        let vm = vm.clone();
        async move { vm.terminate().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = vm.attach_scsi(r"C:\b.vhdx", r"C:\m1", false).await;

    first.await.unwrap().unwrap();
    terminate.await.unwrap();
    assert!(matches!(second, Err(Error::NotRunning(_))));
    assert_eq!(vm.scsi_slots_in_use().await, 1);
    assert_eq!(control_plane.requests().len(), 1);
}
