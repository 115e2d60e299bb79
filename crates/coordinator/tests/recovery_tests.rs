mod common;

use barge_core::ObjectId;
use common::{harness, test_bytes, upload_part};

#[tokio::test]
async fn test_recover_demotes_parts_lost_on_backend() {
    let h = harness().await;
    let object_id = ObjectId::from("obj-1");
    let content = test_bytes(2_048);
    let spec = h
        .coordinator
        .initiate_upload(&object_id, 2_048, true, None)
        .await
        .unwrap();

    for number in [1, 2] {
        let (md5, etag) = upload_part(&h, &spec, number, &content);
        h.coordinator
            .finalize_upload_part(&object_id, &spec.upload_id, number, &md5, &etag)
            .await
            .unwrap();
    }

    // Part 1 vanishes on the backend behind the coordinator's back.
    h.backend.drop_part(&spec.upload_id, 1);

    h.coordinator.recover(&object_id).await.unwrap();

    let progress = h
        .coordinator
        .get_upload_progress(&object_id, &spec.upload_id)
        .await
        .unwrap();
    assert_eq!(progress.completed_count(), 1);
    assert_eq!(progress.completed_parts[0].part_number, 2);
    assert!(!progress.parts[0].is_completed());
    assert!(progress.parts[1].is_completed());
}

#[tokio::test]
async fn test_recover_is_idempotent() {
    let h = harness().await;
    let object_id = ObjectId::from("obj-1");
    let content = test_bytes(2_048);
    let spec = h
        .coordinator
        .initiate_upload(&object_id, 2_048, true, None)
        .await
        .unwrap();
    let (md5, etag) = upload_part(&h, &spec, 2, &content);
    h.coordinator
        .finalize_upload_part(&object_id, &spec.upload_id, 2, &md5, &etag)
        .await
        .unwrap();

    h.coordinator.recover(&object_id).await.unwrap();
    h.coordinator.recover(&object_id).await.unwrap();

    let progress = h
        .coordinator
        .get_upload_progress(&object_id, &spec.upload_id)
        .await
        .unwrap();
    assert_eq!(progress.completed_count(), 1);
}

#[tokio::test]
async fn test_is_recoverable_requires_matching_size_and_progress() {
    let h = harness().await;
    let object_id = ObjectId::from("obj-1");
    let content = test_bytes(2_048);
    let spec = h
        .coordinator
        .initiate_upload(&object_id, 2_048, true, None)
        .await
        .unwrap();

    // No completed parts yet: nothing worth resuming.
    assert!(!h
        .coordinator
        .is_recoverable(&object_id, 2_048)
        .await
        .unwrap());

    let (md5, etag) = upload_part(&h, &spec, 1, &content);
    h.coordinator
        .finalize_upload_part(&object_id, &spec.upload_id, 1, &md5, &etag)
        .await
        .unwrap();

    assert!(h
        .coordinator
        .is_recoverable(&object_id, 2_048)
        .await
        .unwrap());

    // The local file changed size since the session was planned.
    assert!(!h
        .coordinator
        .is_recoverable(&object_id, 4_096)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_is_recoverable_for_unknown_object_is_false() {
    let h = harness().await;
    assert!(!h
        .coordinator
        .is_recoverable(&ObjectId::from("nobody"), 1_000)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_recover_after_total_backend_loss_leaves_no_completions() {
    let h = harness().await;
    let object_id = ObjectId::from("obj-1");
    let content = test_bytes(2_048);
    let spec = h
        .coordinator
        .initiate_upload(&object_id, 2_048, true, None)
        .await
        .unwrap();
    for number in [1, 2] {
        let (md5, etag) = upload_part(&h, &spec, number, &content);
        h.coordinator
            .finalize_upload_part(&object_id, &spec.upload_id, number, &md5, &etag)
            .await
            .unwrap();
    }
    h.backend.drop_part(&spec.upload_id, 1);
    h.backend.drop_part(&spec.upload_id, 2);

    assert!(!h
        .coordinator
        .is_recoverable(&object_id, 2_048)
        .await
        .unwrap());
    let progress = h
        .coordinator
        .get_upload_progress(&object_id, &spec.upload_id)
        .await
        .unwrap();
    assert_eq!(progress.completed_count(), 0);
}
