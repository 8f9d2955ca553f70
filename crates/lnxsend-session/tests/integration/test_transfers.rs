//! Transaction lifecycle tests
//!
//! Drives offers, links, decisions, pause/resume, cancellation and crash
//! recovery end to end through the session, asserting on the status
//! trail each transaction was announced moving through, the traffic the
//! fakes recorded, and the snapshots left on disk.

use lnxsend_core::domain::ids::{DeviceId, TransactionId, UserId};
use lnxsend_core::domain::status::{Role, TransactionStatus};
use lnxsend_core::domain::transaction::{TransactionKind, TransactionSnapshot};
use lnxsend_core::domain::user::User;
use lnxsend_core::ports::{
    AccountError, Notification, TransferError, TransferOutcome, TransferPhase,
};
use lnxsend_session::{SessionError, SessionEvent};
use lnxsend_store::SnapshotStore;

use crate::common;

#[tokio::test]
async fn test_offers_require_a_session() {
    let h = common::harness();

    let offer = h
        .session
        .send_files("bob@example.com", vec!["photo.jpg".to_string()], "")
        .await;
    assert!(matches!(offer, Err(SessionError::NotLoggedIn)));

    let link = h
        .session
        .create_link(vec!["photo.jpg".to_string()], "")
        .await;
    assert!(matches!(link, Err(SessionError::NotLoggedIn)));
    assert!(h.account.creates().is_empty());
}

#[tokio::test]
async fn test_ghost_offer_uploads_unattended() {
    let h = common::harness();
    h.engine.set_default_script(
        vec![TransferPhase::Transferring, TransferPhase::CloudBuffered],
        Ok(TransferOutcome::Finished),
    );
    common::login_ok(&h).await;
    let files = common::stage_files(h.home.path(), &[("photo.jpg", 100), ("notes.txt", 156)]);

    let id = h
        .session
        .send_files("ghost@example.com", files.clone(), "enjoy")
        .await
        .expect("offer accepted by server");

    let record = h.session.transaction(id).await.expect("record adopted");
    assert!(record.is_ghost);
    assert_eq!(record.total_size, 256);
    let creates = h.account.creates();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].recipient, "ghost@example.com");
    assert_eq!(creates[0].files, files);
    assert_eq!(creates[0].total_size, 256);

    // No acceptance step: the upload runs straight into cloud buffering.
    let terminal = h.session.join(id).await.expect("join");
    assert_eq!(terminal, TransactionStatus::Finished);
    assert_eq!(
        common::status_trail(&h.events, id),
        vec![
            TransactionStatus::Transferring,
            TransactionStatus::CloudBuffered,
            TransactionStatus::Finished,
        ]
    );
    common::wait_until("the terminal report", || {
        h.account
            .updates()
            .contains(&(id, TransactionStatus::Finished))
    })
    .await;

    let store = SnapshotStore::new(h.home.path(), h.account.self_user().id);
    let snapshots = store.load_all().await.expect("snapshots readable");
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].record.status, TransactionStatus::Finished);
    assert_eq!(h.session.progress(id).await.expect("progress"), 1.0);
}

#[tokio::test]
async fn test_offers_with_unreadable_files_are_rejected() {
    let h = common::harness();
    common::login_ok(&h).await;
    let missing = h
        .home
        .path()
        .join("nope.bin")
        .to_string_lossy()
        .into_owned();

    let offer = h
        .session
        .send_files("bob@example.com", vec![missing.clone()], "")
        .await;
    match offer {
        Err(SessionError::UnreadableFile { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected an unreadable-file error, got {other:?}"),
    }
    assert!(h.account.creates().is_empty());
    assert!(h.session.transactions().await.is_empty());
}

#[tokio::test]
async fn test_links_start_uploading_right_away() {
    let h = common::harness();
    common::login_ok(&h).await;
    let files = common::stage_files(h.home.path(), &[("deck.pdf", 512)]);

    let id = h
        .session
        .create_link(files, "quarterly deck")
        .await
        .expect("link created");

    let record = h.session.transaction(id).await.expect("record adopted");
    assert_eq!(record.kind, TransactionKind::Link);
    let url = record.share_link.expect("link URL assigned");
    assert!(url.starts_with("https://lnk.example/"));

    let terminal = h.session.join(id).await.expect("join");
    assert_eq!(terminal, TransactionStatus::Finished);
    assert_eq!(
        common::status_trail(&h.events, id),
        vec![TransactionStatus::Transferring, TransactionStatus::Finished]
    );
}

#[tokio::test]
async fn test_accepted_offer_connects_and_transfers() {
    let h = common::harness();
    let bob = User::new(UserId::new(), "Bob Friend", "bob");
    h.account.script_peer_recipient(&bob);
    common::login_ok(&h).await;
    let files = common::stage_files(h.home.path(), &[("archive.tar", 4096)]);

    let id = h
        .session
        .send_files("bob@example.com", files, "here you go")
        .await
        .expect("offer accepted by server");

    // A registered recipient must accept first; nothing runs yet.
    let record = h.session.transaction(id).await.expect("record adopted");
    assert_eq!(record.status, TransactionStatus::New);
    assert!(!record.is_ghost);
    assert!(h.engine.runs().is_empty());

    let mut accepted = record.clone();
    accepted.status = TransactionStatus::WaitingAccept;
    h.channel.push(Notification::PeerTransactionUpdate {
        record: accepted.clone(),
    });
    accepted.status = TransactionStatus::WaitingData;
    accepted.recipient_device_id = Some(DeviceId::new());
    h.channel
        .push(Notification::PeerTransactionUpdate { record: accepted });

    let terminal = h.session.join(id).await.expect("join");
    assert_eq!(terminal, TransactionStatus::Finished);
    assert_eq!(
        common::status_trail(&h.events, id),
        vec![
            TransactionStatus::WaitingAccept,
            TransactionStatus::WaitingData,
            TransactionStatus::Connecting,
            TransactionStatus::Transferring,
            TransactionStatus::Finished,
        ]
    );
    // The connecting promotion is local and reported upstream; the
    // server-pushed statuses are not echoed back.
    common::wait_until("the status reports", || {
        let updates = h.account.updates();
        updates.contains(&(id, TransactionStatus::Connecting))
            && updates.contains(&(id, TransactionStatus::Finished))
    })
    .await;
    assert!(!h
        .account
        .updates()
        .contains(&(id, TransactionStatus::WaitingData)));
}

#[tokio::test]
async fn test_ghost_claims_surface_recipient_changes() {
    let h = common::harness();
    let gate = h.engine.hold_default(vec![TransferPhase::Transferring]);
    common::login_ok(&h).await;
    let files = common::stage_files(h.home.path(), &[("mixtape.mp3", 2048)]);

    let id = h
        .session
        .send_files("ghost@example.com", files, "")
        .await
        .expect("offer accepted by server");
    common::wait_until("the upload to start", || h.engine.runs() == vec![id]).await;

    let claimer = User::new(UserId::new(), "Casey Claimed", "casey");
    let mut claimed = h.session.transaction(id).await.expect("record adopted");
    claimed.recipient_id = Some(claimer.id);
    claimed.is_ghost = false;
    h.channel
        .push(Notification::PeerTransactionUpdate { record: claimed });

    common::wait_until("the claim to land", || {
        h.events.contains(&SessionEvent::RecipientChanged {
            transaction_id: id,
            recipient_id: claimer.id,
        })
    })
    .await;
    let record = h.session.transaction(id).await.expect("record kept");
    assert!(!record.is_ghost);
    assert_eq!(record.recipient_id, Some(claimer.id));

    // The claim does not disturb the upload already in flight.
    gate.notify_one();
    let terminal = h.session.join(id).await.expect("join");
    assert_eq!(terminal, TransactionStatus::Finished);
}

#[tokio::test]
async fn test_accepting_an_offer_downloads_it() {
    let h = common::harness();
    let dave = User::new(UserId::new(), "Dave Sender", "dave");
    let offer = common::incoming_offer(&h.account, &dave);
    h.account.set_running_transactions(vec![offer.clone()]);
    common::login_ok(&h).await;

    h.session.accept(offer.id).await.expect("accept");

    assert_eq!(
        h.account.updates(),
        vec![(offer.id, TransactionStatus::WaitingData)]
    );
    let record = h.session.transaction(offer.id).await.expect("record kept");
    assert_eq!(record.status, TransactionStatus::WaitingData);
    assert_eq!(record.recipient_device_id, Some(h.account.device_id()));

    // The sender connects; the download starts on this device.
    let mut connecting = record;
    connecting.status = TransactionStatus::Connecting;
    h.channel
        .push(Notification::PeerTransactionUpdate { record: connecting });

    let terminal = h.session.join(offer.id).await.expect("join");
    assert_eq!(terminal, TransactionStatus::Finished);
    assert_eq!(h.engine.runs(), vec![offer.id]);
    assert_eq!(
        common::status_trail(&h.events, offer.id),
        vec![
            TransactionStatus::WaitingAccept,
            TransactionStatus::WaitingData,
            TransactionStatus::Connecting,
            TransactionStatus::Transferring,
            TransactionStatus::Finished,
        ]
    );
}

#[tokio::test]
async fn test_decision_preconditions_are_enforced() {
    let h = common::harness();
    let dave = User::new(UserId::new(), "Dave Sender", "dave");
    let bob = User::new(UserId::new(), "Bob Friend", "bob");
    let incoming = common::incoming_offer(&h.account, &dave);
    let outgoing = common::outgoing_offer(&h.account, &bob, TransactionStatus::WaitingAccept);
    h.account
        .set_running_transactions(vec![incoming.clone(), outgoing.clone()]);
    common::login_ok(&h).await;

    // Decisions belong to the recipient.
    let wrong = h.session.accept(outgoing.id).await.unwrap_err();
    assert!(matches!(
        wrong,
        SessionError::WrongSide {
            operation: "accept",
            expected: Role::Recipient,
        }
    ));
    let wrong = h.session.reject(outgoing.id).await.unwrap_err();
    assert!(matches!(wrong, SessionError::WrongSide { .. }));

    let unknown = h.session.accept(TransactionId::new()).await.unwrap_err();
    assert!(matches!(unknown, SessionError::UnknownTransaction(_)));

    // A settled transaction accepts no further decisions.
    h.session.reject(incoming.id).await.expect("reject");
    let settled = h.session.accept(incoming.id).await.unwrap_err();
    assert!(matches!(
        settled,
        SessionError::InvalidOperation {
            operation: "accept",
            status: TransactionStatus::Rejected,
        }
    ));

    // Delete only forgets settled transactions.
    let open = h.session.delete(outgoing.id).await.unwrap_err();
    assert!(matches!(
        open,
        SessionError::InvalidOperation {
            operation: "delete",
            status: TransactionStatus::WaitingAccept,
        }
    ));
}

#[tokio::test]
async fn test_pause_and_resume_round_trip() {
    let h = common::harness();
    let gate = h.engine.hold_default(vec![TransferPhase::Transferring]);
    common::login_ok(&h).await;
    let files = common::stage_files(h.home.path(), &[("backup.tar", 8192)]);

    let id = h
        .session
        .send_files("ghost@example.com", files, "")
        .await
        .expect("offer accepted by server");
    common::wait_until("the transfer to report", || {
        common::status_trail(&h.events, id).last() == Some(&TransactionStatus::Transferring)
    })
    .await;

    h.session.pause(id, true).await.expect("pause");
    assert_eq!(h.engine.pauses(), vec![(id, true)]);
    let store = SnapshotStore::new(h.home.path(), h.account.self_user().id);
    let snapshots = store.load_all().await.expect("snapshots readable");
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].paused);
    assert_eq!(snapshots[0].record.status, TransactionStatus::Paused);

    let again = h.session.pause(id, true).await.unwrap_err();
    assert!(matches!(
        again,
        SessionError::InvalidOperation {
            operation: "pause",
            status: TransactionStatus::Paused,
        }
    ));

    // Resuming goes back through connecting, never straight to finished.
    h.session.pause(id, false).await.expect("resume");
    assert_eq!(h.engine.pauses(), vec![(id, true), (id, false)]);
    gate.notify_one();
    let terminal = h.session.join(id).await.expect("join");
    assert_eq!(terminal, TransactionStatus::Finished);
    assert_eq!(
        common::status_trail(&h.events, id),
        vec![
            TransactionStatus::Transferring,
            TransactionStatus::Paused,
            TransactionStatus::Connecting,
            TransactionStatus::Finished,
        ]
    );
    let updates = h.account.updates();
    assert!(updates.contains(&(id, TransactionStatus::Paused)));
    assert!(updates.contains(&(id, TransactionStatus::Connecting)));
}

#[tokio::test]
async fn test_cancel_aborts_and_delete_forgets() {
    let h = common::harness();
    let _gate = h.engine.hold_default(vec![TransferPhase::Transferring]);
    common::login_ok(&h).await;
    let files = common::stage_files(h.home.path(), &[("huge.iso", 4096)]);

    let id = h
        .session
        .send_files("ghost@example.com", files, "")
        .await
        .expect("offer accepted by server");
    common::wait_until("the transferring report", || {
        h.account
            .updates()
            .contains(&(id, TransactionStatus::Transferring))
    })
    .await;

    // A cancellation the server never heard about must not apply locally.
    h.account
        .script_update_failure(AccountError::Network("timeout".into()));
    let refused = h.session.cancel(id, true).await.unwrap_err();
    assert!(matches!(refused, SessionError::Account(_)));
    let record = h.session.transaction(id).await.expect("record kept");
    assert_eq!(record.status, TransactionStatus::Transferring);
    assert!(h.engine.aborts().is_empty());

    // Reacting to a decision already settled on the server skips the RPC.
    h.session.cancel(id, false).await.expect("cancel");
    let record = h.session.transaction(id).await.expect("record kept");
    assert_eq!(record.status, TransactionStatus::Canceled);
    assert_eq!(h.engine.aborts(), vec![id]);

    let store = SnapshotStore::new(h.home.path(), h.account.self_user().id);
    assert_eq!(store.load_all().await.expect("snapshots").len(), 1);
    h.session.delete(id).await.expect("delete");
    assert!(h.session.transaction(id).await.is_none());
    assert!(store.load_all().await.expect("snapshots").is_empty());
}

#[tokio::test]
async fn test_snapshots_recover_after_a_restart() {
    let h = common::harness();
    let bob = User::new(UserId::new(), "Bob Friend", "bob");
    let mut record = common::outgoing_offer(&h.account, &bob, TransactionStatus::Paused);
    record.recipient_device_id = Some(DeviceId::new());
    let id = record.id;
    let mut snapshot = TransactionSnapshot::new(record);
    snapshot.paused = true;
    let store = SnapshotStore::new(h.home.path(), h.account.self_user().id);
    store.save(&snapshot).await.expect("seed snapshot");

    // The paused transfer survives the restart and stays paused.
    common::login_ok(&h).await;
    let recovered = h.session.transaction(id).await.expect("snapshot recovered");
    assert_eq!(recovered.status, TransactionStatus::Paused);
    assert!(h.engine.runs().is_empty());

    h.session.pause(id, false).await.expect("resume");
    let terminal = h.session.join(id).await.expect("join");
    assert_eq!(terminal, TransactionStatus::Finished);
    assert_eq!(h.engine.runs(), vec![id]);
    assert!(h.engine.pauses().contains(&(id, false)));
}

#[tokio::test]
async fn test_progress_is_clamped_and_defaulted() {
    let h = common::harness();
    let _gate = h.engine.hold_default(vec![TransferPhase::Transferring]);
    common::login_ok(&h).await;
    let files = common::stage_files(h.home.path(), &[("video.mkv", 1024)]);

    let id = h
        .session
        .send_files("ghost@example.com", files, "")
        .await
        .expect("offer accepted by server");
    common::wait_until("the transfer to report", || {
        common::status_trail(&h.events, id).last() == Some(&TransactionStatus::Transferring)
    })
    .await;

    // An engine with nothing to say yet reads as zero.
    assert_eq!(h.session.progress(id).await.expect("progress"), 0.0);
    h.engine.set_progress(id, 0.5);
    assert_eq!(h.session.progress(id).await.expect("progress"), 0.5);
    h.engine.set_progress(id, 1.7);
    assert_eq!(h.session.progress(id).await.expect("progress"), 1.0);

    // An idle transaction never consults the engine.
    let bob = User::new(UserId::new(), "Bob Friend", "bob");
    h.account.script_peer_recipient(&bob);
    let files = common::stage_files(h.home.path(), &[("paper.pdf", 64)]);
    let idle = h
        .session
        .send_files("bob@example.com", files, "")
        .await
        .expect("offer accepted by server");
    assert_eq!(h.session.progress(idle).await.expect("progress"), 0.0);

    let missing = h.session.progress(TransactionId::new()).await.unwrap_err();
    assert!(matches!(missing, SessionError::UnknownTransaction(_)));
}

#[tokio::test]
async fn test_engine_failures_mark_the_transaction_failed() {
    let h = common::harness();
    h.engine.set_default_script(
        vec![TransferPhase::Transferring],
        Err(TransferError::Resource("disk full".into())),
    );
    common::login_ok(&h).await;
    let files = common::stage_files(h.home.path(), &[("data.bin", 512)]);

    let id = h
        .session
        .send_files("ghost@example.com", files, "")
        .await
        .expect("offer accepted by server");

    let terminal = h.session.join(id).await.expect("join");
    assert_eq!(terminal, TransactionStatus::Failed);
    assert!(h.events.contains(&SessionEvent::StatusChanged {
        transaction_id: id,
        status: TransactionStatus::Failed,
        failure_reason: Some("resource error: disk full".to_string()),
    }));
    common::wait_until("the terminal report", || {
        h.account
            .updates()
            .contains(&(id, TransactionStatus::Failed))
    })
    .await;
    assert_eq!(h.session.progress(id).await.expect("progress"), 0.0);

    // One failed transfer does not end the session.
    assert!(h.session.is_logged_in());
}
