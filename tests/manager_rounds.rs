use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use SnapNet::{audit, Phase, Pid, Process, SnapshotManager, Topology};

fn network(n: Pid, topology: Topology) -> Result<(BTreeMap<Pid, Arc<Process>>, SnapshotManager)> {
    let procs: BTreeMap<Pid, Arc<Process>> =
        (1..=n).map(|pid| (pid, Arc::new(Process::new(pid)))).collect();
    topology.wire(&procs)?;
    for (pid, p) in &procs {
        p.update_state(i64::from(*pid) * 10);
    }
    let mgr = SnapshotManager::new(procs.clone());
    Ok((procs, mgr))
}

fn drain_all(procs: &BTreeMap<Pid, Arc<Process>>) {
    while procs.values().map(|p| p.receive_from_all_in_channels()).sum::<usize>() > 0 {}
}

#[test]
fn rounds_are_numbered_and_closed_by_complete() -> Result<()> {
    let (procs, mgr) = network(5, Topology::RingWithSkip)?;
    assert_eq!(mgr.current_round(), 0);
    assert!(!mgr.round_open());

    for expected in 1..=3u64 {
        let starter = (expected as Pid % 5) + 1;
        assert_eq!(mgr.initiate_snapshot(starter)?, expected);
        assert!(mgr.round_open());
        drain_all(&procs);
        let snap = mgr.complete_round()?;
        assert_eq!(snap.round, expected);
        assert_eq!(snap.initiator, starter);
        assert_eq!(snap.total_state(), 150);
        assert!(audit(&snap).is_empty());
        assert!(!mgr.round_open());
    }
    Ok(())
}

#[test]
fn initiation_is_rejected_while_a_round_is_in_flight() -> Result<()> {
    let (procs, mgr) = network(4, Topology::Ring)?;
    mgr.initiate_snapshot(1)?;
    assert_eq!(mgr.phases()[&1], Phase::Recording);

    let err = mgr.initiate_snapshot(2).unwrap_err();
    assert!(err.to_string().contains("still in flight"), "{err:#}");
    assert_eq!(mgr.current_round(), 1);
    // отказ не трогает уже записанное состояние
    assert!(procs[&1].has_recorded_state());

    drain_all(&procs);
    assert!(mgr.is_quiescent());
    // раунд не закрыт, но завершён: новый раунд разрешён
    assert_eq!(mgr.initiate_snapshot(2)?, 2);
    drain_all(&procs);
    mgr.complete_round()?;
    Ok(())
}

#[test]
fn abandoned_round_unblocks_the_next_initiation() -> Result<()> {
    let (procs, mgr) = network(3, Topology::Complete)?;
    mgr.initiate_snapshot(3)?;

    let err = mgr
        .wait_for_quiescence(Duration::from_millis(30), None)
        .unwrap_err();
    assert!(err.to_string().contains("did not quiesce"), "{err:#}");

    mgr.abandon_round();
    assert!(!mgr.round_open());
    assert!(mgr.complete_round().is_err(), "abandoned round cannot be completed");

    // Маркеры прошлого раунда дренируются старым раундом (без дренажа см. ниже).
    drain_all(&procs);
    assert_eq!(mgr.initiate_snapshot(1)?, 2);
    drain_all(&procs);
    let snap = mgr.complete_round()?;
    assert_eq!(snap.initiator, 1);
    assert!(audit(&snap).is_empty());
    Ok(())
}

#[test]
fn wait_for_quiescence_honours_cancel_flag() -> Result<()> {
    let (_procs, mgr) = network(3, Topology::Ring)?;
    mgr.initiate_snapshot(1)?;
    let cancel = AtomicBool::new(true);
    let err = mgr
        .wait_for_quiescence(Duration::from_secs(10), Some(&cancel))
        .unwrap_err();
    assert!(err.to_string().contains("interrupted"), "{err:#}");
    Ok(())
}

#[test]
fn unknown_initiator_and_premature_completion_fail() -> Result<()> {
    let (procs, mgr) = network(3, Topology::Ring)?;
    assert!(mgr.initiate_snapshot(42).is_err());
    assert_eq!(mgr.current_round(), 0);

    let err = mgr.complete_round().unwrap_err();
    assert!(err.to_string().contains("no snapshot round is open"));

    mgr.initiate_snapshot(2)?;
    let err = mgr.complete_round().unwrap_err();
    assert!(err.to_string().contains("has not quiesced"), "{err:#}");

    drain_all(&procs);
    mgr.complete_round()?;
    assert!(mgr.complete_round().is_err(), "round closed twice");
    Ok(())
}

#[test]
fn reset_is_idempotent_and_returns_everyone_to_idle() -> Result<()> {
    let (procs, mgr) = network(4, Topology::Complete)?;
    procs[&1].send_message(2, "x");
    mgr.initiate_snapshot(2)?;
    procs[&3].send_message(4, "y");
    drain_all(&procs);
    mgr.complete_round()?;

    for _ in 0..2 {
        mgr.reset_all_processes();
        for p in procs.values() {
            assert_eq!(p.phase(), Phase::Idle);
            assert!(!p.has_recorded_state());
            assert_eq!(p.marker_count(), 0);
            assert_eq!(p.recorded_state(), 0);
            let r = p.get_snapshot_result();
            assert!(r.in_channels.values().all(|log| log.is_empty()));
            assert!(r.sent.is_empty() && r.received.is_empty());
            for from in p.in_peers() {
                assert!(!p.in_channel(from).expect("edge").is_recording());
            }
        }
    }
    // живое состояние reset не трогает
    assert_eq!(procs[&2].state(), 21);
    assert_eq!(procs[&4].state(), 41);
    Ok(())
}

#[test]
fn disconnected_process_blocks_quiescence() -> Result<()> {
    // 4 is wired to nobody: it never sees a marker unless it initiates.
    let (_procs, mgr) = network(4, Topology::Custom(vec![(1, 2), (2, 3), (3, 1)]))?;
    mgr.initiate_snapshot(1)?;
    assert_eq!(mgr.phases()[&4], Phase::Idle);
    assert!(mgr.wait_for_quiescence(Duration::from_millis(20), None).is_err());
    mgr.abandon_round();

    let (_procs, mgr) = network(4, Topology::Custom(vec![(1, 2), (2, 3), (3, 1)]))?;
    mgr.initiate_snapshot(4)?;
    assert_eq!(mgr.phases()[&4], Phase::Done);
    Ok(())
}

#[test]
fn leftover_markers_of_abandoned_round_do_not_leak_into_the_next() -> Result<()> {
    let (procs, mgr) = network(3, Topology::Ring)?;
    mgr.initiate_snapshot(1)?;
    assert!(mgr.wait_for_quiescence(Duration::from_millis(5), None).is_err());
    mgr.abandon_round();

    // Без дренажа: маркеры раунда 1 всё ещё в каналах 1->2 и 1->3.
    assert!(!procs[&1].out_channel(2).expect("edge").is_empty());
    assert_eq!(mgr.initiate_snapshot(2)?, 2);
    procs[&1].send_message(3, "x");
    drain_all(&procs);

    for p in procs.values() {
        assert_eq!(p.round(), 2);
        assert_eq!(p.marker_count(), p.in_peers().len(), "pid {}", p.pid());
    }
    let snap = mgr.complete_round()?;
    assert_eq!(snap.round, 2);
    assert_eq!(snap.initiator, 2);
    assert!(audit(&snap).is_empty(), "{:?}", audit(&snap));
    assert!(SnapNet::metrics::snapshot().markers_stale >= 2);
    Ok(())
}

#[test]
fn plain_reset_parks_processes_outside_any_round() -> Result<()> {
    let (procs, mgr) = network(3, Topology::Ring)?;
    mgr.initiate_snapshot(3)?;
    mgr.abandon_round();
    mgr.reset_all_processes();

    // маркеры раунда 1 после reset ни на что не влияют
    drain_all(&procs);
    assert!(procs.values().all(|p| p.phase() == Phase::Idle && p.marker_count() == 0));
    assert!(procs.values().all(|p| p.round() == 0));
    Ok(())
}
