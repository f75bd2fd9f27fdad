//! Step-by-step protocol runs without process threads: the test decides
//! exactly which channel is polled when.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use SnapNet::channel::Message;
use SnapNet::{audit, Phase, Pid, Process, SnapshotManager};

/// Bidirectional cycle 1-2-3-1 with the given seed states.
fn cycle3(seeds: [i64; 3]) -> Result<(BTreeMap<Pid, Arc<Process>>, SnapshotManager)> {
    let procs: BTreeMap<Pid, Arc<Process>> =
        (1..=3).map(|pid| (pid, Arc::new(Process::new(pid)))).collect();
    procs[&1].connect_to(&procs[&2])?;
    procs[&2].connect_to(&procs[&3])?;
    procs[&3].connect_to(&procs[&1])?;
    for (pid, seed) in (1..=3).zip(seeds) {
        procs[&pid].update_state(seed);
    }
    let mgr = SnapshotManager::new(procs.clone());
    Ok((procs, mgr))
}

/// Poll every process until no channel has anything left.
fn drain_all(procs: &BTreeMap<Pid, Arc<Process>>) {
    loop {
        let taken: usize = procs.values().map(|p| p.receive_from_all_in_channels()).sum();
        if taken == 0 {
            break;
        }
    }
}

#[test]
fn quiet_cycle_records_seed_states_and_empty_channels() -> Result<()> {
    let (procs, mgr) = cycle3([10, 0, 0])?;

    let round = mgr.initiate_snapshot(1)?;
    assert_eq!(round, 1);
    drain_all(&procs);
    assert!(mgr.is_quiescent());

    let snap = mgr.complete_round()?;
    assert_eq!(snap.initiator, 1);
    let states: Vec<(Pid, i64)> = snap.processes.iter().map(|(p, r)| (*p, r.state)).collect();
    assert_eq!(states, vec![(1, 10), (2, 0), (3, 0)]);
    assert_eq!(snap.in_flight_count(), 0);
    for r in snap.processes.values() {
        assert_eq!(r.in_channels.len(), 2);
        assert!(r.in_channels.values().all(|log| log.is_empty()));
    }
    assert!(audit(&snap).is_empty());
    Ok(())
}

#[test]
fn message_in_flight_across_the_cut_lands_in_channel_log() -> Result<()> {
    let (procs, mgr) = cycle3([10, 0, 0])?;
    let (p1, p2, p3) = (&procs[&1], &procs[&2], &procs[&3]);

    // До снапшота: 2 -> 3 "early", 3 успевает его принять.
    p2.send_message(3, "early");
    assert_eq!(p3.receive_message(2), Some(Message::app("early")));
    assert_eq!(p3.state(), 1);

    mgr.initiate_snapshot(1)?;
    assert_eq!(p1.phase(), Phase::Recording);

    // 3 получает маркер от 1 и начинает запись.
    assert_eq!(p3.receive_message(1), Some(Message::Marker(1)));
    assert_eq!(p3.phase(), Phase::Recording);
    assert_eq!(p3.recorded_state(), 1);

    // 2 ещё не записал состояние: "late" — до среза 2, но после среза 3.
    p2.send_message(3, "late");

    // 2 получает маркер от 1, записывает состояние и шлёт маркеры.
    assert_eq!(p2.receive_message(1), Some(Message::Marker(1)));
    assert!(p2.has_recorded_state());

    // После среза 2: в снапшот попасть не должно.
    p2.send_message(3, "after");

    assert_eq!(p3.receive_message(2), Some(Message::app("late")));
    assert_eq!(p3.receive_message(2), Some(Message::Marker(1)));
    assert_eq!(p3.phase(), Phase::Done);
    assert_eq!(p3.receive_message(2), Some(Message::app("after")));

    drain_all(&procs);
    let snap = mgr.complete_round()?;

    assert_eq!(snap.channel(2, 3), Some(&["late".to_string()][..]));
    assert_eq!(snap.channel(1, 3), Some(&[][..]));
    assert_eq!(snap.in_flight_count(), 1);
    assert_eq!(snap.processes[&1].state, 10);
    assert_eq!(snap.processes[&2].state, 0);
    assert_eq!(snap.processes[&3].state, 1);
    // "late" и "after" всё равно применены к живому состоянию 3.
    assert_eq!(p3.state(), 3);
    assert!(audit(&snap).is_empty(), "{:?}", audit(&snap));
    Ok(())
}

#[test]
fn full_round_completes_with_one_marker_per_inbound_channel() -> Result<()> {
    let (procs, mgr) = cycle3([3, 4, 5])?;

    // Немного трафика в обе стороны до и во время раунда.
    procs[&1].send_message(2, "a");
    procs[&3].send_message(1, "b");
    mgr.initiate_snapshot(2)?;
    procs[&1].send_message(3, "c");
    procs[&3].send_message(2, "d");
    drain_all(&procs);

    assert!(mgr.is_quiescent());
    for p in procs.values() {
        assert!(p.has_recorded_state());
        assert_eq!(p.marker_count(), p.in_peers().len(), "pid {}", p.pid());
        for from in p.in_peers() {
            let ch = p.in_channel(from).expect("in channel");
            assert!(!ch.is_recording(), "{} -> {} still recording", from, p.pid());
            assert!(ch.is_empty());
        }
    }

    let snap = mgr.complete_round()?;
    assert!(audit(&snap).is_empty(), "{:?}", audit(&snap));
    Ok(())
}

#[test]
fn initiator_without_inbound_channels_is_done_immediately() {
    let lone = Process::new(7);
    lone.update_state(42);
    assert_eq!(lone.phase(), Phase::Idle);
    assert!(lone.take_snapshot());
    assert_eq!(lone.phase(), Phase::Done);
    assert_eq!(lone.get_snapshot_result().state, 42);
    // повторная инициация без reset ничего не делает
    assert!(!lone.take_snapshot());
}

#[test]
fn unknown_peer_is_a_silent_noop() -> Result<()> {
    let (procs, _mgr) = cycle3([0, 0, 0])?;
    procs[&1].send_message(99, "nowhere");
    assert_eq!(procs[&1].sent_to(99), 0);
    assert!(procs[&1].receive_message(99).is_none());
    assert!(procs[&1].receive_message(2).is_none(), "empty channel");
    Ok(())
}

#[test]
fn connect_rejects_self_and_duplicates() {
    let a = Process::new(1);
    let b = Process::new(2);
    assert!(a.connect_to(&a).is_err());
    a.connect_to(&b).expect("first connect");
    assert!(b.connect_to(&a).is_err(), "pair already connected");
    assert_eq!(a.out_peers(), vec![2]);
    assert_eq!(b.in_peers(), vec![1]);
}

#[test]
fn markers_never_change_state_and_messages_never_count_as_markers() -> Result<()> {
    let (procs, _mgr) = cycle3([0, 0, 0])?;
    let p1 = &procs[&1];
    let p2 = &procs[&2];

    p1.send_message(2, "x");
    p2.receive_message(1);
    assert_eq!(p2.state(), 1);
    assert_eq!(p2.marker_count(), 0);
    assert_eq!(p2.phase(), Phase::Idle);

    p1.out_channel(2).expect("edge").send(Message::Marker(0));
    p2.receive_message(1);
    assert_eq!(p2.state(), 1);
    assert_eq!(p2.marker_count(), 1);

    p2.handle_message("ignored payload");
    assert_eq!(p2.state(), 2);
    Ok(())
}

#[test]
fn second_initiation_without_reset_leaves_stale_bookkeeping() -> Result<()> {
    let (procs, mgr) = cycle3([10, 0, 0])?;
    mgr.initiate_snapshot(1)?;
    drain_all(&procs);
    mgr.complete_round()?;

    // Живое состояние меняется после раунда.
    procs[&1].send_message(2, "x");
    drain_all(&procs);
    assert_eq!(procs[&2].state(), 1);

    // В обход менеджера: без reset новый раунд не начинается...
    assert!(!procs[&2].take_snapshot());
    assert_eq!(procs[&2].recorded_state(), 0, "stale recorded_state");
    assert!(procs[&2].out_channel(3).expect("edge").is_empty(), "no markers sent");

    // ...а лишний маркер того же раунда переполняет marker_count.
    procs[&1].out_channel(2).expect("edge").send(Message::Marker(1));
    procs[&2].receive_message(1);
    assert_eq!(procs[&2].marker_count(), procs[&2].in_peers().len() + 1);
    Ok(())
}

#[test]
fn markers_of_another_round_are_dropped() -> Result<()> {
    let (procs, _mgr) = cycle3([5, 6, 7])?;
    for p in procs.values() {
        p.reset_protocol(4);
    }
    let p2 = &procs[&2];

    // маркеры прошлого и будущего раунда: потреблены, но не считаются
    procs[&1].out_channel(2).expect("edge").send(Message::Marker(3));
    procs[&3].out_channel(2).expect("edge").send(Message::Marker(5));
    assert_eq!(p2.receive_message(1), Some(Message::Marker(3)));
    assert_eq!(p2.receive_message(3), Some(Message::Marker(5)));
    assert_eq!(p2.marker_count(), 0);
    assert_eq!(p2.phase(), Phase::Idle);
    assert!(procs[&2].out_channel(1).expect("edge").is_empty(), "no markers forwarded");

    // маркер текущего раунда запускает правило 1
    procs[&1].out_channel(2).expect("edge").send(Message::Marker(4));
    p2.receive_message(1);
    assert_eq!(p2.round(), 4);
    assert_eq!(p2.marker_count(), 1);
    assert_eq!(p2.recorded_state(), 6);
    assert_eq!(
        procs[&2].out_channel(3).expect("edge").receive(),
        Some(Message::Marker(4))
    );
    Ok(())
}
