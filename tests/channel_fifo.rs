use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use oorandom::Rand64;

use SnapNet::channel::{Channel, Message};

#[test]
fn fifo_order_matches_send_order() {
    let ch = Channel::new();
    let sent: Vec<String> = (0..100).map(|i| format!("m{}", i)).collect();
    for m in &sent {
        ch.send(Message::app(m.clone()));
    }
    let mut got = Vec::new();
    while let Some(m) = ch.receive() {
        got.push(m.payload().expect("app message").to_string());
    }
    assert_eq!(got, sent);
    assert!(ch.receive().is_none(), "drained channel yields nothing");
}

#[test]
fn recording_matches_model_under_random_ops() {
    // Детерминированный генератор: send / receive / toggle в случайном порядке
    let mut rng = Rand64::new(0x5EED_CAFE_F00D_0001);
    let ch = Channel::new();

    let mut queue: VecDeque<Message> = VecDeque::new();
    let mut recording = false;
    let mut expected_log: Vec<String> = Vec::new();
    let mut counter = 0u64;

    for _ in 0..5_000 {
        match rng.rand_range(0..10) {
            0..=3 => {
                counter += 1;
                let m = Message::app(format!("p{}", counter));
                ch.send(m.clone());
                queue.push_back(m);
            }
            4 => {
                ch.send(Message::Marker(counter));
                queue.push_back(Message::Marker(counter));
            }
            5..=7 => {
                let got = ch.receive();
                let want = queue.pop_front();
                assert_eq!(got, want, "FIFO violated");
                if recording {
                    if let Some(Message::App(p)) = want {
                        expected_log.push(p);
                    }
                }
            }
            8 => {
                ch.start_recording();
                recording = true;
            }
            _ => {
                ch.stop_recording();
                recording = false;
            }
        }
        assert_eq!(ch.is_recording(), recording);
    }

    assert_eq!(ch.get_recorded_messages(), expected_log);
    assert_eq!(ch.len(), queue.len());
}

#[test]
fn concurrent_senders_keep_per_sender_order() {
    let ch = Arc::new(Channel::new());
    let per_sender = 2_000u32;

    let handles: Vec<_> = (0..2u32)
        .map(|s| {
            let ch = ch.clone();
            thread::spawn(move || {
                for i in 0..per_sender {
                    ch.send(Message::app(format!("{}:{}", s, i)));
                }
            })
        })
        .collect();

    // Читаем параллельно с записью
    let mut next = [0u32; 2];
    let mut total = 0u32;
    while total < 2 * per_sender {
        if let Some(m) = ch.receive() {
            let p = m.payload().expect("app");
            let (s, i) = p.split_once(':').expect("format");
            let s: usize = s.parse().expect("sender");
            let i: u32 = i.parse().expect("index");
            assert_eq!(i, next[s], "sender {} out of order", s);
            next[s] += 1;
            total += 1;
        } else {
            thread::yield_now();
        }
    }
    for h in handles {
        h.join().expect("sender thread");
    }
    assert!(ch.is_empty());
}

#[test]
fn recorded_log_is_stable_after_stop_and_clear_resets_it() {
    let ch = Channel::new();
    ch.start_recording();
    ch.send(Message::app("a"));
    ch.receive();
    ch.stop_recording();
    ch.send(Message::app("b"));
    ch.receive();
    assert_eq!(ch.get_recorded_messages(), vec!["a".to_string()]);

    ch.clear_recorded_messages();
    assert!(ch.get_recorded_messages().is_empty());
}
