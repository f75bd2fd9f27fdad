use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::consts::Pid;
use crate::traffic::TrafficPolicy;

use super::core::Process;

impl Process {
    /// Long-running loop of one process.
    ///
    /// Each iteration: maybe send one message (as decided by `traffic`), sleep
    /// a random interval within `send_interval`, then drain every inbound
    /// channel once. `stop` is checked only at the top of an iteration.
    pub fn run_process_loop(
        &self,
        peers: &[Pid],
        stop: &AtomicBool,
        send_interval: (Duration, Duration),
        traffic: &dyn TrafficPolicy,
        rng: &mut StdRng,
    ) {
        let targets: Vec<Pid> = peers.iter().copied().filter(|&p| p != self.pid()).collect();
        let (lo, hi) = send_interval;
        let hi = hi.max(lo);

        let mut iterations = 0u64;
        while !stop.load(Ordering::Relaxed) {
            if let Some((to, payload)) = traffic.next_message(self.pid(), &targets, rng) {
                self.send_message(to, payload);
            }
            std::thread::sleep(rng.gen_range(lo..=hi));
            self.receive_from_all_in_channels();
            iterations += 1;
        }
        debug!("process {} loop stopped after {} iteration(s)", self.pid(), iterations);
    }
}
