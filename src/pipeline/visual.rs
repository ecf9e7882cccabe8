// Steps are dispatched ahead of time, so the playhead can't just show the
// last dispatched step. Every dispatch goes through here with its audio
// time; the UI only shows a step once the audio clock has caught up.

use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualEvent {
    pub step: usize,
    pub block: usize,
    pub time: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum VisualMsg {
    Reset,
    Step(VisualEvent),
}

pub fn visual_channel() -> (VisualSender, VisualQueue) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (VisualSender { tx }, VisualQueue { rx, pending: VecDeque::new() })
}

/// Scheduler side.
#[derive(Clone, Debug)]
pub struct VisualSender {
    tx: Sender<VisualMsg>,
}

impl VisualSender {
    pub fn push(&self, event: VisualEvent) {
        let _ = self.tx.send(VisualMsg::Step(event)); // UI gone: nobody to show it to
    }

    /// Drops everything not yet shown, used on transport start.
    pub fn clear(&self) {
        let _ = self.tx.send(VisualMsg::Reset);
    }
}

/// UI side. FIFO; each event is handed out once.
#[derive(Debug)]
pub struct VisualQueue {
    rx: Receiver<VisualMsg>,
    pending: VecDeque<VisualEvent>,
}

impl VisualQueue {
    /// Consumes every event due at `now` and returns the latest of them.
    pub fn poll(&mut self, now: f64) -> Option<VisualEvent> {
        for msg in self.rx.try_iter() {
            match msg {
                VisualMsg::Reset => self.pending.clear(),
                VisualMsg::Step(e) => self.pending.push_back(e),
            }
        }
        let mut latest = None;
        while let Some(e) = self.pending.front().filter(|e| e.time <= now).copied() {
            self.pending.pop_front();
            latest = Some(e);
        }
        latest
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(step: usize, time: f64) -> VisualEvent {
        VisualEvent { step, block: 0, time }
    }

    #[test]
    fn events_wait_for_the_clock() {
        let (tx, mut q) = visual_channel();
        tx.push(ev(0, 0.10));
        tx.push(ev(1, 0.20));
        tx.push(ev(2, 0.30));
        assert_eq!(q.poll(0.05), None);
        assert_eq!(q.poll(0.25), Some(ev(1, 0.20)));
        assert_eq!(q.pending(), 1);
        assert_eq!(q.poll(0.25), None);
        assert_eq!(q.poll(1.0), Some(ev(2, 0.30)));
    }

    #[test]
    fn reset_drops_pending() {
        let (tx, mut q) = visual_channel();
        tx.push(ev(5, 0.5));
        tx.clear();
        tx.push(ev(0, 0.6));
        assert_eq!(q.poll(1.0), Some(ev(0, 0.6)));
        assert_eq!(q.pending(), 0);
    }
}
