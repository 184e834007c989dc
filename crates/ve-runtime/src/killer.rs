use crossbeam_channel::{bounded, Receiver, Sender};

pub fn destroy_channel() -> (DestroyHandle, DestroyListener) {
    let (destroy_tx, destroy_rx) = bounded(1);
    let (done_tx, done_rx) = bounded(0);
    (
        DestroyHandle {
            destroy: destroy_tx,
            done: done_rx,
        },
        DestroyListener {
            destroy: destroy_rx,
            done: done_tx,
        },
    )
}

// Owner side of a killer registration.
#[derive(Clone)]
pub struct DestroyHandle {
    destroy: Sender<()>,
    done: Receiver<()>,
}

impl DestroyHandle {
    pub fn signal(&self) {
        let _ = self.destroy.try_send(());
    }

    // Returns once the entity has shut down, whichever side triggered it.
    pub fn destroy(&self) {
        self.signal();
        let _ = self.done.recv();
    }

    pub fn is_done(&self) -> bool {
        matches!(
            self.done.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }
}

pub struct DestroyListener {
    pub(crate) destroy: Receiver<()>,
    pub(crate) done: Sender<()>,
}
