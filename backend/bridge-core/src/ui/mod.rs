//! UI context task queue.
//!
//! The UI surface owns exactly one thread. Anything that has to touch UI-owned
//! state (reply callbacks, log listeners) is wrapped in a closure and posted
//! through a [`UiContext`]; the thread that created the matching [`UiLoop`]
//! drains the queue and runs the closures in posting order.
//!
//! ```no_run
//! use bridge_core::ui;
//!
//! let (context, mut ui_loop) = ui::channel();
//! let worker = std::thread::spawn(move || {
//!     context.post(|| println!("running on the UI thread"));
//!     context.quit();
//! });
//! ui_loop.run_blocking();
//! worker.join().ok();
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::rc::Rc;
use std::thread::{self, ThreadId};

use log::{debug, trace};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

type UiTask = Box<dyn FnOnce() + Send + 'static>;

enum UiMessage {
    Run(UiTask),
    Quit,
}

/// Create a UI context bound to the calling thread.
///
/// The returned [`UiLoop`] must be driven from the same thread.
pub fn channel() -> (UiContext, UiLoop) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let owner = thread::current().id();

    debug!("UI context created for thread {:?}", owner);

    (
        UiContext { sender, owner },
        UiLoop {
            receiver,
            owner,
            quit_requested: false,
            _thread_bound: PhantomData,
        },
    )
}

/// Cloneable handle for posting work onto the UI thread from any thread.
#[derive(Clone)]
pub struct UiContext {
    sender: mpsc::UnboundedSender<UiMessage>,
    owner: ThreadId,
}

impl UiContext {
    /// Queue `task` to run on the UI thread.
    ///
    /// Returns `false` when the UI loop is gone; the task is dropped unrun.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender.send(UiMessage::Run(Box::new(task))).is_ok()
    }

    /// Ask the UI loop to return once it reaches this point in the queue.
    pub fn quit(&self) {
        if self.sender.send(UiMessage::Quit).is_err() {
            trace!("Quit posted after UI loop was dropped");
        }
    }

    /// Whether the caller is running on the thread that owns the UI loop.
    pub fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Whether the UI loop has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Receiving half of the UI task queue. Not `Send`: it stays on the UI thread.
pub struct UiLoop {
    receiver: mpsc::UnboundedReceiver<UiMessage>,
    owner: ThreadId,
    quit_requested: bool,
    _thread_bound: PhantomData<Rc<()>>,
}

impl UiLoop {
    /// Run every task that is already queued, without waiting.
    ///
    /// Returns the number of tasks executed. Stops early at a quit request.
    pub fn run_pending(&mut self) -> usize {
        let mut executed = 0;

        while !self.quit_requested {
            match self.receiver.try_recv() {
                Ok(message) => {
                    if self.handle(message) {
                        executed += 1;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        executed
    }

    /// Block the current thread running tasks until [`UiContext::quit`] is called
    /// or every context has been dropped.
    ///
    /// # Panics
    ///
    /// Panics if called from inside an async runtime; use [`UiLoop::run_until_quit`] there.
    pub fn run_blocking(&mut self) {
        while !self.quit_requested {
            match self.receiver.blocking_recv() {
                Some(message) => {
                    self.handle(message);
                }
                None => break,
            }
        }

        debug!("UI loop finished");
    }

    /// Async variant of [`UiLoop::run_blocking`].
    pub async fn run_until_quit(&mut self) {
        while !self.quit_requested {
            match self.receiver.recv().await {
                Some(message) => {
                    self.handle(message);
                }
                None => break,
            }
        }
    }

    /// Drive the UI queue while waiting for `future` to finish.
    ///
    /// This is how UI-side code awaits a reply that itself arrives through the queue.
    pub async fn run_until<F>(&mut self, future: F) -> F::Output
    where
        F: Future,
    {
        tokio::pin!(future);

        loop {
            tokio::select! {
                biased;

                output = &mut future => return output,

                message = self.receiver.recv(), if !self.quit_requested => match message {
                    Some(message) => {
                        self.handle(message);
                    }
                    None => return future.await,
                },
            }
        }
    }

    /// Whether a quit request has been processed.
    pub fn is_quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Returns true when a task was executed.
    fn handle(&mut self, message: UiMessage) -> bool {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "UI loop driven from a foreign thread"
        );

        match message {
            UiMessage::Run(task) => {
                task();
                true
            }
            UiMessage::Quit => {
                debug!("UI loop quit requested");
                self.quit_requested = true;
                false
            }
        }
    }
}
