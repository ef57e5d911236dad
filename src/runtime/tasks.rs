//! Deferred work.
//!
//! `defer` enqueues a thunk and hands back a [`Deferred`]. Nothing runs
//! until someone awaits: `await` and the suite runner drive the FIFO queue
//! on the sandbox thread until the awaited value settles.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::runtime::value::Value;
use crate::SutraError;

#[derive(Clone)]
pub enum DeferredState {
    Pending,
    Fulfilled(Value),
    Rejected(Rc<SutraError>),
}

pub struct Deferred {
    state: RefCell<DeferredState>,
}

impl Deferred {
    pub fn pending() -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(DeferredState::Pending),
        })
    }

    pub fn state(&self) -> DeferredState {
        self.state.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        !matches!(*self.state.borrow(), DeferredState::Pending)
    }

    /// Settling is one-shot; later calls are ignored.
    pub fn settle(&self, outcome: DeferredState) {
        let mut state = self.state.borrow_mut();
        if matches!(*state, DeferredState::Pending) {
            *state = outcome;
        }
    }
}

pub enum Job {
    /// Call `thunk` with no arguments and settle `target` with the outcome.
    Run { thunk: Value, target: Rc<Deferred> },
    /// Copy `source`'s outcome into `target` once it settles.
    Follow {
        source: Rc<Deferred>,
        target: Rc<Deferred>,
    },
}

#[derive(Default)]
pub struct JobQueue {
    jobs: VecDeque<Job>,
}

impl JobQueue {
    pub fn push(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}
