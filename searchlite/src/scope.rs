// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Request-scoped execution environment
//!
//! A [`Scope`] is an immutable chain of frames. Deriving a child pushes one
//! frame in front of the parent's chain and leaves the parent untouched, so a
//! single parent can be shared by any number of concurrent requests.
//!
//! Values are keyed by types implementing [`ScopeKey`]. A module that keeps
//! its key type private owns its slot outright: nothing else can read or
//! overwrite it.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Typed key for a value stored on a scope
pub trait ScopeKey: 'static {
    type Value: Send + Sync + 'static;
}

struct Frame {
    parent: Option<Arc<Frame>>,
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
}

/// Immutable, derivation-based execution scope
#[derive(Clone, Default)]
pub struct Scope {
    head: Option<Arc<Frame>>,
}

/// The scope deadline has passed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("deadline exceeded by {overrun:?}")]
pub struct DeadlineExceeded {
    pub overrun: Duration,
}

struct DeadlineKey;

impl ScopeKey for DeadlineKey {
    type Value = Instant;
}

impl Scope {
    /// Empty scope with no bindings
    pub fn root() -> Self {
        Self::default()
    }

    /// Derive a child scope on which `K` resolves to `value`
    pub fn with_value<K: ScopeKey>(&self, value: K::Value) -> Scope {
        Scope {
            head: Some(Arc::new(Frame {
                parent: self.head.clone(),
                key: TypeId::of::<K>(),
                value: Arc::new(value),
            })),
        }
    }

    /// Nearest value bound for `K`, walking from this scope towards the root
    pub fn value<K: ScopeKey>(&self) -> Option<&K::Value> {
        let key = TypeId::of::<K>();
        let mut current = self.head.as_deref();
        while let Some(frame) = current {
            if frame.key == key {
                return frame.value.downcast_ref::<K::Value>();
            }
            current = frame.parent.as_deref();
        }
        None
    }

    /// Whether any value is bound for `K`
    pub fn contains<K: ScopeKey>(&self) -> bool {
        self.value::<K>().is_some()
    }

    /// Number of frames between this scope and the root
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.head.as_deref();
        while let Some(frame) = current {
            depth += 1;
            current = frame.parent.as_deref();
        }
        depth
    }

    /// Derive a child scope that expires at `deadline`
    ///
    /// An existing earlier deadline stays in effect.
    pub fn with_deadline(&self, deadline: Instant) -> Scope {
        let effective = match self.deadline() {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        };
        self.with_value::<DeadlineKey>(effective)
    }

    /// Derive a child scope that expires `timeout` from now
    ///
    /// A timeout too large to represent leaves the scope's deadline as is.
    pub fn with_timeout(&self, timeout: Duration) -> Scope {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.value::<DeadlineKey>().copied()
    }

    /// Time left before the deadline, `None` if the scope has no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fail once the deadline has been reached
    pub fn check_deadline(&self) -> Result<(), DeadlineExceeded> {
        match self.deadline() {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    Err(DeadlineExceeded {
                        overrun: now.duration_since(deadline),
                    })
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("depth", &self.depth())
            .field("deadline", &self.deadline())
            .finish()
    }
}
