// SPDX-License-Identifier: MIT

//! stratflow-rs: a human-in-the-loop, two-phase workflow orchestrator.
//!
//! The [`flow`] module is the generic kit: immutable state, the step
//! contract, the sequential pipeline runner, the interruptible graph engine,
//! and the session store. The [`intel`] module builds the strategic
//! intelligence product on top of it: the competitive-analysis and
//! audience-strategy pipelines, the master phase controller with its
//! checkpoint, the task executors and remote toolbox client, and the HTTP
//! front end.

pub mod flow;
pub mod intel;
