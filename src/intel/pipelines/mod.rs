// SPDX-License-Identifier: MIT

//! The two concrete sub-pipelines of the master workflow

pub mod audience;
pub mod competitive;
