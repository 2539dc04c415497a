// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node catalogs for the two editors.

pub mod blueprint;
pub mod material;
