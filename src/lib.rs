// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! melodygen - front end for melody RNN generation.
//!
//! Reads defaults from a TOML file, collects generation parameters from a
//! terminal form or the command line, and writes `output_1.mid` through
//! `output_N.mid` using an external melody model.

pub mod bundle;
pub mod config;
pub mod generator;
pub mod pipeline;
pub mod request;
pub mod sequence;
pub mod ui;
