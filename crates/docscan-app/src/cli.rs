// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docscan_core::{Point, Quad};

#[derive(Debug, Parser)]
#[command(name = "docscan", version, about = "Detect, flatten, and assemble document photos into a PDF")]
pub struct Cli {
    /// JSON scanner configuration; unset fields keep their defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Turn one or more photos into a single PDF, one page per photo.
    Scan {
        /// Input images, in page order.
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Output PDF path.
        #[arg(short, long)]
        output: PathBuf,

        /// Use this quad for every page instead of detecting one:
        /// `ax,ay,bx,by,cx,cy,dx,dy` in image pixels.
        #[arg(long, value_parser = parse_quad, allow_hyphen_values = true)]
        quad: Option<Quad>,

        /// Width of each corrected page in pixels.
        #[arg(long)]
        width: Option<u32>,
    },

    /// Print the detected document boundary of an image as JSON.
    Detect { image: PathBuf },

    /// Print page count and page sizes of a PDF as JSON.
    Inspect { pdf: PathBuf },
}

/// Parse `ax,ay,bx,by,cx,cy,dx,dy`.
pub fn parse_quad(raw: &str) -> Result<Quad, String> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("invalid coordinate in {raw:?}: {err}"))?;
    match values.as_slice() {
        [ax, ay, bx, by, cx, cy, dx, dy] => Ok(Quad::new(
            Point::new(*ax, *ay),
            Point::new(*bx, *by),
            Point::new(*cx, *cy),
            Point::new(*dx, *dy),
        )),
        _ => Err(format!("expected 8 comma-separated numbers, got {}", values.len())),
    }
}
