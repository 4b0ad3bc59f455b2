// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use glyphidx::cli::{run, Cli};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
