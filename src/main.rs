// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use feeclip::{cli, commands, db};

fn main() -> Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let mut conn = db::open_or_init()?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path()?.display());
        }
        Some(("rule", sub)) => commands::rules::handle(&conn, sub)?,
        Some(("vat", sub)) => commands::vat::handle(&conn, sub)?,
        Some(("credit", sub)) => commands::credits::handle(&conn, sub)?,
        Some(("track", sub)) => commands::tracks::handle(&conn, sub)?,
        Some(("agreement", sub)) => commands::agreements::handle(&conn, sub)?,
        Some(("contribution", sub)) => commands::contributions::handle(&conn, sub)?,
        Some(("import", sub)) => commands::importer::handle(&mut conn, sub)?,
        Some(("run", sub)) => commands::calculate::handle(&mut conn, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, sub)?,
        Some(("doctor", _)) => commands::doctor::handle(&conn)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
