// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay plugins`: list registered backends

use anyhow::Result;
use relay_plugins::plugin_registry;

pub fn run() -> Result<i32> {
    let registry = plugin_registry();

    println!("engines:");
    for backend in registry.engines() {
        match (&backend.cli_cmd, &backend.install_cmd) {
            (Some(cli), Some(install)) => {
                println!("  {} (cli: {cli}, install: {install})", backend.id)
            }
            (Some(cli), None) => println!("  {} (cli: {cli})", backend.id),
            _ => println!("  {}", backend.id),
        }
    }

    println!("transports:");
    for id in registry.transport_ids() {
        println!("  {id}");
    }

    let commands = registry.command_backends();
    if commands.is_empty() {
        println!("commands: (none)");
    } else {
        println!("commands:");
        for id in commands.keys() {
            println!("  {id}");
        }
    }

    let errors = registry.errors();
    if !errors.is_empty() {
        println!("errors:");
        for error in errors {
            println!("  {error}");
        }
    }
    Ok(0)
}
