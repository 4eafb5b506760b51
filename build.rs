// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("fluentorm")
        .version(env!("CARGO_PKG_VERSION"))
        .author("FluentORM Contributors")
        .about("Schema-first PostgreSQL code generation and migration toolchain")
        .subcommand_required(false)
        .subcommand(
            Command::new("generate")
                .about("Merge schema fragments, diff against the prior snapshot, and emit migrations")
                .arg(
                    Arg::new("schemas_dir")
                        .long("schemas-dir")
                        .value_name("PATH")
                        .default_value("./schemas")
                        .help("Directory of schema fragment files"),
                )
                .arg(
                    Arg::new("snapshot")
                        .long("snapshot")
                        .value_name("PATH")
                        .default_value(".fluent_snapshot.json")
                        .help("Snapshot file path"),
                )
                .arg(
                    Arg::new("migrations_dir")
                        .long("migrations-dir")
                        .value_name("PATH")
                        .default_value("./migrations")
                        .help("Directory to write migration files into"),
                )
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(clap::ArgAction::SetTrue)
                        .help("Print the change set without writing any files"),
                ),
        )
        .subcommand(
            Command::new("up")
                .about("Apply all pending migrations")
                .arg(
                    Arg::new("migrations_dir")
                        .long("migrations-dir")
                        .value_name("PATH")
                        .default_value("./migrations")
                        .help("Directory to read migration files from"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("List applied and pending migrations")
                .arg(
                    Arg::new("migrations_dir")
                        .long("migrations-dir")
                        .value_name("PATH")
                        .default_value("./migrations")
                        .help("Directory to read migration files from"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(clap::ArgAction::SetTrue)
                        .help("Emit machine-readable JSON instead of a table"),
                ),
        )
        .subcommand(
            Command::new("down")
                .about("Roll back the most recently applied migration")
                .arg(
                    Arg::new("migrations_dir")
                        .long("migrations-dir")
                        .value_name("PATH")
                        .default_value("./migrations")
                        .help("Directory to read migration files from"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();

    let man = Man::new(cmd.clone());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");
    let man_path = man_dir.join("fluentorm.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
    println!("cargo:warning=Man page generated at {}", man_path.display());

    for sub in cmd.get_subcommands() {
        let full_name = format!("fluentorm-{}", sub.get_name());
        let man = Man::new(sub.clone().name(full_name.clone()));
        let mut buffer = Vec::new();
        man.render(&mut buffer).expect("Failed to render man page");
        let man_path = man_dir.join(format!("{full_name}.1"));
        fs::write(&man_path, buffer).expect("Failed to write man page");
    }
}
