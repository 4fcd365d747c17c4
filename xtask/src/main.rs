use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for lumen")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq, Debug)]
enum Commands {
    /// Run all checks: fmt, clippy, tests, doc
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Build the entire workspace
    Build,
    /// Run the headless CLI end to end
    Smoke,
}

/// One cargo invocation.
struct Step {
    banner: &'static str,
    args: &'static [&'static str],
}

const FMT: Step = Step {
    banner: "cargo fmt --check",
    args: &["fmt", "--all", "--", "--check"],
};
const CLIPPY: Step = Step {
    banner: "cargo clippy",
    args: &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
};
const TEST: Step = Step {
    banner: "cargo test",
    args: &["test", "--workspace"],
};
const DOC: Step = Step {
    banner: "cargo doc",
    args: &["doc", "--workspace", "--no-deps"],
};
const BUILD: Step = Step {
    banner: "cargo build",
    args: &["build", "--workspace"],
};
const SMOKE_SIMULATE: Step = Step {
    banner: "lumen-cli simulate",
    args: &["run", "-p", "lumen-cli", "--", "simulate", "--frames", "120"],
};
const SMOKE_RENDER: Step = Step {
    banner: "lumen-cli render (forward)",
    args: &["run", "-p", "lumen-cli", "--", "render", "--mode", "forward", "--width", "64", "--height", "48"],
};
const SMOKE_RENDER_DEFERRED: Step = Step {
    banner: "lumen-cli render (deferred)",
    args: &["run", "-p", "lumen-cli", "--", "render", "--mode", "deferred", "--width", "64", "--height", "48"],
};

fn steps(command: Commands) -> &'static [Step] {
    match command {
        Commands::Check => &[FMT, CLIPPY, TEST, DOC],
        Commands::Fmt => &[FMT],
        Commands::Clippy => &[CLIPPY],
        Commands::Test => &[TEST],
        Commands::Doc => &[DOC],
        Commands::Build => &[BUILD],
        Commands::Smoke => &[SMOKE_SIMULATE, SMOKE_RENDER, SMOKE_RENDER_DEFERRED],
    }
}

fn run(step: &Step) -> Result<()> {
    println!("==> Running {}", step.banner);
    let status = Command::new("cargo").args(step.args).status()?;
    if !status.success() {
        anyhow::bail!("{} failed", step.banner);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    for step in steps(cli.command) {
        run(step)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_runs_every_static_gate() {
        let banners: Vec<_> = steps(Commands::Check).iter().map(|s| s.banner).collect();
        assert_eq!(
            banners,
            ["cargo fmt --check", "cargo clippy", "cargo test", "cargo doc"]
        );
    }

    #[test]
    fn smoke_drives_the_cli() {
        assert!(
            steps(Commands::Smoke)
                .iter()
                .all(|s| s.args.starts_with(&["run", "-p", "lumen-cli"]))
        );
    }
}
