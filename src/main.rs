//! Gantry CLI - push-to-deploy for reverse-proxy configuration
//!
//! Usage: gantry <COMMAND>
//!
//! Commands:
//!   run     Post-receive trigger; reads ref updates from stdin
//!   deploy  Deploy the configured ref now
//!   plan    Preview what a deployment would change
//!   init    Create the bare repository and install the hook
//!   check   Verify the deployment environment

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use gantry::{Config, Materializer};

/// Gantry - push-to-deploy for reverse-proxy configuration
#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output NDJSON events
    #[arg(long, default_value = "false")]
    json: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file path (default /etc/gantry.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Post-receive trigger: deploy if the pushed refs include the deploy ref
    Run,

    /// Deploy the configured ref now, without reading stdin
    Deploy,

    /// Preview what a deployment would change, without touching destinations
    Plan,

    /// Create the bare repository, working tree, and post-receive hook
    Init {
        /// Overwrite an existing post-receive hook not managed by gantry
        #[arg(short, long)]
        force: bool,
    },

    /// Verify the deployment environment (exits non-zero on errors)
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Run => cmd_run(&config, cli.json, cli.verbose),
        Commands::Deploy => cmd_deploy(&config, cli.json, cli.verbose),
        Commands::Plan => cmd_plan(&config, cli.json),
        Commands::Init { force } => cmd_init(&config, force, cli.json),
        Commands::Check => cmd_check(&config, cli.json),
    }
}

fn cmd_run(config: &Config, json: bool, verbose: u8) -> Result<()> {
    let stdin = std::io::stdin();
    let updates = gantry::parse_ref_updates(stdin.lock())?;

    if !gantry::selects_deploy(&updates, &config.deploy.reference) {
        if json {
            let output = serde_json::json!({
                "event": "no_op",
                "reason": "deploy ref not updated",
                "deploy_ref": config.deploy.reference,
                "updated_refs": updates.iter().map(|u| u.name.as_str()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string(&output)?);
        } else {
            println!(
                "⏭  Push did not update {}; nothing to deploy",
                config.deploy.reference
            );
        }
        return Ok(());
    }

    cmd_deploy(config, json, verbose)
}

fn cmd_deploy(config: &Config, json: bool, verbose: u8) -> Result<()> {
    let work_tree = config.work_tree();

    if !json {
        println!("🚀 Gantry Deploy");
        if verbose > 0 {
            println!("Repo: {}", config.repo_path().display());
            println!("Tree: {}", work_tree.display());
            println!("Ref: {}", config.deploy.reference);
        }
    }

    let _lock = gantry::DeployLock::acquire(&work_tree)?;

    let repo = gantry::GitRepo::new(config.repo_path(), work_tree);
    let certs = gantry::ScriptCertAction::new(config.certificates.script.clone());
    let proxy = gantry::CommandProxy::new(
        config.commands.validate.clone(),
        config.commands.reload.clone(),
    );
    let deployment = gantry::Deployment::new(config, repo, certs, proxy);

    let result = deployment.run(|event| {
        if json {
            println!("{}", event.to_json());
        } else {
            print_event(&event);
        }
    });

    match result {
        Ok(outcome) => {
            if json {
                let output = serde_json::json!({
                    "event": "deploy_complete",
                    "revision": outcome.revision,
                    "state": outcome.state,
                    "written": outcome.activation.written.len(),
                    "deleted": outcome.activation.deleted.len(),
                    "unchanged": outcome.activation.unchanged.len(),
                });
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!("\n✅ Deployed {}", short_id(&outcome.revision));
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let output = serde_json::json!({
                    "event": "deploy_failed",
                    "message": e.to_string(),
                });
                println!("{}", serde_json::to_string(&output)?);
            } else {
                eprintln!("\n✗ Deployment failed: {e}");
            }
            std::process::exit(1);
        }
    }
}

fn cmd_plan(config: &Config, json: bool) -> Result<()> {
    let work_tree = config.work_tree();

    if !json {
        println!("📊 Gantry Plan");
        println!("Ref: {}", config.deploy.reference);
        println!();
    }

    let _lock = gantry::DeployLock::acquire(&work_tree)?;
    let repo = gantry::GitRepo::new(config.repo_path(), work_tree.clone());

    let revision = repo.resolve(&config.deploy.reference)?;
    repo.materialize(&config.deploy.reference)?;

    let plans = gantry::reconcile::preview(&work_tree, &config.sync)?;

    if json {
        for plan in &plans {
            let output = serde_json::json!({
                "event": "plan_entry",
                "source": plan.mapping.source.display().to_string(),
                "dest": plan.mapping.dest.display().to_string(),
                "action": match plan.action {
                    gantry::reconcile::PlannedAction::Sync => "sync",
                    gantry::reconcile::PlannedAction::SkipMissing => "skip_missing",
                },
                "deletions": plan.deletions.iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string(&output)?);
        }
        return Ok(());
    }

    let mut synced = 0;
    let mut skipped = 0;
    for plan in &plans {
        match plan.action {
            gantry::reconcile::PlannedAction::Sync => {
                synced += 1;
                println!(
                    "  ~ {} -> {}",
                    plan.mapping.source.display(),
                    plan.mapping.dest.display()
                );
                for deletion in &plan.deletions {
                    println!("    - {} (would be deleted)", deletion.display());
                }
            }
            gantry::reconcile::PlannedAction::SkipMissing => {
                skipped += 1;
                println!(
                    "  ⚠ {} missing; {} left untouched",
                    plan.mapping.source.display(),
                    plan.mapping.dest.display()
                );
            }
        }
    }

    println!();
    println!(
        "Summary: revision {}, {} to sync, {} skipped",
        short_id(&revision),
        synced,
        skipped
    );

    Ok(())
}

fn cmd_init(config: &Config, force: bool, json: bool) -> Result<()> {
    let repo_path = config.repo_path();
    let work_tree = config.work_tree();

    gantry::GitRepo::init_bare(&repo_path)?;
    std::fs::create_dir_all(&work_tree)?;

    let exe = std::env::current_exe()?;
    let outcome = gantry::hook::install_hook(&repo_path, &exe, force)?;

    if json {
        let output = serde_json::json!({
            "event": "init",
            "repo": repo_path.display().to_string(),
            "work_tree": work_tree.display().to_string(),
            "hook": match outcome {
                gantry::hook::InstallOutcome::Installed => "installed",
                gantry::hook::InstallOutcome::Replaced => "replaced",
            },
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("📦 Gantry Init");
        println!("  ✓ Bare repository: {}", repo_path.display());
        println!("  ✓ Working tree: {}", work_tree.display());
        match outcome {
            gantry::hook::InstallOutcome::Installed => {
                println!("  ✓ Installed post-receive hook");
            }
            gantry::hook::InstallOutcome::Replaced => {
                println!("  ✓ Replaced post-receive hook");
            }
        }
        println!();
        println!("Push to deploy: git push {} {}", repo_path.display(), config.deploy.reference);
    }

    Ok(())
}

fn cmd_check(config: &Config, json: bool) -> Result<()> {
    use gantry::doctor::{run_checks, CheckStatus};

    if !json {
        println!("🩺 Gantry Check");
        println!();
    }

    let report = run_checks(config);

    if json {
        let output = serde_json::json!({
            "event": "check",
            "passes": report.passes(),
            "warnings": report.warnings(),
            "errors": report.errors(),
            "success": report.is_success(),
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        for check in &report.checks {
            let icon = match check.status {
                CheckStatus::Pass => "✓",
                CheckStatus::Warning => "⚠",
                CheckStatus::Error => "✗",
            };
            println!("  {} {} - {}", icon, check.name, check.message);
        }

        println!();
        println!(
            "Summary: {} passed, {} warnings, {} errors",
            report.passes(),
            report.warnings(),
            report.errors()
        );
    }

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_event(event: &gantry::DeployEvent) {
    use gantry::DeployEvent;

    match event {
        DeployEvent::DeployStarted {
            reference,
            revision,
        } => {
            println!("📦 Deploying {} @ {}", reference, short_id(revision));
        }
        DeployEvent::CheckedOut => println!("  ✓ Checked out working tree"),
        DeployEvent::SourceMissing { source } => {
            println!("  ⚠ Source {source} missing; destination left untouched");
        }
        DeployEvent::Staged { synced, skipped } => {
            println!("  ✓ Staged {synced} entries ({skipped} skipped)");
        }
        DeployEvent::CertRan { script } => {
            println!("  ✓ Certificate script {script} completed");
        }
        DeployEvent::CertSkipped { script } => {
            println!("  ⚠ No certificate script at {script}; skipped");
        }
        DeployEvent::Validated => println!("  ✓ Configuration validated"),
        DeployEvent::ValidationFailed { diagnostics } => {
            eprintln!("  ✗ Validation failed:");
            for line in diagnostics.lines() {
                eprintln!("    {line}");
            }
        }
        DeployEvent::Activated {
            written,
            deleted,
            unchanged,
        } => {
            println!("  ✓ Activated: {written} written, {deleted} deleted, {unchanged} unchanged");
        }
        DeployEvent::Reloaded { .. } => println!("  ✓ Proxy reloaded"),
    }
}

fn short_id(revision: &str) -> &str {
    revision.get(..8).unwrap_or(revision)
}
