use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use dao_common::logging::init_logging;
use dao_common::utils::{format_timestamp, timestamp_secs};
use dao_common::{Address, ProposalId, Timestamp, TokenId};
use dao_config::DeploymentConfig;
use dao_credentials::MemoryCredentialRegistry;
use dao_governance::{
    CallContext, FinalizePolicy, GovernanceEngine, GovernanceState, Proposal, SharedOracleEngine,
};

mod store;

use store::StateFile;

/// Address of the registry kept inside the state file
const LOCAL_REGISTRY: Address = Address::new([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x0d, 0xa0,
]);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Deployment configuration file
    #[arg(long, global = true, default_value = "nation-dao.yaml")]
    config: PathBuf,

    /// State file holding proposals, votes and credentials
    #[arg(long, global = true, default_value = "nation-dao-state.json")]
    state: PathBuf,

    /// Address performing the action
    #[arg(long = "as", global = true)]
    caller: Option<Address>,

    /// Host time in unix seconds (defaults to the wall clock)
    #[arg(long, global = true)]
    at: Option<Timestamp>,

    /// Log level, overriding the configuration file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file and an empty state file
    Init {
        /// Administrator address
        #[arg(long)]
        administrator: Address,
        /// Credential registry address
        #[arg(long)]
        registry: Option<Address>,
        /// Default voting window in seconds
        #[arg(long)]
        voting_duration: Option<u64>,
        /// Who may finalize proposals (permissionless, administrator-only)
        #[arg(long)]
        finalize_policy: Option<FinalizePolicy>,
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
    /// Mint a governance credential (administrator only)
    Mint {
        owner: Address,
        token_id: TokenId,
    },
    /// Transfer a credential held by the caller
    Transfer {
        to: Address,
        token_id: TokenId,
    },
    /// Burn a credential held by the caller
    Burn {
        token_id: TokenId,
    },
    /// Create a proposal
    Propose {
        description: String,
        /// Voting window in seconds
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Vote on a proposal
    Vote {
        proposal_id: ProposalId,
        #[arg(value_enum)]
        choice: Choice,
    },
    /// Finalize a proposal whose voting window has closed
    Finalize {
        proposal_id: ProposalId,
    },
    /// Finalize every proposal whose voting window has closed
    FinalizeDue,
    /// Show a proposal
    Show {
        proposal_id: ProposalId,
    },
    /// Show the tally of a proposal
    Tally {
        proposal_id: ProposalId,
    },
    /// List all proposals
    List,
    /// Print the audit log as JSON lines
    Audit {
        /// Recompute the hash chain instead of printing it
        #[arg(long)]
        verify: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Choice {
    Yes,
    No,
}

/// Everything a command needs after startup
struct Host {
    engine: SharedOracleEngine<MemoryCredentialRegistry>,
    registry: Arc<MemoryCredentialRegistry>,
    state: StateFile,
    state_path: PathBuf,
    administrator: Address,
    caller: Option<Address>,
    now: Timestamp,
}

impl Host {
    fn caller(&self) -> Result<Address> {
        self.caller
            .ok_or_else(|| anyhow!("This command needs a caller, pass --as <address>"))
    }

    fn context(&self) -> Result<CallContext> {
        Ok(CallContext::new(self.caller()?, self.now))
    }

    fn governance(&self) -> &GovernanceState {
        &self.state.governance
    }

    async fn save(&mut self) -> Result<()> {
        self.state.registry = self
            .registry
            .snapshot()
            .context("Failed to snapshot credential registry")?;
        self.state.save(&self.state_path).await
    }
}

fn print_proposal(proposal: &Proposal, now: Timestamp) {
    println!("Proposal {}", proposal.id);
    println!("  description: {}", proposal.description);
    println!("  creator:     {}", proposal.creator);
    println!("  created:     {}", format_timestamp(proposal.created_at));
    println!("  closes:      {}", format_timestamp(proposal.closes_at));
    println!("  phase:       {}", dao_governance::lifecycle::phase(proposal, now));
    println!("  tally:       {} yes / {} no", proposal.tally.yes, proposal.tally.no);
    println!("  outcome:     {}", proposal.outcome);
    if let (Some(at), Some(by)) = (proposal.finalized_at, proposal.finalized_by) {
        println!("  finalized:   {} by {}", format_timestamp(at), by);
    }
}

async fn run_init(cli: &Cli, command: &Commands) -> Result<()> {
    let Commands::Init {
        administrator,
        registry,
        voting_duration,
        finalize_policy,
        force,
    } = command
    else {
        bail!("not an init command");
    };

    for path in [&cli.config, &cli.state] {
        if path.exists() && !force {
            bail!("{} already exists, pass --force to overwrite", path.display());
        }
    }

    let mut config = DeploymentConfig::new(registry.unwrap_or(LOCAL_REGISTRY), *administrator);
    if let Some(duration) = voting_duration {
        config.default_voting_duration = *duration;
    }
    if let Some(policy) = finalize_policy {
        config.finalize_policy = *policy;
    }
    config.validate().context("Invalid configuration")?;
    config
        .save_to_file(&cli.config)
        .with_context(|| format!("Failed to write {}", cli.config.display()))?;

    StateFile::default().save(&cli.state).await?;

    info!(
        "Initialized {} and {}",
        cli.config.display(),
        cli.state.display()
    );
    println!("Wrote {} and {}", cli.config.display(), cli.state.display());
    Ok(())
}

async fn start(cli: &Cli) -> Result<Host> {
    let config = DeploymentConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let log_level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_logging(&log_level, config.log_dir.as_deref().map(Path::new))
        .context("Failed to initialize logging")?;

    let state = StateFile::load(&cli.state).await?;
    let registry = Arc::new(MemoryCredentialRegistry::from_snapshot(state.registry.clone()));
    let engine = GovernanceEngine::with_oracle(config.to_governance_config(), registry.clone())
        .context("Failed to start governance engine")?;

    let now = cli.at.unwrap_or_else(timestamp_secs);
    debug!("Host time {} ({})", now, format_timestamp(now));

    Ok(Host {
        engine,
        registry,
        state,
        state_path: cli.state.clone(),
        administrator: config.administrator,
        caller: cli.caller,
        now,
    })
}

async fn run(cli: &Cli, host: &mut Host) -> Result<()> {
    match &cli.command {
        Commands::Init { .. } => bail!("already initialized"),
        Commands::Mint { owner, token_id } => {
            let caller = host.caller()?;
            if caller != host.administrator {
                bail!("Only the administrator {} may mint credentials", host.administrator);
            }
            host.registry.mint(*owner, *token_id)?;
            host.save().await?;
            println!("Minted credential {} to {}", token_id, owner);
        }
        Commands::Transfer { to, token_id } => {
            let caller = host.caller()?;
            host.registry.transfer(&caller, *to, *token_id)?;
            host.save().await?;
            println!("Transferred credential {} from {} to {}", token_id, caller, to);
        }
        Commands::Burn { token_id } => {
            let caller = host.caller()?;
            host.registry.burn(&caller, *token_id)?;
            host.save().await?;
            println!("Burned credential {}", token_id);
        }
        Commands::Propose {
            description,
            duration,
        } => {
            let ctx = host.context()?;
            let receipt = host.engine.create_proposal(
                &mut host.state.governance,
                &ctx,
                description,
                *duration,
            )?;
            host.save().await?;
            let proposal = host.engine.get_proposal(host.governance(), receipt.output)?;
            println!(
                "Created proposal {}, voting closes {}",
                receipt.output,
                format_timestamp(proposal.closes_at)
            );
        }
        Commands::Vote {
            proposal_id,
            choice,
        } => {
            let ctx = host.context()?;
            let support = matches!(choice, Choice::Yes);
            host.engine
                .cast_vote(&mut host.state.governance, &ctx, *proposal_id, support)?;
            host.save().await?;
            let tally = host.engine.get_tally(host.governance(), *proposal_id)?;
            println!(
                "Voted {} on proposal {} ({} yes / {} no)",
                if support { "yes" } else { "no" },
                proposal_id,
                tally.yes,
                tally.no
            );
        }
        Commands::Finalize { proposal_id } => {
            let ctx = host.context()?;
            let receipt = host
                .engine
                .finalize(&mut host.state.governance, &ctx, *proposal_id)?;
            host.save().await?;
            println!("Proposal {} {}", proposal_id, receipt.output);
        }
        Commands::FinalizeDue => {
            let ctx = host.context()?;
            let receipts = host.engine.finalize_due(&mut host.state.governance, &ctx)?;
            if receipts.is_empty() {
                println!("No proposals are due");
            } else {
                host.save().await?;
                for receipt in receipts {
                    let (proposal_id, outcome) = receipt.output;
                    println!("Proposal {} {}", proposal_id, outcome);
                }
            }
        }
        Commands::Show { proposal_id } => {
            let proposal = host.engine.get_proposal(host.governance(), *proposal_id)?;
            print_proposal(proposal, host.now);
        }
        Commands::Tally { proposal_id } => {
            let tally = host.engine.get_tally(host.governance(), *proposal_id)?;
            println!("{} yes / {} no", tally.yes, tally.no);
        }
        Commands::List => {
            let proposals = host.engine.list_proposals(host.governance());
            if proposals.is_empty() {
                println!("No proposals");
            }
            for proposal in proposals {
                println!(
                    "{:>4}  {:<9}  {:>4} yes {:>4} no  {}",
                    proposal.id,
                    dao_governance::lifecycle::phase(proposal, host.now).to_string(),
                    proposal.tally.yes,
                    proposal.tally.no,
                    proposal.description
                );
            }
        }
        Commands::Audit { verify } => {
            let audit = host.governance().audit();
            if *verify {
                host.engine
                    .verify_audit_log(host.governance())
                    .context("Audit log verification failed")?;
                println!(
                    "Audit log verified: {} records, head {}",
                    audit.len(),
                    audit.head_hash()
                );
            } else {
                for record in audit.iter() {
                    println!("{}", serde_json::to_string(record)?);
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Init { .. }) {
        let log_level = cli.log_level.as_deref().unwrap_or("info");
        init_logging(log_level, None).context("Failed to initialize logging")?;
        return run_init(&cli, &cli.command).await;
    }

    let mut host = start(&cli).await?;
    run(&cli, &mut host).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_vote_with_globals() {
        let cli = Cli::parse_from([
            "nation-dao",
            "vote",
            "3",
            "yes",
            "--as",
            "0x0000000000000000000000000000000000000001",
            "--at",
            "100",
        ]);

        assert_eq!(cli.caller, Some(Address::from_low_u64_be(1)));
        assert_eq!(cli.at, Some(100));
        assert!(matches!(
            cli.command,
            Commands::Vote {
                proposal_id: 3,
                choice: Choice::Yes
            }
        ));
    }

    #[test]
    fn test_parse_init_policy() {
        let cli = Cli::parse_from([
            "nation-dao",
            "init",
            "--administrator",
            "0x00000000000000000000000000000000000000aa",
            "--finalize-policy",
            "administrator-only",
        ]);

        match cli.command {
            Commands::Init {
                finalize_policy, ..
            } => assert_eq!(finalize_policy, Some(FinalizePolicy::AdministratorOnly)),
            _ => panic!("expected init"),
        }
    }

    #[test]
    fn test_bad_address_is_rejected() {
        assert!(Cli::try_parse_from(["nation-dao", "mint", "0x12", "1"]).is_err());
    }
}
