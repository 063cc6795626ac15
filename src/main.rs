use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use attestation_proof::{artifact_file_name, KdfParams, ProofManager, ProofVerifier};
use clap::{Args, Parser, Subcommand};
use remote_attestation::{
    AttestationConfig, AttestationCoordinator, AttestationResponse, DcapBackend,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "secretgpt-attest", version, about = "Dual-VM TDX attestation and proof artifacts")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(flatten)]
    endpoints: EndpointArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct EndpointArgs {
    /// Attestation endpoint of this VM
    #[arg(long, global = true, env = "SECRETGPT_ATTESTATION_ENDPOINT")]
    self_endpoint: Option<Url>,

    /// Attestation endpoint of the inference VM
    #[arg(long, global = true, env = "SECRET_AI_ATTESTATION_ENDPOINT")]
    remote_endpoint: Option<Url>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch and verify attestation quotes
    #[command(subcommand)]
    Attest(AttestCommand),
    /// Generate or verify proof artifacts
    #[command(subcommand)]
    Proof(ProofCommand),
}

#[derive(Debug, Subcommand)]
enum AttestCommand {
    /// Attest this VM
    #[command(name = "self")]
    SelfVm,
    /// Attest the inference VM
    Remote,
    /// Attest both VMs
    Dual,
}

#[derive(Debug, Subcommand)]
enum ProofCommand {
    /// Attest both VMs and seal the exchange into an artifact
    Generate {
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
        #[arg(long, env = "PROOF_PASSPHRASE", hide_env_values = true)]
        passphrase: String,
        /// Directory the artifact is written to
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        /// scrypt cost, log2 of N
        #[arg(long)]
        kdf_log_n: Option<u8>,
    },
    /// Open an artifact and check its consistency
    Verify {
        file: PathBuf,
        #[arg(long, env = "PROOF_PASSPHRASE", hide_env_values = true)]
        passphrase: String,
        /// Also re-run vendor verification on the embedded quotes
        #[arg(long)]
        reverify: bool,
    },
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn load_config(endpoints: EndpointArgs) -> Result<AttestationConfig> {
    let mut config = AttestationConfig::from_env().context("invalid attestation configuration")?;
    if let Some(endpoint) = endpoints.self_endpoint {
        config.self_endpoint = endpoint;
    }
    if let Some(endpoint) = endpoints.remote_endpoint {
        config.remote_endpoint = endpoint;
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_attest(command: AttestCommand, coordinator: AttestationCoordinator) -> Result<()> {
    match command {
        AttestCommand::SelfVm => {
            let record = coordinator.get_self_attestation().await;
            print_json(&AttestationResponse::from(&record))
        }
        AttestCommand::Remote => {
            let record = coordinator.get_remote_attestation().await;
            print_json(&AttestationResponse::from(&record))
        }
        AttestCommand::Dual => {
            let result = coordinator.get_dual_attestation().await;
            print_json(&result)
        }
    }
}

async fn run_proof(command: ProofCommand, coordinator: AttestationCoordinator) -> Result<()> {
    match command {
        ProofCommand::Generate {
            question,
            answer,
            passphrase,
            output_dir,
            kdf_log_n,
        } => {
            let mut manager = ProofManager::new();
            if let Some(log_n) = kdf_log_n {
                manager = manager.with_kdf_params(KdfParams {
                    log_n,
                    ..KdfParams::default()
                })?;
            }
            let (artifact, attestation) = manager
                .generate_with_coordinator(&coordinator, &question, &answer, &passphrase)
                .await?;
            let path = output_dir.join(artifact_file_name(chrono::Utc::now()));
            let partial = path.with_extension("partial");
            tokio::fs::write(&partial, &artifact)
                .await
                .with_context(|| format!("failed to write {}", partial.display()))?;
            tokio::fs::rename(&partial, &path)
                .await
                .with_context(|| format!("failed to move artifact to {}", path.display()))?;
            info!(
                "Proof written to {} (dual attestation: {})",
                path.display(),
                attestation.dual_attestation()
            );
            println!("{}", path.display());
            Ok(())
        }
        ProofCommand::Verify {
            file,
            passphrase,
            reverify,
        } => {
            let artifact = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let verifier = ProofVerifier::new();
            let response = verifier.verify_response(&artifact, &passphrase);
            print_json(&response)?;
            if reverify {
                let Some(record) = response.proof_data else {
                    bail!("proof could not be opened, nothing to re-verify");
                };
                let library = coordinator.config().qvl_library.clone();
                let report = tokio::task::spawn_blocking(move || {
                    verifier.reverify_embedded_quotes(&record, Arc::new(DcapBackend::new(library)))
                })
                .await?;
                print_json(&report)?;
            }
            if !response.success {
                bail!("proof verification failed");
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = load_config(cli.endpoints)?;
    let coordinator = AttestationCoordinator::from_config(config)?;
    let outcome = match cli.command {
        Command::Attest(command) => run_attest(command, coordinator).await,
        Command::Proof(command) => run_proof(command, coordinator).await,
    };
    if let Err(e) = &outcome {
        error!("{e:#}");
    }
    outcome
}
