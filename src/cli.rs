use crate::config::launcher::LauncherConfig;
use crate::config::types::DecodePolicy;
use crate::crypto::password::{decrypt_profile_password, encrypt_profile_password};
use crate::exec::spawn::spawn_session;
use crate::kernel::fork;
use crate::profile::launch::SessionLaunchProfile;
use crate::profile::transport::{read_profile, read_secret, write_profile, write_secret};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Launcher configuration file (defaults to ./session-launch.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt the password of a plaintext profile for transmission
    Encrypt {
        /// Profile JSON holding a plaintext password
        #[arg(long)]
        profile: PathBuf,
        /// File that receives the out-of-band ciphertext
        #[arg(long)]
        secret_out: PathBuf,
        /// Where to write the encrypted profile (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check that an encrypted profile and its ciphertext decrypt cleanly
    Decrypt {
        #[arg(long)]
        profile: PathBuf,
        /// File holding the out-of-band ciphertext
        #[arg(long)]
        secret: PathBuf,
    },
    /// Decode a profile and print it with secrets redacted
    Inspect {
        #[arg(long)]
        profile: PathBuf,
        /// Reject the profile on any field error
        #[arg(long)]
        strict: bool,
    },
    /// Start the session described by a profile and wait for it
    Launch {
        #[arg(long)]
        profile: PathBuf,
        /// Fail if a resource limit cannot be applied
        #[arg(long)]
        strict_limits: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<LauncherConfig> {
    let config = match path {
        Some(path) => LauncherConfig::load_from_file(path)?,
        None => LauncherConfig::load_default()?,
    };
    Ok(config)
}

fn open_profile(path: &Path, policy: DecodePolicy) -> Result<SessionLaunchProfile> {
    let file = File::open(path)
        .with_context(|| format!("failed to open profile {}", path.display()))?;
    let profile = read_profile(file, policy)
        .with_context(|| format!("failed to decode profile {}", path.display()))?;
    Ok(profile)
}

/// Entry point shared by the binary. Returns the process exit code.
pub fn run() -> Result<i32> {
    // Initialize structured logging
    env_logger::init();

    fork::init_thread_id()?;
    if let Err(e) = fork::setup_fork_handlers() {
        log::warn!("Continuing without fork tracking: {}", e);
    }

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Encrypt {
            profile,
            secret_out,
            out,
        } => {
            let mut launch_profile = open_profile(&profile, config.decode_policy)?;
            let encrypted_password = encrypt_profile_password(&mut launch_profile)
                .context("failed to encrypt profile password")?;
            write_secret(&secret_out, &encrypted_password, config.secret_file_mode)
                .with_context(|| format!("failed to write secret {}", secret_out.display()))?;

            match out {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    write_profile(BufWriter::new(file), &launch_profile)?;
                }
                None => write_profile(io::stdout().lock(), &launch_profile)?,
            }
            log::info!("Profile encrypted; ciphertext written to {}", secret_out.display());
            Ok(0)
        }
        Commands::Decrypt { profile, secret } => {
            let mut launch_profile = open_profile(&profile, config.decode_policy)?;
            let encrypted_password = read_secret(&secret)
                .with_context(|| format!("failed to read secret {}", secret.display()))?;
            decrypt_profile_password(&mut launch_profile, &encrypted_password)
                .context("failed to decrypt profile password")?;
            println!(
                "password recovered for {} ({} characters)",
                launch_profile.context.username,
                launch_profile.password.chars().count()
            );
            Ok(0)
        }
        Commands::Inspect { profile, strict } => {
            let policy = if strict {
                DecodePolicy::Strict
            } else {
                config.decode_policy
            };
            let launch_profile = open_profile(&profile, policy)?;
            println!("{:#?}", launch_profile);
            Ok(0)
        }
        Commands::Launch {
            profile,
            strict_limits,
        } => {
            let launch_profile = open_profile(&profile, config.decode_policy)?;
            let session = spawn_session(&launch_profile, strict_limits || config.strict_limits)?;
            log::debug!("Waiting for session pid {}", session.id());

            let output = session.wait_with_output()?;
            io::stdout().write_all(&output.stdout)?;
            io::stderr().write_all(&output.stderr)?;

            let code = output.status.code().unwrap_or(1);
            log::info!("Session exited with code {}", code);
            Ok(code)
        }
    }
}
