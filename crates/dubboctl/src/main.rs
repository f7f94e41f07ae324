use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dubbo_manifest::ProfileStore;
use snafu::{ResultExt, Snafu};

mod logging;
mod manifest;
mod profile;

/// Filter directives for log output, for example `DUBBOCTL_LOG=debug`.
const LOG_ENV: &str = "DUBBOCTL_LOG";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    Logging { source: logging::Error },

    #[snafu(display("failed to run manifest command"))]
    Manifest { source: manifest::Error },

    #[snafu(display("failed to run profile command"))]
    Profile { source: profile::Error },
}

/// Resolves the values of a Dubbo control plane installation.
#[derive(Debug, Parser)]
#[command(version, about)]
enum Command {
    /// Commands related to the resolved values document.
    #[command(subcommand)]
    Manifest(ManifestCommand),

    /// Commands related to preset profiles.
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Debug, Subcommand)]
enum ManifestCommand {
    /// Resolves the values document from a profile, user documents and set
    /// flags.
    Generate(manifest::GenerateArgs),

    /// Shows the differences between two manifest files, or two directories
    /// of manifest files.
    Diff(manifest::DiffArgs),
}

#[derive(Debug, Subcommand)]
enum ProfileCommand {
    /// Lists all profiles, or shows a single one.
    List {
        /// The profile to show.
        name: Option<String>,

        #[command(flatten)]
        profiles: ProfilesArgs,
    },

    /// Shows the differences between two profiles.
    Diff {
        from: String,
        to: String,

        #[command(flatten)]
        profiles: ProfilesArgs,
    },
}

#[derive(Debug, Args)]
pub struct ProfilesArgs {
    /// Directory containing the profiles, one `<name>.yaml` per profile.
    #[arg(
        long = "profiles",
        env = "DUBBOCTL_PROFILES",
        default_value = "deploy/profiles"
    )]
    pub directory: PathBuf,
}

impl ProfilesArgs {
    pub fn store(&self) -> ProfileStore {
        ProfileStore::new(&self.directory)
    }
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let command = Command::parse();
    logging::initialize_logging(LOG_ENV, env!("CARGO_PKG_NAME")).context(LoggingSnafu)?;

    let mut stdout = std::io::stdout().lock();
    match command {
        Command::Manifest(manifest_command) => match manifest_command {
            ManifestCommand::Generate(args) => {
                manifest::generate(&args, &mut stdout).context(ManifestSnafu)
            }
            ManifestCommand::Diff(args) => {
                manifest::diff(&args, &mut stdout).context(ManifestSnafu)
            }
        },
        Command::Profile(profile_command) => match profile_command {
            ProfileCommand::List { name, profiles } => {
                profile::list(&profiles.store(), name.as_deref(), &mut stdout)
                    .context(ProfileSnafu)
            }
            ProfileCommand::Diff { from, to, profiles } => {
                profile::diff(&profiles.store(), &from, &to, &mut stdout).context(ProfileSnafu)
            }
        },
    }
}
