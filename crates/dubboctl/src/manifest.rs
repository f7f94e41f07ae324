use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use clap::Args;
use dubbo_manifest::{
    ValuesResolver,
    compare::{self, compare_directories, compare_files},
    values,
};
use snafu::{ResultExt, Snafu};
use tracing::info;

use crate::ProfilesArgs;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to resolve values"))]
    ResolveValues { source: values::Error },

    #[snafu(display("failed to create output directory {}", path.display()))]
    CreateOutputDirectory { source: io::Error, path: PathBuf },

    #[snafu(display("failed to write values to {}", path.display()))]
    WriteOutput { source: io::Error, path: PathBuf },

    #[snafu(display("failed to print values"))]
    PrintValues { source: io::Error },

    #[snafu(display("failed to compare manifests"))]
    CompareManifests { source: compare::Error },

    #[snafu(display("failed to print comparison"))]
    PrintComparison { source: io::Error },
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// User documents overlaid onto the profile, later documents win.
    #[arg(short = 'f', long = "filename")]
    pub filenames: Vec<PathBuf>,

    #[command(flatten)]
    pub profiles: ProfilesArgs,

    /// Sets a value by path, for example `spec.components.nacos.replicas=3`.
    /// `profile=<name>` selects the profile.
    #[arg(short = 's', long = "set", value_name = "PATH=VALUE")]
    pub set_flags: Vec<String>,

    /// Writes the values to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    pub first: PathBuf,
    pub second: PathBuf,

    /// Compares two directories file by file instead of two files.
    #[arg(long = "compare-dir", alias = "compareDir")]
    pub compare_dir: bool,
}

/// Prints the differences between two manifest files, or between the files
/// of two directories.
pub fn diff(args: &DiffArgs, out: &mut impl Write) -> Result<()> {
    let report = if args.compare_dir {
        compare_directories(&args.first, &args.second)
            .context(CompareManifestsSnafu)?
            .to_string()
    } else {
        let comparison =
            compare_files(&args.first, &args.second).context(CompareManifestsSnafu)?;
        if comparison.is_identical() {
            "two manifests are identical\n".to_owned()
        } else {
            comparison.to_string()
        }
    };

    out.write_all(report.as_bytes())
        .context(PrintComparisonSnafu)
}

/// Resolves the values document and prints it to `out`, or writes it to the
/// output file.
pub fn generate(args: &GenerateArgs, out: &mut impl Write) -> Result<()> {
    let profiles = args.profiles.store();
    let values = ValuesResolver::new(&profiles)
        .with_documents(&args.filenames)
        .with_set_flags(&args.set_flags)
        .resolve()
        .context(ResolveValuesSnafu)?;

    let Some(path) = &args.output else {
        return out
            .write_all(values.document.as_bytes())
            .context(PrintValuesSnafu);
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(CreateOutputDirectorySnafu { path: parent })?;
    }
    fs::write(path, &values.document).context(WriteOutputSnafu { path })?;

    info!(
        path = %path.display(),
        profile = %values.profile,
        "wrote values"
    );
    Ok(())
}
