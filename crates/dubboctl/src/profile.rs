use std::io::{self, Write};

use dubbo_manifest::{
    ProfileStore,
    filter::{apply_filters, strip_license_header, trim_whitespace},
    profile,
};
use dubbo_tree::{Node, diff::diff as diff_trees, node};
use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to list profiles"))]
    ListProfiles { source: profile::Error },

    #[snafu(display("failed to read profile {name:?}"))]
    ReadProfile {
        source: profile::Error,
        name: String,
    },

    #[snafu(display("failed to decode profile {name:?}"))]
    DecodeProfile { source: node::Error, name: String },

    #[snafu(display("failed to print output"))]
    Print { source: io::Error },
}

/// Prints the names of all profiles, or the content of the profile `name`
/// without its license header.
pub fn list(store: &ProfileStore, name: Option<&str>, out: &mut impl Write) -> Result<()> {
    if let Some(name) = name {
        let document = store.read(name).context(ReadProfileSnafu { name })?;
        let document = apply_filters(&document, &[strip_license_header, trim_whitespace]);
        return writeln!(out, "{document}").context(PrintSnafu);
    }

    let names = store.list().context(ListProfilesSnafu)?;
    writeln!(out, "Dubbo-admin profiles:").context(PrintSnafu)?;
    for name in names {
        writeln!(out, "    {name}").context(PrintSnafu)?;
    }
    Ok(())
}

/// Prints every difference between the profiles `from` and `to`.
pub fn diff(store: &ProfileStore, from: &str, to: &str, out: &mut impl Write) -> Result<()> {
    let differences = diff_trees(&read_tree(store, from)?, &read_tree(store, to)?);
    if differences.is_empty() {
        return writeln!(out, "two profiles are identical").context(PrintSnafu);
    }

    for difference in differences {
        writeln!(out, "{difference}").context(PrintSnafu)?;
    }
    Ok(())
}

fn read_tree(store: &ProfileStore, name: &str) -> Result<Node> {
    let document = store.read(name).context(ReadProfileSnafu { name })?;
    Node::from_yaml_str(&document).context(DecodeProfileSnafu { name })
}
