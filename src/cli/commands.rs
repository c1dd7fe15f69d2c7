//! CLI command implementations
//!
//! Commands write their report to the given sink; `run` passes stdout.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use super::args::Command;
use super::errors::{CliError, CliResult};
use crate::compat::{classify, min_supported_major, ReadWindow};
use crate::error::IndexError;
use crate::index::{check_commit, read_latest, read_segment, InfoStream};
use crate::storage::{Store, StoreImpl};
use crate::upgrade::{IndexUpgrader, UpgradeOptions, UpgradeOutcome};
use crate::version::Version;

/// Run the CLI command
pub fn run_command(command: Command, out: &mut dyn Write) -> CliResult<()> {
    match command {
        Command::Upgrade {
            path,
            verbose,
            delete_prior_commits,
            store_impl,
        } => upgrade(&path, verbose, delete_prior_commits, store_impl, out),
        Command::Check { path, min_major, .. } => check(&path, min_major, out),
    }
}

fn open_store(path: &Path, store_impl: StoreImpl) -> CliResult<Arc<dyn Store>> {
    // Opening a store creates the directory; never invent an index.
    if !path.is_dir() {
        return Err(CliError::not_an_index(path.display()));
    }
    store_impl.open(path).map_err(|e| IndexError::from(e).into())
}

/// Upgrade every outdated segment in place
pub fn upgrade(
    path: &Path,
    verbose: bool,
    delete_prior_commits: bool,
    store_impl: StoreImpl,
    out: &mut dyn Write,
) -> CliResult<()> {
    let store = open_store(path, store_impl)?;
    let options = UpgradeOptions {
        delete_prior_commits,
        info_stream: if verbose { InfoStream::Tracing } else { InfoStream::Silent },
        ..UpgradeOptions::default()
    };
    match IndexUpgrader::new(store, options).upgrade()? {
        UpgradeOutcome::AlreadyCurrent { generation } => {
            writeln!(out, "already current: generation={generation}")?;
        }
        UpgradeOutcome::Upgraded {
            generation,
            rewritten,
            segments_after,
        } => {
            writeln!(
                out,
                "upgraded: generation={generation} rewritten={rewritten} segments={segments_after}"
            )?;
        }
    }
    Ok(())
}

/// Print the version verdict of every segment in the latest commit as JSON
pub fn check(path: &Path, min_major: Option<u32>, out: &mut dyn Write) -> CliResult<()> {
    let store = open_store(path, StoreImpl::FsNoSync)?;
    let engine = Version::LATEST;
    let window = ReadWindow::with_min_major(engine, min_major.unwrap_or(min_supported_major(engine)))?;
    let commit = read_latest(store.as_ref())?.ok_or_else(|| IndexError::IndexNotFound {
        resource: store.describe(),
    })?;
    check_commit(&commit, &window, &store.resource(&commit.file_name()))?;

    let mut readable = true;
    let segments: Vec<Value> = commit
        .segments
        .iter()
        .map(|seg_ref| match read_segment(store.as_ref(), seg_ref, &window) {
            Ok((segment, _)) => {
                let stamp = segment.stamp();
                json!({
                    "name": segment.name(),
                    "codec": segment.info().codec,
                    "created_by": stamp.created_by_version.to_string(),
                    "min_compatible": stamp.min_compatible_version.to_string(),
                    "segment_id": stamp.segment_id.map(|id| id.to_string()),
                    "created_index_major": segment.info().created_index_major_version,
                    "max_doc": segment.max_doc(),
                    "num_docs": segment.num_docs(),
                    "index_sort": segment.info().index_sort.as_ref().map(ToString::to_string),
                    "verdict": classify(stamp, engine).as_str(),
                })
            }
            Err(e) => {
                readable = false;
                json!({
                    "name": seg_ref.name,
                    "verdict": "refuse",
                    "error": e.render(),
                })
            }
        })
        .collect();

    let report = json!({
        "engine": engine.to_string(),
        "min_major": window.min_major(),
        "generation": commit.generation,
        "index_created_major": commit.index_created_version_major,
        "commit_version": commit.commit_version.to_string(),
        "readable": readable,
        "segments": segments,
    });
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}
