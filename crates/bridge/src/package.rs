// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codec package distribution.
//!
//! The transcoder's extra codec libraries live on the PMS side. The shim
//! serves its codec directory as a single streamed tar archive over HTTP
//! (any path, one endpoint); the launcher fetches and unpacks it into the
//! job's filesystem before the transcoder starts. There is no lazy
//! loading — unpack runs to completion first.
//!
//! The wire format is plain tar: directory entries are header-only, file
//! entries carry their bytes in stream order, paths are relative to the
//! served root (the root itself is excluded), and the walk is
//! lexicographic so the same tree always produces the same archive.

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures_util::TryStreamExt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tar::EntryType;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::io::{ReaderStream, StreamReader, SyncIoBridge};
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("failed to walk {0}: {1}")]
    Walk(PathBuf, #[source] io::Error),

    #[error("unsupported entry at {0} (only regular files and directories are packaged)")]
    UnsupportedEntry(PathBuf),

    #[error("archive write failed for {0}: {1}")]
    Archive(PathBuf, #[source] io::Error),

    #[error("failed to create directory {0}: {1}")]
    CreateDir(PathBuf, #[source] io::Error),

    #[error("failed to write file {0}: {1}")]
    WriteFile(PathBuf, #[source] io::Error),

    #[error("size mismatch for {path}: wrote {written} bytes, header declared {declared}")]
    SizeMismatch {
        path: PathBuf,
        written: u64,
        declared: u64,
    },

    #[error("entry path {0} escapes the destination directory")]
    PathEscape(PathBuf),

    #[error("invalid archive: {0}")]
    InvalidArchive(#[source] io::Error),

    #[error("codec package download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("codec unpack task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("codec package server failed: {0}")]
    Serve(#[source] io::Error),
}

impl PackageError {
    fn walk(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |e| Self::Walk(path.to_path_buf(), e)
    }
}

/// Stream the contents of `root` as a tar archive into `writer`.
///
/// The root directory itself is not archived; an empty root yields a
/// structurally valid, empty archive.
pub fn pack_dir<W: Write>(root: &Path, writer: W) -> Result<(), PackageError> {
    let mut builder = tar::Builder::new(writer);
    pack_tree(&mut builder, root, root)?;
    builder.finish().map_err(|e| PackageError::Archive(root.to_path_buf(), e))
}

fn pack_tree<W: Write>(
    builder: &mut tar::Builder<W>,
    root: &Path,
    dir: &Path,
) -> Result<(), PackageError> {
    let mut entries = fs::read_dir(dir)
        .map_err(PackageError::walk(dir))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(PackageError::walk(dir))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let meta = fs::symlink_metadata(&path).map_err(PackageError::walk(&path))?;
        let rel = path.strip_prefix(root).unwrap_or(&path);

        if meta.is_dir() {
            builder
                .append_dir(rel, &path)
                .map_err(|e| PackageError::Archive(path.clone(), e))?;
            pack_tree(builder, root, &path)?;
        } else if meta.is_file() {
            builder
                .append_path_with_name(&path, rel)
                .map_err(|e| PackageError::Archive(path.clone(), e))?;
        } else {
            // Symlinks and special files have no defined meaning in a
            // codec package.
            return Err(PackageError::UnsupportedEntry(path));
        }
    }
    Ok(())
}

/// Unpack a tar stream into `dest`, creating it (and any intermediate
/// directories) as needed. Each file's written length is checked against
/// its header; a short or long write is corruption, not a warning.
pub fn unpack<R: Read>(dest: &Path, reader: R) -> Result<(), PackageError> {
    fs::create_dir_all(dest).map_err(|e| PackageError::CreateDir(dest.to_path_buf(), e))?;

    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries().map_err(PackageError::InvalidArchive)? {
        let mut entry = entry.map_err(PackageError::InvalidArchive)?;
        let rel = entry.path().map_err(PackageError::InvalidArchive)?.to_path_buf();
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(PackageError::PathEscape(rel));
        }
        let target = dest.join(&rel);

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target)
                    .map_err(|e| PackageError::CreateDir(target.clone(), e))?;
                set_mode(&target, entry.header().mode().map_err(PackageError::InvalidArchive)?)
                    .map_err(|e| PackageError::CreateDir(target.clone(), e))?;
                debug!(path = %rel.display(), "created directory");
            }
            EntryType::Regular => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| PackageError::CreateDir(parent.to_path_buf(), e))?;
                }
                let declared = entry.header().size().map_err(PackageError::InvalidArchive)?;
                let mode = entry.header().mode().map_err(PackageError::InvalidArchive)?;
                let mut file = create_file(&target, mode)
                    .map_err(|e| PackageError::WriteFile(target.clone(), e))?;
                let written = io::copy(&mut entry, &mut file)
                    .map_err(|e| PackageError::WriteFile(target.clone(), e))?;
                if written != declared {
                    return Err(PackageError::SizeMismatch { path: rel, written, declared });
                }
                debug!(path = %rel.display(), bytes = written, "wrote file");
            }
            _ => return Err(PackageError::UnsupportedEntry(rel)),
        }
    }
    Ok(())
}

#[cfg(unix)]
fn create_file(path: &Path, mode: u32) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new().write(true).create(true).truncate(true).mode(mode).open(path)
}

#[cfg(not(unix))]
fn create_file(path: &Path, _mode: u32) -> io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Serve `root` as a codec package on every path of `listener`.
pub async fn serve(listener: TcpListener, root: PathBuf) -> Result<(), PackageError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, root = %root.display(), "codec package server listening");
    }
    let app = Router::new().fallback(package).with_state(Arc::new(root));
    axum::serve(listener, app).await.map_err(PackageError::Serve)
}

/// One endpoint, any path, any method: a streamed tar of the codec
/// directory. A failure while walking aborts the stream — bytes already
/// flushed cannot be retracted, so the client sees truncation.
async fn package(State(root): State<Arc<PathBuf>>) -> Response {
    let (reader, writer) = tokio::io::duplex(64 * 1024);
    tokio::task::spawn_blocking(move || {
        let bridge = SyncIoBridge::new(writer);
        if let Err(e) = pack_dir(&root, bridge) {
            error!(error = %e, "failed to stream codec package");
        }
    });

    (
        [(header::CONTENT_TYPE, "application/x-tar")],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response()
}

/// Download a codec package and unpack it into `dest`.
///
/// Must complete before the transcoder starts; a truncated or invalid
/// archive is a hard failure.
pub async fn fetch_package(dest: &Path, url: &str) -> Result<(), PackageError> {
    info!(url, dest = %dest.display(), "downloading codec package");
    let response = reqwest::get(url).await?.error_for_status()?;
    let stream = response.bytes_stream().map_err(io::Error::other);
    let reader = SyncIoBridge::new(StreamReader::new(stream));
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || unpack(&dest, reader)).await?
}

#[cfg(test)]
#[path = "package_tests.rs"]
mod package_tests;
