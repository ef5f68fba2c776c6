use super::file::FileInfo;
use std::cmp::Ordering;

/// Outcome of comparing a remote `FileInfo` against the locally held one for
/// the same `(folder, name)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The remote file strictly wins; adopt it.
    AdoptRemote,
    /// The local file strictly wins; the peer is behind on this file.
    KeepLocal,
    /// Identical `(version, modified, block hashes)`; nothing to adopt, and
    /// there is no genuine conflict either (the files are the same).
    Identical,
    /// Same `version`, but local and remote differ on the same file, the
    /// tie-breakers ran out, and this is a real content conflict.
    Conflict,
}

/// Applies the `§3` tie-break rules: higher Lamport `version` wins; on a
/// tie, higher `modified_seconds` wins; on a further tie, the
/// lexicographically smaller concatenated block-hash sequence wins; on
/// full equality it is either the same file (`Identical`) or a genuine
/// `Conflict`.
pub fn resolve(local: &FileInfo, remote: &FileInfo) -> Resolution {
    match remote.version.cmp(&local.version) {
        Ordering::Greater => return Resolution::AdoptRemote,
        Ordering::Less => return Resolution::KeepLocal,
        Ordering::Equal => {}
    }

    match remote.modified_seconds.cmp(&local.modified_seconds) {
        Ordering::Greater => return Resolution::AdoptRemote,
        Ordering::Less => return Resolution::KeepLocal,
        Ordering::Equal => {}
    }

    let local_hashes = local.concatenated_block_hashes();
    let remote_hashes = remote.concatenated_block_hashes();
    match remote_hashes.cmp(&local_hashes) {
        Ordering::Less => Resolution::AdoptRemote,
        Ordering::Greater => Resolution::KeepLocal,
        Ordering::Equal => {
            if local == remote {
                Resolution::Identical
            } else {
                Resolution::Conflict
            }
        }
    }
}
