use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crossbeam_channel::{select, Receiver};

#[cfg(unix)]
use std::os::unix::fs::symlink;
#[cfg(windows)]
use std::os::windows::fs::symlink_file as symlink;

use crate::{error::Error, Core};

// The housekeeping worker. Triggers coalesce in a capacity-1 channel; a
// cycle reads fresh filesystem state, so collapsing rapid triggers into
// one cycle loses nothing. A trigger that arrives together with shutdown
// still gets its cycle before the worker returns.
pub(crate) fn run(core: Arc<Core>, trigger: Receiver<()>, quit: Receiver<()>) {
    loop {
        select! {
            recv(trigger) -> msg => {
                if msg.is_err() {
                    return;
                }

                run_once(&core);
            }
            recv(quit) -> _ => {
                if trigger.try_recv().is_ok() {
                    run_once(&core);
                }

                return;
            }
        }
    }
}

fn run_once(core: &Core) {
    if let Err(err) = core.mill_cycle() {
        tracing::warn!(error = %err, "housekeeping cycle failed");
    }
}

struct LogFile {
    path: PathBuf,
    modified: SystemTime,
    sequence: u64,
}

impl Core {
    // One cycle: refresh the symlink to the newest file, then enforce
    // retention. Delete failures are logged and skipped; a symlink
    // failure aborts the cycle.
    pub(crate) fn mill_cycle(&self) -> Result<(), Error> {
        let mut files = self.log_files()?;
        if files.is_empty() {
            return Ok(());
        }

        if let Some(symlink_path) = &self.options.symlink {
            link(&files[0].path, symlink_path)?;
        }

        if self.options.max_backups == 0 && self.options.max_age.is_zero() {
            return Ok(());
        }

        let mut removals = Vec::new();

        if !self.options.max_age.is_zero() {
            let cutoff = SystemTime::from(self.options.clock.now()) - self.options.max_age;

            let (kept, stale): (Vec<_>, Vec<_>) = files
                .into_iter()
                .partition(|file| file.modified >= cutoff);

            files = kept;
            removals = stale;
        }

        if self.options.max_backups > 0 && files.len() > self.options.max_backups {
            removals.extend(files.drain(self.options.max_backups..));
        }

        for file in removals {
            match fs::remove_file(&file.path) {
                Ok(()) => self.metrics.file_delete.increment(),
                Err(err) => {
                    tracing::warn!(
                        path = %file.path.display(),
                        error = %err,
                        "failed to delete rotated log file"
                    );
                }
            }
        }

        Ok(())
    }

    // Enumerates rotation candidates: everything matching the derived
    // glob except symlinks (the published link must not be a candidate),
    // newest first. Many filesystems only store second-granularity
    // mtimes, so ties are broken by the numeric suffix.
    fn log_files(&self) -> Result<Vec<LogFile>, Error> {
        let mut files = Vec::new();

        let paths =
            glob::glob(&self.glob_pattern).map_err(|err| Error::Pattern(err.to_string()))?;

        for entry in paths {
            let Ok(path) = entry else { continue };
            let Ok(meta) = fs::symlink_metadata(&path) else { continue };

            if meta.file_type().is_symlink() {
                continue;
            }

            files.push(LogFile {
                sequence: suffix_sequence(&path),
                modified: meta.modified().unwrap_or(UNIX_EPOCH),
                path,
            });
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified).then(b.sequence.cmp(&a.sequence)));

        Ok(files)
    }
}

fn suffix_sequence(path: &Path) -> u64 {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse().ok())
        .unwrap_or(0)
}

// Points `symlink_path` at `target` atomically: a temporary link next to
// the target is renamed over the final path. The link destination is the
// bare filename when both share a directory, a relative path when the
// link lives under the target's tree, and the absolute target otherwise.
fn link(target: &Path, symlink_path: &Path) -> Result<(), Error> {
    let tmp = PathBuf::from(format!("{}.symlink#", target.display()));

    let link_dir = symlink_path.parent().unwrap_or(Path::new("."));
    let target_dir = target.parent().unwrap_or(Path::new(""));

    let dest = if link_dir == target_dir {
        PathBuf::from(target.file_name().unwrap_or(target.as_os_str()))
    } else if symlink_path
        .to_string_lossy()
        .contains(&*target_dir.to_string_lossy())
    {
        rel_path(link_dir, target)
    } else {
        std::path::absolute(target).map_err(|source| Error::Symlink {
            path: symlink_path.to_path_buf(),
            source,
        })?
    };

    symlink(&dest, &tmp).map_err(|source| Error::Symlink {
        path: symlink_path.to_path_buf(),
        source,
    })?;

    if fs::metadata(link_dir).is_err() {
        fs::create_dir_all(link_dir).map_err(|source| Error::CreateDir {
            path: link_dir.to_path_buf(),
            source,
        })?;
    }

    fs::rename(&tmp, symlink_path).map_err(|source| Error::Symlink {
        path: symlink_path.to_path_buf(),
        source,
    })
}

fn rel_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for component in &to[common..] {
        rel.push(component);
    }

    if rel.as_os_str().is_empty() {
        rel.push(".");
    }

    rel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_sequence_parses_trailing_number() {
        assert_eq!(0, suffix_sequence(Path::new("dir/app.log")));
        assert_eq!(1, suffix_sequence(Path::new("dir/app.log.1")));
        assert_eq!(42, suffix_sequence(Path::new("dir/app.log.42")));
        assert_eq!(0, suffix_sequence(Path::new("dir/app")));
        assert_eq!(0, suffix_sequence(Path::new("dir/app.log.x1")));
    }

    #[test]
    fn rel_path_walks_up_to_the_common_root() {
        assert_eq!(
            Path::new("../../log.1"),
            rel_path(Path::new("dir/nest1/nest2"), Path::new("dir/log.1"))
        );
        assert_eq!(
            Path::new("log.1"),
            rel_path(Path::new("dir"), Path::new("dir/log.1"))
        );
        assert_eq!(
            Path::new("../dir/log.1"),
            rel_path(Path::new("other"), Path::new("dir/log.1"))
        );
        assert_eq!(Path::new("."), rel_path(Path::new("dir"), Path::new("dir")));
    }
}
