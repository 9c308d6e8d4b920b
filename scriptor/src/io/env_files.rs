//! Env file layer (`.env`, `.env.local`, ...).
//!
//! Files are re-read on every call so external edits show up on the next run.
//! Problems with individual files or lines are logged and skipped.
//! `${NAME}` references resolve within one file only; names from other env
//! files are not visible and unknown names become empty.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::environment::EnvMap;

/// Parse `paths` in order into one map; later files override earlier ones.
pub fn load_env_files(paths: &[PathBuf]) -> EnvMap {
    let mut vars = EnvMap::new();
    for path in paths {
        load_env_file(path, &mut vars);
    }
    vars
}

fn load_env_file(path: &Path, vars: &mut EnvMap) {
    if !path.is_file() {
        debug!(path = %path.display(), "env file not present, skipping");
        return;
    }
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) => {
            warn!(path = %path.display(), err = %err, "unable to open env file");
            return;
        }
    };
    let mut loaded = 0usize;
    for item in iter {
        match item {
            Ok((name, value)) => {
                vars.insert(name, value);
                loaded += 1;
            }
            Err(dotenvy::Error::LineParse(line, index)) => {
                warn!(path = %path.display(), index, line = %line, "skipping malformed env line");
            }
            Err(err) => {
                warn!(path = %path.display(), err = %err, "stopped reading env file");
                break;
            }
        }
    }
    debug!(path = %path.display(), loaded, "env file loaded");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn later_files_override_earlier() {
        let temp = tempfile::tempdir().expect("tempdir");
        let base = temp.path().join(".env");
        let local = temp.path().join(".env.local");
        fs::write(&base, "A=1\nB=base\n").expect("write");
        fs::write(&local, "B=local\n").expect("write");

        let vars = load_env_files(&[base, local]);
        assert_eq!(vars["A"], "1");
        assert_eq!(vars["B"], "local");
    }

    #[test]
    fn missing_files_are_skipped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let vars = load_env_files(&[temp.path().join(".env")]);
        assert!(vars.is_empty());
    }

    #[test]
    fn references_interpolate_within_a_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".env");
        fs::write(
            &path,
            "SCRIPTOR_TEST_HOST=example.org\nSCRIPTOR_TEST_URL=https://${SCRIPTOR_TEST_HOST}/api\n",
        )
        .expect("write");

        let vars = load_env_files(&[path]);
        assert_eq!(vars["SCRIPTOR_TEST_URL"], "https://example.org/api");
    }

    #[test]
    fn references_do_not_reach_into_other_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let base = temp.path().join(".env");
        let local = temp.path().join(".env.local");
        fs::write(&base, "SCRIPTOR_TEST_BASE_ONLY=from-base\n").expect("write");
        fs::write(&local, "SCRIPTOR_TEST_REF=[${SCRIPTOR_TEST_BASE_ONLY}]\n").expect("write");

        let vars = load_env_files(&[base, local]);
        assert_eq!(vars["SCRIPTOR_TEST_BASE_ONLY"], "from-base");
        assert_eq!(vars["SCRIPTOR_TEST_REF"], "[]");
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".env");
        fs::write(&path, "GOOD=1\nthis is not valid\nALSO_GOOD=2\n").expect("write");

        let vars = load_env_files(&[path]);
        assert_eq!(vars.get("GOOD").map(String::as_str), Some("1"));
        assert_eq!(vars.get("ALSO_GOOD").map(String::as_str), Some("2"));
    }

    #[test]
    fn files_are_reread_on_every_call() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".env");
        fs::write(&path, "A=1\n").expect("write");
        assert_eq!(load_env_files(std::slice::from_ref(&path))["A"], "1");

        fs::write(&path, "A=2\n").expect("rewrite");
        assert_eq!(load_env_files(&[path])["A"], "2");
    }
}
