use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::{CoreError, PublicKey, Result};

const PEM_BEGIN: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_END: &str = "-----END PUBLIC KEY-----";
#[cfg(unix)]
const PEM_FILE_MODE: u32 = 0o644;

/// Encodes the key blob as a `PUBLIC KEY` PEM block with a trailing newline.
///
/// The base64 body stays on a single line, matching the files earlier
/// releases of the tool wrote.
pub fn encode_public_key(public_key: &PublicKey) -> String {
    format!(
        "{PEM_BEGIN}\n{}\n{PEM_END}\n",
        STANDARD.encode(public_key.as_bytes())
    )
}

pub fn pem_file_name(key_name: &str) -> String {
    format!("{key_name}.pem")
}

/// Rejects names that would not end up as `<key_name>.pem` directly inside
/// the output directory (separators, absolute paths, `.` and `..`).
pub fn check_key_file_name(key_name: &str) -> Result<&str> {
    if Path::new(key_name).file_name() != Some(OsStr::new(key_name)) {
        return Err(CoreError::InvalidKeyName(
            "name must not contain path separators",
        ));
    }
    Ok(key_name)
}

/// Writes `<key_name>.pem` under `dir`, replacing any existing file.
///
/// The contents land in a temporary file first and are renamed into place,
/// so a failed write never leaves a truncated key behind.
pub fn write_public_key(dir: &Path, key_name: &str, public_key: &PublicKey) -> Result<PathBuf> {
    let path = dir.join(pem_file_name(check_key_file_name(key_name)?));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(encode_public_key(public_key).as_bytes())?;
    // temp files are created owner-only; a public key is world-readable
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(PEM_FILE_MODE))?;
    }
    file.as_file().sync_all()?;
    file.persist(&path).map_err(|err| err.error)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_body(pem: &str) -> Vec<u8> {
        let body: String = pem
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();
        STANDARD.decode(body).expect("base64 body")
    }

    #[test]
    fn short_key_is_single_line() {
        let pem = encode_public_key(&PublicKey::new(vec![1, 2, 3]));
        assert_eq!(
            pem,
            "-----BEGIN PUBLIC KEY-----\nAQID\n-----END PUBLIC KEY-----\n"
        );
    }

    #[test]
    fn rsa_sized_key_stays_on_one_line() {
        // RSA-2048 SubjectPublicKeyInfo is 294 bytes
        let key = PublicKey::new(vec![0x30; 294]);
        let pem = encode_public_key(&key);
        assert_eq!(pem.lines().count(), 3);
        assert_eq!(
            pem,
            format!(
                "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----\n",
                STANDARD.encode(key.as_bytes())
            )
        );
        assert_eq!(decode_body(&pem), key.as_bytes());
    }

    #[test]
    fn path_like_names_are_rejected() {
        for name in ["/tmp/alice", "sub/alice", "..", ".", ""] {
            assert!(
                matches!(check_key_file_name(name), Err(CoreError::InvalidKeyName(_))),
                "{name}"
            );
        }
        assert_eq!(check_key_file_name("alice").expect("plain"), "alice");
        assert_eq!(check_key_file_name("alice.work").expect("dotted"), "alice.work");
    }

    #[test]
    fn write_refuses_to_leave_output_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outside = temp.path().join("outside");
        let name = outside.to_string_lossy().into_owned();
        let result = write_public_key(temp.path(), &name, &PublicKey::new(vec![1; 8]));
        assert!(matches!(result, Err(CoreError::InvalidKeyName(_))));
        assert!(!temp.path().join("outside.pem").exists());
    }

    #[cfg(unix)]
    #[test]
    fn written_key_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_public_key(temp.path(), "alice", &PublicKey::new(vec![1; 8]))
            .expect("write");
        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn write_replaces_existing_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("alice.pem"), "stale").expect("seed");

        let key = PublicKey::new(vec![9; 40]);
        let path = write_public_key(temp.path(), "alice", &key).expect("write");
        assert_eq!(path, temp.path().join("alice.pem"));

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents, encode_public_key(&key));
        assert_eq!(decode_body(&contents), key.as_bytes());
    }

    #[test]
    fn write_leaves_no_temporary_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_public_key(temp.path(), "alice", &PublicKey::new(vec![1; 8])).expect("write");
        let names: Vec<_> = std::fs::read_dir(temp.path())
            .expect("read_dir")
            .flatten()
            .map(|entry| entry.file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("alice.pem")]);
    }
}
