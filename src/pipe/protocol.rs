//! Command tags and payload grammar for the control pipe (spec.md §4.1
//! tag/payload table).
//!
//! Grounded on the teacher's `wire::protocol::Command`: one variant per
//! wire command, each documented with its wire form.

/// `DELETE_ALL_JOBS_FROM_HOST` — payload: host alias.
pub const TAG_DELETE_ALL_JOBS_FROM_HOST: u8 = 1;
/// `DELETE_MESSAGE` — payload: full message name.
pub const TAG_DELETE_MESSAGE: u8 = 2;
/// `DELETE_SINGLE_FILE` — payload: message name `/` file name.
pub const TAG_DELETE_SINGLE_FILE: u8 = 3;
/// `DELETE_RETRIEVE` — payload: decimal `msg_number` space `fra_pos`.
pub const TAG_DELETE_RETRIEVE: u8 = 4;
/// `DELETE_RETRIEVES_FROM_DIR` — payload: directory alias.
pub const TAG_DELETE_RETRIEVES_FROM_DIR: u8 = 5;

/// A parsed control-pipe command, per spec §4.1.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// On the wire: tag 1, `<host alias>\0`.
    DeleteAllJobsFromHost { host_alias: String },
    /// On the wire: tag 2, `<message name>\0`.
    DeleteMessage { msg_name: String },
    /// On the wire: tag 3, `<message name>/<file name>\0`.
    DeleteSingleFile { msg_name: String, file_name: String },
    /// On the wire: tag 4, `<msg_number> <fra_pos>\0`.
    DeleteRetrieve { msg_number: f64, fra_pos: usize },
    /// On the wire: tag 5, `<directory alias>\0`.
    DeleteRetrievesFromDir { dir_alias: String },
}

/// Parses a command from a tag byte and its NUL-stripped ASCII payload.
/// Returns `None` for an unrecognised tag or a payload that doesn't
/// match the command's grammar (spec §7: "unknown command tag (discard
/// buffer), malformed message-name tokens (discard command, log)").
pub fn parse_command(tag: u8, payload: &[u8]) -> Option<Command> {
    let payload = std::str::from_utf8(payload).ok()?;

    match tag {
        TAG_DELETE_ALL_JOBS_FROM_HOST => Some(Command::DeleteAllJobsFromHost {
            host_alias: payload.to_string(),
        }),
        TAG_DELETE_MESSAGE => Some(Command::DeleteMessage {
            msg_name: payload.to_string(),
        }),
        TAG_DELETE_SINGLE_FILE => {
            let (msg_name, file_name) = payload.rsplit_once('/')?;
            Some(Command::DeleteSingleFile {
                msg_name: format!("{msg_name}/"),
                file_name: file_name.to_string(),
            })
        }
        TAG_DELETE_RETRIEVE => {
            let (msg_number, fra_pos) = payload.split_once(' ')?;
            let msg_number: f64 = msg_number.parse().ok()?;
            let fra_pos: usize = fra_pos.parse().ok()?;
            Some(Command::DeleteRetrieve { msg_number, fra_pos })
        }
        TAG_DELETE_RETRIEVES_FROM_DIR => Some(Command::DeleteRetrievesFromDir {
            dir_alias: payload.to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delete_all_jobs_from_host() {
        assert_eq!(
            parse_command(TAG_DELETE_ALL_JOBS_FROM_HOST, b"hostA"),
            Some(Command::DeleteAllJobsFromHost {
                host_alias: "hostA".into()
            })
        );
    }

    #[test]
    fn parses_delete_single_file() {
        assert_eq!(
            parse_command(TAG_DELETE_SINGLE_FILE, b"5a/0/6012a_0001_0/data.bin"),
            Some(Command::DeleteSingleFile {
                msg_name: "5a/0/6012a_0001_0/".into(),
                file_name: "data.bin".into(),
            })
        );
    }

    #[test]
    fn parses_delete_retrieve() {
        assert_eq!(
            parse_command(TAG_DELETE_RETRIEVE, b"12345.5 3"),
            Some(Command::DeleteRetrieve {
                msg_number: 12345.5,
                fra_pos: 3,
            })
        );
    }

    #[test]
    fn rejects_unknown_tag() {
        assert_eq!(parse_command(200, b"hostA"), None);
    }

    #[test]
    fn rejects_malformed_payload() {
        assert_eq!(parse_command(TAG_DELETE_RETRIEVE, b"not-a-number"), None);
        assert_eq!(parse_command(TAG_DELETE_SINGLE_FILE, b"no-slash-here"), None);
    }
}
