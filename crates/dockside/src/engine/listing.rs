//! Decoder for `ps` output.
//!
//! The listing is requested with [`LISTING_FORMAT`], which yields one record per
//! line with four tab-separated fields. Records that do not match are dropped
//! by [`decode_listing`] so a single odd line never aborts discovery.

use tracing::debug;

use super::container::ContainerHandle;
use super::error::{EngineError, EngineResult};

/// Go template passed to `ps --format`.
pub const LISTING_FORMAT: &str = "{{.ID}}\t{{.Image}}\t{{.RunningFor}}\t{{.Status}}";

const FIELD_COUNT: usize = 4;

/// One decoded `ps` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub id: String,
    pub image: String,
    pub running_for: String,
    pub status: String,
}

impl ListingRecord {
    /// Decode a single line.
    pub fn decode(line: &str) -> EngineResult<Self> {
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() != FIELD_COUNT {
            return Err(EngineError::Decode(format!(
                "expected {FIELD_COUNT} fields, found {}",
                fields.len()
            )));
        }

        let [id, image, running_for, status] = [fields[0], fields[1], fields[2], fields[3]];
        if id.is_empty() {
            return Err(EngineError::Decode("empty container ID".to_string()));
        }
        if image.is_empty() {
            return Err(EngineError::Decode(format!("container {id} has no image")));
        }

        Ok(Self {
            id: id.to_string(),
            image: image.to_string(),
            running_for: running_for.to_string(),
            status: status.to_string(),
        })
    }
}

impl From<ListingRecord> for ContainerHandle {
    fn from(record: ListingRecord) -> Self {
        Self {
            id: record.id,
            image: record.image,
            running_for: record.running_for,
            status: record.status,
        }
    }
}

/// Decode a whole listing, keeping engine order and skipping bad records.
pub fn decode_listing(stdout: &str) -> Vec<ContainerHandle> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match ListingRecord::decode(line) {
            Ok(record) => Some(ContainerHandle::from(record)),
            Err(e) => {
                debug!("skipping listing line {:?}: {}", line, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_record() {
        let record =
            ListingRecord::decode("abc123\tteam/dev:latest\t2 hours ago\tUp 2 hours").unwrap();
        assert_eq!(record.id, "abc123");
        assert_eq!(record.image, "team/dev:latest");
        assert_eq!(record.running_for, "2 hours ago");
        assert_eq!(record.status, "Up 2 hours");
    }

    #[test]
    fn test_decode_rejects_wrong_field_count() {
        assert!(matches!(
            ListingRecord::decode("abc123\tteam/dev:latest\tUp 2 hours"),
            Err(EngineError::Decode(_))
        ));
        assert!(ListingRecord::decode("a\tb\tc\td\te").is_err());
    }

    #[test]
    fn test_decode_rejects_empty_id() {
        assert!(ListingRecord::decode("\tteam/dev:latest\t2 hours ago\tUp 2 hours").is_err());
    }

    #[test]
    fn test_decode_listing_skips_malformed_lines() {
        let stdout = "abc123\tteam/dev:latest\t2 hours ago\tUp 2 hours\n\
                      garbage line\n\
                      \n\
                      def456\tteam/dev:latest\t3 days ago\tExited (0) 2 days ago\n";
        let handles = decode_listing(stdout);
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].id, "abc123");
        assert_eq!(handles[1].id, "def456");
    }

    #[test]
    fn test_decode_listing_handles_crlf() {
        let handles = decode_listing("abc123\tteam/dev:latest\tAbout an hour ago\tUp About an hour\r\n");
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].status, "Up About an hour");
    }

    #[test]
    fn test_decode_listing_empty_output() {
        assert!(decode_listing("").is_empty());
        assert!(decode_listing("\n\n").is_empty());
    }
}
