//! Output file naming: `miner-<mode>[-<dataset_id>-<dataset>]-<YYYYMMDD>.tsv`.

use anyhow::{anyhow, Result};
use mambo_registry::format::generated_on;
use mambo_registry::DatasetId;
use std::path::Path;

const PREFIX: &str = "miner";
const EXTENSION: &str = ".tsv";

/// Date stamp shared with the `# File generated on:` header lines.
pub fn current_date() -> String {
    generated_on()
}

pub fn full_mode_file_name(mode: &str, date: &str) -> String {
    format!("{PREFIX}-{mode}-{date}{EXTENSION}")
}

pub fn mode_file_name(mode: &str, dataset_id: DatasetId, dataset: &str, date: &str) -> String {
    format!("{PREFIX}-{mode}-{dataset_id}-{dataset}-{date}{EXTENSION}")
}

pub fn full_crossnet_file_name(src_mode: &str, dst_mode: &str, date: &str) -> String {
    format!("{PREFIX}-{src_mode}-{dst_mode}-{date}{EXTENSION}")
}

pub fn crossnet_file_name(
    src_mode: &str,
    dst_mode: &str,
    dataset_id: DatasetId,
    dataset: &str,
    date: &str,
) -> String {
    format!("{PREFIX}-{src_mode}-{dst_mode}-{dataset_id}-{dataset}-{date}{EXTENSION}")
}

/// Mode name and dataset id encoded in a per-dataset mode file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeFileName {
    pub mode: String,
    pub dataset_id: DatasetId,
}

/// Parse `miner-<mode>-<dataset_id>-<dataset>-<date>.tsv`. The dataset part
/// may itself contain dashes.
pub fn parse_mode_file_name(path: &Path) -> Result<ModeFileName> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))?;
    let stem = name.strip_suffix(EXTENSION).unwrap_or(name);
    let parts: Vec<&str> = stem.split('-').collect();
    if parts.len() < 5 || parts[0] != PREFIX {
        return Err(anyhow!(
            "{name} does not match miner-<mode>-<dataset_id>-<dataset>-<date>.tsv"
        ));
    }
    let dataset_id = parts[2]
        .parse::<DatasetId>()
        .map_err(|_| anyhow!("{name}: `{}` is not a dataset id", parts[2]))?;
    Ok(ModeFileName {
        mode: parts[1].to_string(),
        dataset_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        assert_eq!(full_mode_file_name("gene", "20160520"), "miner-gene-20160520.tsv");
        assert_eq!(
            mode_file_name("gene", DatasetId(0), "GO", "20160520"),
            "miner-gene-0-GO-20160520.tsv"
        );
        assert_eq!(
            full_crossnet_file_name("gene", "function", "20160520"),
            "miner-gene-function-20160520.tsv"
        );
        assert_eq!(
            crossnet_file_name("gene", "function", DatasetId(0), "GO", "20160520"),
            "miner-gene-function-0-GO-20160520.tsv"
        );
    }

    #[test]
    fn test_parse_mode_file_name() {
        let parsed =
            parse_mode_file_name(Path::new("out/miner-gene-12-GO-20160520.tsv")).unwrap();
        assert_eq!(parsed.mode, "gene");
        assert_eq!(parsed.dataset_id, DatasetId(12));

        let dashed =
            parse_mode_file_name(Path::new("miner-protein-3-STRING-v10-20160520.tsv")).unwrap();
        assert_eq!(dashed.dataset_id, DatasetId(3));
    }

    #[test]
    fn test_parse_rejects_other_names() {
        assert!(parse_mode_file_name(Path::new("genes.tsv")).is_err());
        assert!(parse_mode_file_name(Path::new("miner-gene-20160520.tsv")).is_err());
        assert!(parse_mode_file_name(Path::new("miner-gene-x-GO-20160520.tsv")).is_err());
    }

    #[test]
    fn test_current_date_is_eight_digits() {
        let date = current_date();
        assert_eq!(date.len(), 8);
        assert!(date.bytes().all(|b| b.is_ascii_digit()));
    }
}
