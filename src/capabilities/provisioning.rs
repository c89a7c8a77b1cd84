//! Provisioned global discovery entries.
//!
//! Some providers (most importantly the global capabilities directory itself)
//! must be known before any lookup can reach the network. They are supplied
//! as JSON files holding either one `GlobalDiscoveryEntry` or an array of them.

use std::path::Path;

use anyhow::Context;

use crate::types::GlobalDiscoveryEntry;

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ProvisioningFile {
    Many(Vec<GlobalDiscoveryEntry>),
    One(Box<GlobalDiscoveryEntry>),
}

/// Parse provisioned entries from a JSON document.
pub fn parse_provisioned_entries(json: &str) -> anyhow::Result<Vec<GlobalDiscoveryEntry>> {
    let parsed: ProvisioningFile =
        serde_json::from_str(json).context("invalid provisioned discovery entries")?;
    let entries = match parsed {
        ProvisioningFile::Many(entries) => entries,
        ProvisioningFile::One(entry) => vec![*entry],
    };
    for entry in &entries {
        entry
            .decoded_address()
            .with_context(|| format!("provisioned entry {} has an invalid address", entry.participant_id()))?;
    }
    Ok(entries)
}

/// Load provisioned entries from a single JSON file.
pub fn load_provisioned_entries(path: &Path) -> anyhow::Result<Vec<GlobalDiscoveryEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading provisioned entries from {}", path.display()))?;
    parse_provisioned_entries(&content).with_context(|| format!("in {}", path.display()))
}

/// Load every `*.json` file below `dir`. Unreadable files are skipped with a
/// warning; a missing directory yields no entries.
pub fn load_provisioned_directory(dir: &Path) -> anyhow::Result<Vec<GlobalDiscoveryEntry>> {
    let mut entries = Vec::new();
    if !dir.exists() {
        return Ok(entries);
    }

    for item in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = item?.path();
        if path.is_dir() {
            entries.extend(load_provisioned_directory(&path)?);
        } else if path.extension().map_or(false, |ext| ext == "json") {
            match load_provisioned_entries(&path) {
                Ok(loaded) => entries.extend(loaded),
                Err(e) => log::warn!(
                    "[Provisioning] failed to load provisioned entries from {}: {:#}",
                    path.display(),
                    e
                ),
            }
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, DiscoveryEntry, ProviderQos};
    use std::io::Write;

    fn sample(pid: &str) -> GlobalDiscoveryEntry {
        let entry = DiscoveryEntry::new("io.joynr", "infrastructure/GlobalCapabilitiesDirectory", pid, ProviderQos::default(), 1_000);
        let address = Address::Mqtt {
            broker_uri: "joynrdefaultgbid".into(),
            topic: "discoverydirectory_channelid".into(),
        };
        GlobalDiscoveryEntry::from_entry(entry, &address).unwrap()
    }

    #[test]
    fn test_single_entry_and_array_forms() {
        let one = serde_json::to_string(&sample("gcd")).unwrap();
        assert_eq!(parse_provisioned_entries(&one).unwrap().len(), 1);

        let many = serde_json::to_string(&vec![sample("gcd"), sample("gdac")]).unwrap();
        let parsed = parse_provisioned_entries(&many).unwrap();
        assert_eq!(parsed[1].participant_id(), "gdac");
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let mut entry = sample("gcd");
        entry.address = "{\"_typeName\":\"Unknown\"}".into();
        let json = serde_json::to_string(&entry).unwrap();
        let err = parse_provisioned_entries(&json).unwrap_err();
        assert!(format!("{:#}", err).contains("gcd"));
    }

    #[test]
    fn test_load_from_directory_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut good = std::fs::File::create(dir.path().join("gcd.json")).unwrap();
        good.write_all(serde_json::to_string(&sample("gcd")).unwrap().as_bytes())
            .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = load_provisioned_directory(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(load_provisioned_entries(&dir.path().join("broken.json")).is_err());
        assert!(load_provisioned_directory(&dir.path().join("missing")).unwrap().is_empty());
    }
}
