use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{BepError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| BepError::Config(format!("failed to read config file: {e}")))?;
    let cfg: Config =
        toml::from_str(&txt).map_err(|e| BepError::Config(format!("failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if !Path::new(&cfg.tls.cert_path).exists() {
        return Err(BepError::Config(format!("certificate file not found: {}", cfg.tls.cert_path)));
    }
    if !Path::new(&cfg.tls.key_path).exists() {
        return Err(BepError::Config(format!("key file not found: {}", cfg.tls.key_path)));
    }

    let mut seen_ids = HashSet::new();
    for folder in &cfg.folders {
        if !seen_ids.insert(folder.id.as_str()) {
            return Err(BepError::Config(format!("duplicate folder id: {}", folder.id)));
        }
        for device in &folder.shared_with {
            crate::device::DeviceId::parse(device).map_err(|e| {
                BepError::Config(format!("folder '{}' shares with an invalid device id '{device}': {e}", folder.id))
            })?;
        }
    }

    for known in &cfg.device.known_devices {
        crate::device::DeviceId::parse(&known.id)
            .map_err(|e| BepError::Config(format!("invalid known device id '{}': {e}", known.id)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn rejects_missing_certificate_file() {
        let cert = tempfile::NamedTempFile::new().unwrap();
        let toml = format!(
            "[device]\nlisten = \"0.0.0.0:22000\"\n[tls]\ncert_path = \"{}\"\nkey_path = \"/no/such/key.pem\"\n",
            cert.path().display()
        );
        let config_file = write_temp(&toml);
        let err = load_from_path(config_file.path()).unwrap_err();
        assert!(matches!(err, BepError::Config(_)));
    }

    #[test]
    fn rejects_duplicate_folder_ids() {
        let cert = tempfile::NamedTempFile::new().unwrap();
        let key = tempfile::NamedTempFile::new().unwrap();
        let toml = format!(
            "[device]\nlisten = \"0.0.0.0:22000\"\n[tls]\ncert_path = \"{}\"\nkey_path = \"{}\"\n\
             [[folders]]\nid = \"docs\"\n[[folders]]\nid = \"docs\"\n",
            cert.path().display(),
            key.path().display()
        );
        let config_file = write_temp(&toml);
        let err = load_from_path(config_file.path()).unwrap_err();
        assert!(matches!(err, BepError::Config(_)));
    }
}
