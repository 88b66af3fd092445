//! INI file configuration adapter.
//!
//! Section and key names are case-sensitive so screen names in `[rules]` and
//! market ids in `[market.<ID>]` keep their spelling.

use crate::domain::error::ScannerError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScannerError> {
        let path = path.as_ref();
        let mut config = Ini::new_cs();
        config.load(path).map_err(|reason| ScannerError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new_cs();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(section)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[scan]
markets = KOSPI, KOSDAQ
screens = Breakout+MACD, MACD-GC

[provider]
kind = csv
path = /var/lib/sigscan
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("provider", "path"),
            Some("/var/lib/sigscan".to_string())
        );
        assert_eq!(
            adapter.get_list("scan", "markets"),
            vec!["KOSPI".to_string(), "KOSDAQ".to_string()]
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[scan]\nworkers = 4\n").unwrap();
        assert_eq!(adapter.get_string("scan", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn sections_and_keys_keep_case() {
        let adapter = FileConfigAdapter::from_string(
            "[market.KOSPI]\nmin_close = 5000\n\n[rules]\nBreakout+MACD = MACD_CROSS\n",
        )
        .unwrap();
        assert_eq!(adapter.get_double("market.KOSPI", "min_close", 0.0), 5000.0);
        assert_eq!(adapter.get_double("market.kospi", "min_close", 0.0), 0.0);
        assert_eq!(
            adapter.get_string("rules", "Breakout+MACD"),
            Some("MACD_CROSS".to_string())
        );
    }

    #[test]
    fn keys_are_sorted() {
        let adapter =
            FileConfigAdapter::from_string("[rules]\nZeta = MIN_CLOSE(1)\nAlpha = MIN_CLOSE(2)\n")
                .unwrap();
        assert_eq!(adapter.keys("rules"), vec!["Alpha", "Zeta"]);
        assert!(adapter.keys("absent").is_empty());
    }

    #[test]
    fn get_list_drops_blanks() {
        let adapter =
            FileConfigAdapter::from_string("[scan]\nmarkets = KOSPI, , KOSDAQ,\n").unwrap();
        assert_eq!(adapter.get_list("scan", "markets"), vec!["KOSPI", "KOSDAQ"]);
        assert!(adapter.get_list("scan", "screens").is_empty());
    }

    #[test]
    fn get_int_returns_value() {
        let adapter = FileConfigAdapter::from_string("[scan]\nworkers = 4\n").unwrap();
        assert_eq!(adapter.get_int("scan", "workers", 1), 4);
    }

    #[test]
    fn get_int_returns_default_for_missing() {
        let adapter = FileConfigAdapter::from_string("[scan]\n").unwrap();
        assert_eq!(adapter.get_int("scan", "missing", 42), 42);
    }

    #[test]
    fn get_int_returns_default_for_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[scan]\nworkers = abc\n").unwrap();
        assert_eq!(adapter.get_int("scan", "workers", 42), 42);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[market.KOSDAQ]\nvolume_multiplier = 2.5\n").unwrap();
        assert_eq!(
            adapter.get_double("market.KOSDAQ", "volume_multiplier", 0.0),
            2.5
        );
    }

    #[test]
    fn get_double_returns_default_for_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[market.KOSDAQ]\nvolume_multiplier = lots\n").unwrap();
        assert_eq!(
            adapter.get_double("market.KOSDAQ", "volume_multiplier", 99.9),
            99.9
        );
    }

    #[test]
    fn get_bool_values() {
        let adapter = FileConfigAdapter::from_string(
            "[telegram]\na = true\nb = yes\nc = 1\nd = off\ne = no\nf = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("telegram", "a", false));
        assert!(adapter.get_bool("telegram", "b", false));
        assert!(adapter.get_bool("telegram", "c", false));
        assert!(!adapter.get_bool("telegram", "d", true));
        assert!(!adapter.get_bool("telegram", "e", true));
        assert!(adapter.get_bool("telegram", "f", true));
        assert!(!adapter.get_bool("telegram", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[ledger]\nkind = csv\npath = signals.csv\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("ledger", "path"),
            Some("signals.csv".to_string())
        );
    }

    #[test]
    fn from_file_returns_config_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(ScannerError::ConfigParse { .. })));
    }
}
