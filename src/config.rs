use crate::ai_provider::AiProvider;
use crate::error::{ReceiptAiError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 設定ファイル（~/.config/receipt-ai/config.json）
///
/// 各項目は環境変数で上書きできる
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub incoming_dir: Option<PathBuf>,
    pub scanned_dir: Option<PathBuf>,
    pub imported_dir: Option<PathBuf>,
    pub failed_dir: Option<PathBuf>,
    pub staging_csv: Option<PathBuf>,
    pub workbook_path: Option<PathBuf>,
    pub ai_provider: AiProvider,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_seconds: u64,
}

/// 処理対象フォルダ一式（起動時に一度だけ解決する）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLayout {
    pub incoming: PathBuf,
    pub scanned: PathBuf,
    pub imported: PathBuf,
    pub failed: PathBuf,
    pub staging_csv: PathBuf,
    pub workbook: PathBuf,
}

const ENV_INCOMING: &str = "RECEIPT_AI_INCOMING_DIR";
const ENV_SCANNED: &str = "RECEIPT_AI_SCANNED_DIR";
const ENV_IMPORTED: &str = "RECEIPT_AI_IMPORTED_DIR";
const ENV_FAILED: &str = "RECEIPT_AI_FAILED_DIR";
const ENV_STAGING: &str = "RECEIPT_AI_STAGING_CSV";
const ENV_WORKBOOK: &str = "RECEIPT_AI_WORKBOOK";
const ENV_PROVIDER: &str = "RECEIPT_AI_PROVIDER";
const ENV_MODEL: &str = "RECEIPT_AI_MODEL";
const ENV_API_KEY: &str = "GEMINI_API_KEY";

impl Config {
    /// 設定ファイルを読み、環境変数で上書きする
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// 設定ファイルだけを読む（環境変数は反映しない）
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default_config());
        }
        let content = std::fs::read_to_string(config_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("RECEIPT_AI_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| ReceiptAiError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("receipt-ai").join("config.json"))
    }

    fn default_config() -> Self {
        Self {
            ai_provider: AiProvider::Claude,
            model: "gemini-2.0-flash".into(),
            timeout_seconds: 120,
            ..Default::default()
        }
    }

    /// 環境変数で上書き（空文字は未設定扱い）
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let paths = [
            (ENV_INCOMING, &mut self.incoming_dir),
            (ENV_SCANNED, &mut self.scanned_dir),
            (ENV_IMPORTED, &mut self.imported_dir),
            (ENV_FAILED, &mut self.failed_dir),
            (ENV_STAGING, &mut self.staging_csv),
            (ENV_WORKBOOK, &mut self.workbook_path),
        ];
        for (key, slot) in paths {
            if let Some(value) = get(key) {
                *slot = Some(PathBuf::from(value));
            }
        }

        if let Some(provider) = get(ENV_PROVIDER) {
            self.ai_provider = provider
                .parse()
                .map_err(|e: String| ReceiptAiError::Config(format!("{}: {}", ENV_PROVIDER, e)))?;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model;
        }
        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if self.model.is_empty() {
            self.model = Self::default_config().model;
        }
        if self.timeout_seconds == 0 {
            self.timeout_seconds = Self::default_config().timeout_seconds;
        }
        Ok(())
    }

    /// フォルダ設定を解決
    ///
    /// 不足・相対パスの項目はまとめて1つのエラーで返す
    pub fn folders(&self) -> Result<FolderLayout> {
        let entries: [(&str, &Option<PathBuf>); 6] = [
            (ENV_INCOMING, &self.incoming_dir),
            (ENV_SCANNED, &self.scanned_dir),
            (ENV_IMPORTED, &self.imported_dir),
            (ENV_FAILED, &self.failed_dir),
            (ENV_STAGING, &self.staging_csv),
            (ENV_WORKBOOK, &self.workbook_path),
        ];

        let mut problems = Vec::new();
        for (key, value) in &entries {
            match value {
                None => problems.push(key.to_string()),
                Some(path) if !path.is_absolute() => {
                    problems.push(format!("{} (絶対パスではありません: {})", key, path.display()))
                }
                Some(_) => {}
            }
        }
        if !problems.is_empty() {
            return Err(ReceiptAiError::MissingSettings(problems));
        }

        let path = |value: &Option<PathBuf>| value.clone().unwrap_or_default();
        Ok(FolderLayout {
            incoming: path(&self.incoming_dir),
            scanned: path(&self.scanned_dir),
            imported: path(&self.imported_dir),
            failed: path(&self.failed_dir),
            staging_csv: path(&self.staging_csv),
            workbook: path(&self.workbook_path),
        })
    }

    pub fn get_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ReceiptAiError::MissingApiKey)
    }

    /// APIキーを設定ファイルに保存する
    ///
    /// 環境変数の値を書き込まないよう、ファイルの内容だけを読み直して保存する
    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        Self::store_api_key(&Self::config_path()?, &key)?;
        self.api_key = Some(key);
        Ok(())
    }

    pub fn store_api_key(config_path: &Path, key: &str) -> Result<()> {
        let mut stored = Self::load_from(config_path)?;
        stored.api_key = Some(key.to_string());
        stored.save_to(config_path)
    }
}

impl FolderLayout {
    /// 全フォルダを同じ親の下に置く構成
    pub fn under(root: &Path) -> Self {
        Self {
            incoming: root.join("incoming"),
            scanned: root.join("scanned"),
            imported: root.join("imported"),
            failed: root.join("failed"),
            staging_csv: root.join("staging.csv"),
            workbook: root.join("receipts.xlsx"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_missing_settings_reported_together() {
        let config = Config::default_config();
        let err = config.folders().unwrap_err();
        match err {
            ReceiptAiError::MissingSettings(keys) => {
                assert_eq!(keys.len(), 6);
                assert!(keys.contains(&ENV_INCOMING.to_string()));
                assert!(keys.contains(&ENV_WORKBOOK.to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            (ENV_INCOMING, "/data/in"),
            (ENV_SCANNED, "/data/scanned"),
            (ENV_IMPORTED, "/data/imported"),
            (ENV_FAILED, "/data/failed"),
            (ENV_STAGING, "/data/staging.csv"),
            (ENV_WORKBOOK, "/data/receipts.xlsx"),
            (ENV_PROVIDER, "gemini"),
            (ENV_API_KEY, "secret"),
        ]);

        let mut config = Config::default_config();
        config.apply_env(|k| vars.get(k).cloned()).unwrap();

        let folders = config.folders().unwrap();
        assert_eq!(folders.incoming, PathBuf::from("/data/in"));
        assert_eq!(folders.workbook, PathBuf::from("/data/receipts.xlsx"));
        assert_eq!(config.ai_provider, AiProvider::Gemini);
        assert_eq!(config.get_api_key().unwrap(), "secret");
    }

    #[test]
    fn test_relative_path_rejected() {
        let vars = env(&[
            (ENV_INCOMING, "in"),
            (ENV_SCANNED, "/data/scanned"),
            (ENV_IMPORTED, "/data/imported"),
            (ENV_FAILED, "/data/failed"),
            (ENV_STAGING, "/data/staging.csv"),
        ]);
        let mut config = Config::default_config();
        config.apply_env(|k| vars.get(k).cloned()).unwrap();

        let err = config.folders().unwrap_err();
        let message = err.to_string();
        assert!(message.contains(ENV_INCOMING));
        assert!(message.contains(ENV_WORKBOOK));
    }

    #[test]
    fn test_unknown_provider_is_error() {
        let vars = env(&[(ENV_PROVIDER, "watson")]);
        let mut config = Config::default_config();
        assert!(config.apply_env(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_api_key_saved_without_env_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut on_disk = Config::default_config();
        on_disk.scanned_dir = Some("/saved/scanned".into());
        on_disk.save_to(&path).unwrap();

        // 実行時の設定は環境変数で上書きされている
        let vars = env(&[(ENV_INCOMING, "/tmp/override"), (ENV_MODEL, "gemini-test")]);
        let mut runtime = Config::load_from(&path).unwrap();
        runtime.apply_env(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(runtime.incoming_dir, Some(PathBuf::from("/tmp/override")));

        Config::store_api_key(&path, "new-key").unwrap();

        let saved = Config::load_from(&path).unwrap();
        assert_eq!(saved.api_key.as_deref(), Some("new-key"));
        assert_eq!(saved.scanned_dir, Some(PathBuf::from("/saved/scanned")));
        assert_eq!(saved.incoming_dir, None);
        assert_eq!(saved.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_missing_api_key() {
        let config = Config::default_config();
        assert!(matches!(config.get_api_key(), Err(ReceiptAiError::MissingApiKey)));
    }
}
