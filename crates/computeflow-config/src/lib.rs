pub mod error;

pub use error::*;

use computeflow_cloud::DesiredConfig;
use computeflow_reconcile::ReconcileSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// マニフェストファイル名の候補 (優先順)
pub const MANIFEST_CANDIDATES: [&str; 5] = [
    "compute.local.yaml",
    ".compute.local.yaml",
    "compute.yaml",
    ".compute.yaml",
    "compute.json",
];

/// 管理対象インスタンス1台分のマニフェスト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// AWS リージョン (例: ap-northeast-1)
    pub region: String,

    /// 既存インスタンスの ID。省略時は Name タグで検索する
    #[serde(default)]
    pub instance_id: Option<String>,

    pub instance: DesiredConfig,

    #[serde(default)]
    pub reconcile: ReconcileSettings,
}

impl Manifest {
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid("region must not be empty".to_string()));
        }
        if self.reconcile.wait.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "reconcile.wait.timeout_ms must be greater than 0".to_string(),
            ));
        }
        // 0ms の待機は DescribeInstances を連続で叩いてしまう
        if self.reconcile.wait.initial_delay_ms == 0 || self.reconcile.wait.max_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "reconcile.wait.initial_delay_ms and max_delay_ms must be greater than 0"
                    .to_string(),
            ));
        }
        if self.reconcile.wait.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "reconcile.wait.multiplier must be at least 1.0".to_string(),
            ));
        }
        self.instance
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// プロジェクトのマニフェストファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 COMPUTEFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: compute.local.yaml, .compute.local.yaml, compute.yaml, .compute.yaml, compute.json
/// 3. ./.computeflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/computeflow/compute.yaml (グローバル設定)
pub fn find_manifest_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var("COMPUTEFLOW_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリで検索
    for filename in &MANIFEST_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    // 3. ./.computeflow/ ディレクトリで検索
    let project_dir = current_dir.join(".computeflow");
    if project_dir.is_dir() {
        for filename in &MANIFEST_CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    // 4. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("computeflow").join("compute.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ManifestNotFound)
}

/// マニフェストを読み込んで検証する
///
/// `.json` は JSON、それ以外は YAML として解析する。
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let manifest: Manifest = if is_json {
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
    } else {
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
    };

    manifest.validate()?;
    Ok(manifest)
}

/// 明示パスがあればそれを、なければ探索結果を読み込む
pub fn load(explicit: Option<&Path>) -> Result<(PathBuf, Manifest)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => find_manifest_file()?,
    };
    let manifest = load_manifest(&path)?;
    Ok((path, manifest))
}
