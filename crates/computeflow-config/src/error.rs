use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "マニフェストが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: compute.local.yaml, .compute.local.yaml, compute.yaml, .compute.yaml, compute.json\n\
        - ./.computeflow/ ディレクトリ\n\
        - ~/.config/computeflow/compute.yaml\n\
        または COMPUTEFLOW_CONFIG_PATH 環境変数で直接指定できます"
    )]
    ManifestNotFound,

    #[error("マニフェストの解析に失敗しました ({path}): {message}")]
    Parse { path: PathBuf, message: String },

    #[error("マニフェストが不正です: {0}")]
    Invalid(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
