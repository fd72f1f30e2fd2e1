mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "computeflow")]
#[command(about = "宣言した構成に EC2 インスタンスを収束させる", long_about = None)]
struct Cli {
    /// マニフェストのパス (省略時は自動検索)
    #[arg(short, long, global = true, env = "COMPUTEFLOW_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// デバッグログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// マニフェストを検証 (クラウドには接続しない)
    Validate,
    /// 現在の状態と宣言を比較して差分を表示
    Diff {
        /// JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// 差分を適用 (インスタンスがなければ作成)
    Apply {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// インスタンスを削除
    Destroy {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// バージョン情報を表示
    Version,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログは stderr に出力 (diff --json の stdout を汚さない)
    init_tracing(cli.verbose);

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("computeflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Validate => commands::validate::handle(config)?,
        Commands::Diff { json } => commands::diff::handle(config, json).await?,
        Commands::Apply { yes } => commands::apply::handle(config, yes).await?,
        Commands::Destroy { yes } => commands::destroy::handle(config, yes).await?,
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
