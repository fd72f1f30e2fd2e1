pub mod apply;
pub mod destroy;
pub mod diff;
pub mod validate;

use colored::Colorize;
use computeflow_cloud_aws::Ec2ComputeApi;
use computeflow_config::Manifest;
use computeflow_reconcile::{Attribute, Reconciler, UpdatePlan};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// マニフェストを読み込み、読み込んだファイルを表示する
pub fn load_manifest(config: Option<&Path>) -> anyhow::Result<(PathBuf, Manifest)> {
    let (path, manifest) = computeflow_config::load(config)?;
    println!("マニフェスト: {}", path.display().to_string().cyan());
    Ok((path, manifest))
}

/// EC2 に接続した Reconciler を作る。Ctrl-C で実行中のパスを中断する
pub async fn connect(manifest: &Manifest) -> Reconciler {
    let api = Ec2ComputeApi::new(&manifest.region).await;
    tracing::debug!(region = api.region(), "EC2 client ready");
    let reconciler = Reconciler::new(Arc::new(api), manifest.reconcile.clone());

    let cancel = reconciler.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "中断しています...".yellow());
            cancel.cancel();
        }
    });

    reconciler
}

pub fn print_plan(plan: &UpdatePlan) {
    for attribute in Attribute::ALL {
        if plan.needs_update(attribute) {
            let note = if attribute == Attribute::Ami {
                " (報告のみ、適用されません)"
            } else if attribute.requires_power_cycle() {
                " (停止→変更→起動)"
            } else {
                ""
            };
            println!(
                "  {} {}{}",
                "~".yellow().bold(),
                attribute.to_string().yellow(),
                note.dimmed()
            );
        } else {
            println!("  {} {}", "✓".green(), attribute);
        }
    }
}

/// y/N の確認プロンプト
pub fn confirm(message: &str) -> anyhow::Result<bool> {
    print!("{} [y/N]: ", message);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
